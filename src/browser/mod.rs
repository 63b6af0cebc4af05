//! Browser automation layer
//!
//! Defines the protocol-level network events and the session traits the
//! capture engine consumes, plus the Chromium (CDP) implementation.

mod chromium;

pub use chromium::ChromiumEngine;

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::Result;

/// Capacity of the in-flight network event channel
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Opaque correlation handle tying a response event to its fetchable body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestToken(String);

impl RequestToken {
    /// Wrap a protocol-level request identifier
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The underlying protocol identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the token carries an identifier
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Browser cookie as a name/value pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    /// Cookie name
    pub name: String,
    /// Cookie value
    pub value: String,
}

/// Outgoing request observed by the browser
#[derive(Debug, Clone)]
pub struct RequestEvent {
    /// Full request URL
    pub url: String,
    /// HTTP method as reported by the browser
    pub method: String,
    /// Raw request headers
    pub headers: HashMap<String, String>,
    /// Request body, if the browser reported one
    pub post_data: Option<String>,
}

/// Incoming response observed by the browser
#[derive(Debug, Clone)]
pub struct ResponseEvent {
    /// Full response URL
    pub url: String,
    /// Raw response headers
    pub headers: HashMap<String, String>,
    /// HTTP status code
    pub status: i64,
    /// Correlation handle for deferred body fetching
    pub token: RequestToken,
}

/// Network lifecycle events delivered by a browser session
#[derive(Debug, Clone)]
pub enum NetworkEvent {
    /// The browser is about to send a request
    Request(RequestEvent),
    /// The browser received response headers
    Response(ResponseEvent),
}

/// One live browser session
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Navigate the session's page to a URL
    ///
    /// # Errors
    ///
    /// Returns error if navigation fails
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Fetch the raw response body for a correlation token
    ///
    /// # Errors
    ///
    /// Returns error if the body is no longer available
    async fn fetch_response_body(&self, token: &RequestToken) -> Result<Vec<u8>>;

    /// List all cookies visible to the session
    ///
    /// # Errors
    ///
    /// Returns error if the browser cannot enumerate cookies
    async fn cookies(&self) -> Result<Vec<Cookie>>;

    /// Close the session and release browser resources
    ///
    /// # Errors
    ///
    /// Returns error if teardown fails
    async fn close(&mut self) -> Result<()>;
}

/// Factory for browser sessions
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    /// Launch a browser and subscribe to its network events
    ///
    /// # Errors
    ///
    /// Returns error if the browser cannot be started
    async fn launch(
        &self,
        config: &Config,
    ) -> Result<(Box<dyn BrowserSession>, mpsc::Receiver<NetworkEvent>)>;
}
