//! Chromium-backed browser sessions over the DevTools protocol

use std::collections::HashMap;

use async_trait::async_trait;
use base64::Engine as _;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventRequestWillBeSent, EventResponseReceived, GetResponseBodyParams, Headers,
    RequestId,
};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::Config;
use crate::{Result, SnareError};

use super::{
    BrowserEngine, BrowserSession, Cookie, NetworkEvent, RequestEvent, RequestToken,
    ResponseEvent, EVENT_CHANNEL_CAPACITY,
};

/// Launches Chromium capture sessions
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromiumEngine;

impl ChromiumEngine {
    /// Create a new Chromium engine
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BrowserEngine for ChromiumEngine {
    async fn launch(
        &self,
        config: &Config,
    ) -> Result<(Box<dyn BrowserSession>, mpsc::Receiver<NetworkEvent>)> {
        let browser_config = build_browser_config(config)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(browser_err)?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(error = %err, "CDP handler reported error");
                }
            }
        });

        let page = browser.new_page("about:blank").await.map_err(browser_err)?;
        page.execute(EnableParams::default())
            .await
            .map_err(browser_err)?;

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let request_task = forward_requests(&page, tx.clone()).await?;
        let response_task = forward_responses(&page, tx).await?;

        let session = ChromiumSession {
            browser,
            page,
            handler_task: Some(handler_task),
            forward_tasks: vec![request_task, response_task],
        };

        Ok((Box::new(session), rx))
    }
}

/// A live Chromium session bound to one page
struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler_task: Option<JoinHandle<()>>,
    forward_tasks: Vec<JoinHandle<()>>,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.page.goto(url).await.map_err(browser_err)?;
        Ok(())
    }

    async fn fetch_response_body(&self, token: &RequestToken) -> Result<Vec<u8>> {
        let params = GetResponseBodyParams::new(RequestId::new(token.as_str()));
        let response = self.page.execute(params).await.map_err(browser_err)?;

        let body = &response.result;
        if body.base64_encoded {
            base64::engine::general_purpose::STANDARD
                .decode(body.body.as_bytes())
                .map_err(|e| SnareError::Browser(format!("Invalid base64 response body: {e}")))
        } else {
            Ok(body.body.clone().into_bytes())
        }
    }

    async fn cookies(&self) -> Result<Vec<Cookie>> {
        let cookies = self.page.get_cookies().await.map_err(browser_err)?;

        Ok(cookies
            .into_iter()
            .map(|cookie| Cookie {
                name: cookie.name,
                value: cookie.value,
            })
            .collect())
    }

    async fn close(&mut self) -> Result<()> {
        for task in self.forward_tasks.drain(..) {
            task.abort();
        }

        if let Err(err) = self.browser.close().await {
            warn!(error = %err, "Browser did not close cleanly");
        }

        if let Some(handle) = self.handler_task.take() {
            if let Err(err) = handle.await {
                if !err.is_cancelled() {
                    warn!(error = %err, "CDP handler join error");
                }
            }
        }

        Ok(())
    }
}

fn build_browser_config(config: &Config) -> Result<BrowserConfig> {
    let mut builder = BrowserConfig::builder()
        .no_sandbox()
        .viewport(Viewport {
            width: config.viewport.width,
            height: config.viewport.height,
            device_scale_factor: None,
            emulating_mobile: false,
            is_landscape: config.viewport.width >= config.viewport.height,
            has_touch: false,
        })
        .args(vec![
            "--no-first-run".to_string(),
            "--no-default-browser-check".to_string(),
            format!(
                "--window-size={},{}",
                config.viewport.width, config.viewport.height
            ),
        ]);

    if let Some(path) = &config.browser_path {
        builder = builder.chrome_executable(path);
    }

    builder.build().map_err(SnareError::Browser)
}

/// Forward request-sent events into the session's event channel
async fn forward_requests(
    page: &Page,
    tx: mpsc::Sender<NetworkEvent>,
) -> Result<JoinHandle<()>> {
    let mut stream = page
        .event_listener::<EventRequestWillBeSent>()
        .await
        .map_err(browser_err)?;

    Ok(tokio::spawn(async move {
        while let Some(event) = stream.next().await {
            let request = &event.request;
            let forwarded = NetworkEvent::Request(RequestEvent {
                url: request.url.clone(),
                method: request.method.clone(),
                headers: header_map(&request.headers),
                post_data: request.post_data.clone(),
            });

            if tx.send(forwarded).await.is_err() {
                break;
            }
        }
    }))
}

/// Forward response-received events into the session's event channel
async fn forward_responses(
    page: &Page,
    tx: mpsc::Sender<NetworkEvent>,
) -> Result<JoinHandle<()>> {
    let mut stream = page
        .event_listener::<EventResponseReceived>()
        .await
        .map_err(browser_err)?;

    Ok(tokio::spawn(async move {
        while let Some(event) = stream.next().await {
            let response = &event.response;
            let forwarded = NetworkEvent::Response(ResponseEvent {
                url: response.url.clone(),
                headers: header_map(&response.headers),
                status: response.status,
                token: RequestToken::new(event.request_id.inner().clone()),
            });

            if tx.send(forwarded).await.is_err() {
                break;
            }
        }
    }))
}

/// Flatten CDP headers into a plain string map
fn header_map(headers: &Headers) -> HashMap<String, String> {
    let mut map = HashMap::new();

    if let Ok(serde_json::Value::Object(entries)) = serde_json::to_value(headers) {
        for (name, value) in entries {
            if let serde_json::Value::String(value) = value {
                map.insert(name, value);
            }
        }
    }

    map
}

fn browser_err(err: impl std::fmt::Display) -> SnareError {
    SnareError::Browser(err.to_string())
}
