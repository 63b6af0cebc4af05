//! Capture record data model

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::browser::RequestToken;
use crate::{Result, SnareError};

/// HTTP method of a captured exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    /// HTTP GET
    #[serde(rename = "GET")]
    Get,
    /// HTTP POST
    #[serde(rename = "POST")]
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
        }
    }
}

/// Request headers reduced to the fields the capture cares about
///
/// `cookies` stays empty until finalization; the other fields are fixed
/// when the record is created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Content-Type of the request
    #[serde(
        rename = "Content-Type",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub content_type: String,
    /// Authorization header, verbatim
    #[serde(
        rename = "Authorization",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub authorization: String,
    /// Session cookies as a single `name=value; ...` string
    #[serde(rename = "Cookie", default, skip_serializing_if = "String::is_empty")]
    pub cookies: String,
    /// User-Agent header, verbatim
    #[serde(
        rename = "User-Agent",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub user_agent: String,
}

impl Header {
    /// Whether every header field is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content_type.is_empty()
            && self.authorization.is_empty()
            && self.cookies.is_empty()
            && self.user_agent.is_empty()
    }
}

/// Request parameters or body, mutually exclusive by method
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Data {
    /// Raw query string (GET)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub params: String,
    /// Raw JSON body text (POST)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub payload: String,
}

impl Data {
    /// Whether neither params nor payload are set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty() && self.payload.is_empty()
    }
}

/// Response expectation attached once a matching response is observed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    /// HTTP status code; 0 until a response arrives
    pub status_code: i64,
}

/// One captured request/response exchange, keyed by URL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureRecord {
    /// Normalized request URL
    pub url: String,
    /// HTTP method
    pub method: Method,
    /// Extracted request headers
    #[serde(default, skip_serializing_if = "Header::is_empty")]
    pub header: Header,
    /// Request parameters or body
    #[serde(default, skip_serializing_if = "Data::is_empty")]
    pub data: Data,
    /// Response validation data
    pub validator: Validator,

    /// Correlation handle for deferred body fetching, internal only
    #[serde(skip)]
    pub request_token: RequestToken,
    /// Raw response body, populated at finalization, internal only
    #[serde(skip)]
    pub response_body: Vec<u8>,
}

impl CaptureRecord {
    /// Create a record for a request that has not seen a response yet
    #[must_use]
    pub fn new(url: String, method: Method, header: Header, data: Data) -> Self {
        Self {
            url,
            method,
            header,
            data,
            validator: Validator::default(),
            request_token: RequestToken::default(),
            response_body: Vec::new(),
        }
    }

    /// Whether a matching response has been observed
    #[must_use]
    pub fn has_response(&self) -> bool {
        self.validator.status_code != 0
    }
}

/// Exported document wrapping one finalized record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiDocument {
    /// The captured exchange
    pub api: CaptureRecord,
}

impl ApiDocument {
    /// Wrap a finalized record for export
    #[must_use]
    pub fn new(record: CaptureRecord) -> Self {
        Self { api: record }
    }

    /// Serialize the document to YAML
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| SnareError::Export(e.to_string()))
    }
}
