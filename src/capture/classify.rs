//! Event classification: deciding which exchanges are in scope
//!
//! Pure functions from raw browser events to capture records. Anything out
//! of scope (unsupported method, non-JSON content type, non-HTTP scheme)
//! classifies to `None`; classification never fails.

use std::collections::HashMap;

use url::Url;

use crate::browser::{RequestEvent, ResponseEvent};

use super::record::{CaptureRecord, Data, Header, Method};

/// Content type that marks an exchange as in scope
const JSON_CONTENT_TYPE: &str = "application/json";

/// Classify an outgoing request event
///
/// Returns `None` when the request is out of scope: methods other than
/// GET/POST, GET requests with a non-HTTP scheme, or POST requests without
/// a JSON content type.
#[must_use]
pub fn classify_request(event: &RequestEvent) -> Option<CaptureRecord> {
    match event.method.as_str() {
        "GET" => classify_get(event),
        "POST" => classify_post(event),
        _ => None,
    }
}

/// Check whether a response event belongs to the capture
#[must_use]
pub fn response_in_scope(event: &ResponseEvent) -> bool {
    content_type_is_json(&event.headers)
}

fn classify_get(event: &RequestEvent) -> Option<CaptureRecord> {
    let parsed = Url::parse(&event.url).ok()?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return None;
    }

    // Strip the query from the URL; it is preserved as data.params.
    let mut url = format!(
        "{}://{}",
        parsed.scheme(),
        parsed.host_str().unwrap_or_default()
    );
    if let Some(port) = parsed.port() {
        url.push(':');
        url.push_str(&port.to_string());
    }
    url.push_str(parsed.path());

    Some(CaptureRecord::new(
        url,
        Method::Get,
        extract_header(&event.headers),
        Data {
            params: parsed.query().unwrap_or_default().to_string(),
            payload: String::new(),
        },
    ))
}

fn classify_post(event: &RequestEvent) -> Option<CaptureRecord> {
    if !content_type_is_json(&event.headers) {
        return None;
    }

    let mut record = CaptureRecord::new(
        event.url.clone(),
        Method::Post,
        extract_header(&event.headers),
        Data::default(),
    );

    // A body that is not valid JSON is accepted silently; the payload
    // simply stays empty.
    if let Some(body) = &event.post_data {
        if serde_json::from_str::<serde_json::Value>(body).is_ok() {
            record.data.payload = body.clone();
        }
    }

    Some(record)
}

/// Look up the content type under the two spellings CDP reports in practice
fn content_type(headers: &HashMap<String, String>) -> Option<&str> {
    headers
        .get("content-type")
        .or_else(|| headers.get("Content-Type"))
        .map(String::as_str)
}

fn content_type_is_json(headers: &HashMap<String, String>) -> bool {
    content_type(headers).is_some_and(|value| value.contains(JSON_CONTENT_TYPE))
}

/// Extract the header subset the capture keeps; missing fields stay empty
fn extract_header(headers: &HashMap<String, String>) -> Header {
    Header {
        content_type: content_type(headers).unwrap_or_default().to_string(),
        authorization: headers.get("Authorization").cloned().unwrap_or_default(),
        cookies: String::new(),
        user_agent: headers.get("User-Agent").cloned().unwrap_or_default(),
    }
}
