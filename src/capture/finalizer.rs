//! Session finalization: pruning, cookie enrichment, and body fetching
//!
//! Runs exactly once per capture session, after the event stream has been
//! torn down. Nothing in here is fatal: transient browser failures degrade
//! the affected record and are logged as warnings.

use tracing::{debug, info, warn};

use crate::browser::BrowserSession;

use super::store::RecordStore;

/// Enrich and prune the store once the event stream has stopped
///
/// Records that never received a response are removed; every survivor gets
/// the session's cookies and a best-effort response body. Post-condition:
/// every remaining record has a nonzero status code.
pub async fn finalize(store: &RecordStore, session: &dyn BrowserSession) {
    let cookies = resolve_cookies(session).await;

    let pruned = store.prune_unanswered();
    if pruned > 0 {
        debug!(pruned, "dropped records without a response");
    }

    for url in store.keys() {
        let Some(token) = store.get(&url).map(|record| record.request_token.clone()) else {
            continue;
        };

        let body = match session.fetch_response_body(&token).await {
            Ok(body) => body,
            Err(err) => {
                warn!(%url, error = %err, "failed to fetch response body");
                Vec::new()
            }
        };

        store.with_mut(&url, |record| {
            record.header.cookies = cookies.clone();
            record.response_body = body;
        });
    }

    info!(records = store.len(), "session finalized");
}

/// Join the session's cookies into a single `name=value; ...` header string
///
/// Failure to resolve cookies is non-fatal and yields an empty string.
async fn resolve_cookies(session: &dyn BrowserSession) -> String {
    match session.cookies().await {
        Ok(cookies) => cookies
            .iter()
            .map(|cookie| format!("{}={}", cookie.name, cookie.value))
            .collect::<Vec<_>>()
            .join("; "),
        Err(err) => {
            warn!(error = %err, "failed to resolve session cookies");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{Cookie, RequestToken};
    use crate::capture::record::{CaptureRecord, Data, Header, Method};
    use crate::{Result, SnareError};
    use async_trait::async_trait;

    /// Browser session stub with scriptable cookie and body behavior
    struct StubSession {
        cookies: Result<Vec<Cookie>>,
        body: Result<Vec<u8>>,
    }

    impl StubSession {
        fn healthy() -> Self {
            Self {
                cookies: Ok(vec![
                    Cookie {
                        name: "sid".to_string(),
                        value: "abc".to_string(),
                    },
                    Cookie {
                        name: "theme".to_string(),
                        value: "dark".to_string(),
                    },
                ]),
                body: Ok(b"{\"ok\":true}".to_vec()),
            }
        }
    }

    #[async_trait]
    impl BrowserSession for StubSession {
        async fn navigate(&self, _url: &str) -> Result<()> {
            Ok(())
        }

        async fn fetch_response_body(&self, _token: &RequestToken) -> Result<Vec<u8>> {
            match &self.body {
                Ok(body) => Ok(body.clone()),
                Err(_) => Err(SnareError::Browser("body gone".to_string())),
            }
        }

        async fn cookies(&self) -> Result<Vec<Cookie>> {
            match &self.cookies {
                Ok(cookies) => Ok(cookies.clone()),
                Err(_) => Err(SnareError::Browser("no cookie access".to_string())),
            }
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn answered_record(url: &str) -> CaptureRecord {
        let mut record = CaptureRecord::new(
            url.to_string(),
            Method::Get,
            Header::default(),
            Data::default(),
        );
        record.validator.status_code = 200;
        record.request_token = RequestToken::new("req-1");
        record
    }

    fn unanswered_record(url: &str) -> CaptureRecord {
        CaptureRecord::new(
            url.to_string(),
            Method::Get,
            Header::default(),
            Data::default(),
        )
    }

    #[tokio::test]
    async fn test_finalize_enriches_survivors() {
        let store = RecordStore::new();
        store.insert(answered_record("https://example.com/api"));

        finalize(&store, &StubSession::healthy()).await;

        let record = store.get("https://example.com/api").unwrap();
        assert_eq!(record.header.cookies, "sid=abc; theme=dark");
        assert_eq!(record.response_body, b"{\"ok\":true}");
    }

    #[tokio::test]
    async fn test_finalize_prunes_unanswered() {
        let store = RecordStore::new();
        store.insert(answered_record("https://example.com/answered"));
        store.insert(unanswered_record("https://example.com/silent"));

        finalize(&store, &StubSession::healthy()).await;

        assert_eq!(store.len(), 1);
        assert!(store.get("https://example.com/silent").is_none());
        // Post-condition: every survivor has a nonzero status
        for record in store.snapshot() {
            assert!(record.has_response());
        }
    }

    #[tokio::test]
    async fn test_cookie_failure_is_nonfatal() {
        let store = RecordStore::new();
        store.insert(answered_record("https://example.com/api"));

        let session = StubSession {
            cookies: Err(SnareError::Browser("no cookie access".to_string())),
            ..StubSession::healthy()
        };
        finalize(&store, &session).await;

        let record = store.get("https://example.com/api").unwrap();
        assert!(record.header.cookies.is_empty());
        assert_eq!(record.response_body, b"{\"ok\":true}");
    }

    #[tokio::test]
    async fn test_body_fetch_failure_keeps_record() {
        let store = RecordStore::new();
        store.insert(answered_record("https://example.com/api"));

        let session = StubSession {
            body: Err(SnareError::Browser("body gone".to_string())),
            ..StubSession::healthy()
        };
        finalize(&store, &session).await;

        let record = store.get("https://example.com/api").unwrap();
        assert!(record.response_body.is_empty());
        assert_eq!(record.header.cookies, "sid=abc; theme=dark");
        assert_eq!(record.validator.status_code, 200);
    }

    #[tokio::test]
    async fn test_finalize_empty_store() {
        let store = RecordStore::new();
        finalize(&store, &StubSession::healthy()).await;
        assert!(store.is_empty());
    }
}
