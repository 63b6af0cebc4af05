//! Correlation of request and response events into the record store

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::browser::NetworkEvent;

use super::classify;
use super::record::CaptureRecord;
use super::store::RecordStore;

/// Outward emission of completed in-scope responses
///
/// Called exactly once per successful response classification, before
/// finalization enriches the record with cookies and bodies.
pub trait RecordSink: Send + Sync {
    /// Deliver a record snapshot to the host application
    fn emit(&self, record: &CaptureRecord);
}

impl<T: RecordSink + ?Sized> RecordSink for Arc<T> {
    fn emit(&self, record: &CaptureRecord) {
        (**self).emit(record);
    }
}

/// Sink that drops every record
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl RecordSink for NullSink {
    fn emit(&self, _record: &CaptureRecord) {}
}

/// Stateful listener that applies the classifier to a live event stream
///
/// Performs no blocking I/O of its own; it only classifies and stores.
pub struct Correlator<S> {
    store: Arc<RecordStore>,
    sink: S,
}

impl<S: RecordSink> Correlator<S> {
    /// Create a correlator writing into `store` and emitting into `sink`
    #[must_use]
    pub fn new(store: Arc<RecordStore>, sink: S) -> Self {
        Self { store, sink }
    }

    /// Apply one browser event to the store
    pub fn handle_event(&self, event: NetworkEvent) {
        match event {
            NetworkEvent::Request(request) => {
                debug!(url = %request.url, method = %request.method, "request observed");

                if let Some(record) = classify::classify_request(&request) {
                    self.store.insert(record);
                }
            }
            NetworkEvent::Response(response) => {
                if !classify::response_in_scope(&response) {
                    return;
                }

                match self
                    .store
                    .attach_response(&response.url, response.status, response.token)
                {
                    Some(snapshot) => {
                        info!(url = %snapshot.url, method = %snapshot.method, "captured exchange");
                        self.sink.emit(&snapshot);
                    }
                    None => {
                        debug!(url = %response.url, "response without a tracked request, ignored");
                    }
                }
            }
        }
    }

    /// Drive the correlator until the stop token fires or the stream ends
    ///
    /// Returns `true` if the loop exited through the stop token, `false`
    /// if the browser closed the event stream first.
    pub async fn run(
        &self,
        events: &mut mpsc::Receiver<NetworkEvent>,
        stop: &CancellationToken,
    ) -> bool {
        loop {
            tokio::select! {
                () = stop.cancelled() => {
                    debug!("stop requested, correlator exiting");
                    return true;
                }
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => {
                        warn!("browser event stream closed before stop was requested");
                        return false;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{RequestEvent, RequestToken, ResponseEvent};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Sink that collects every emitted record
    #[derive(Default)]
    struct CollectSink {
        emitted: Mutex<Vec<CaptureRecord>>,
    }

    impl RecordSink for CollectSink {
        fn emit(&self, record: &CaptureRecord) {
            self.emitted.lock().unwrap().push(record.clone());
        }
    }

    fn json_headers() -> HashMap<String, String> {
        HashMap::from([("content-type".to_string(), "application/json".to_string())])
    }

    fn post_login_request() -> NetworkEvent {
        NetworkEvent::Request(RequestEvent {
            url: "https://api.test/login".to_string(),
            method: "POST".to_string(),
            headers: json_headers(),
            post_data: Some("{\"u\":\"a\"}".to_string()),
        })
    }

    fn login_response(status: i64) -> NetworkEvent {
        NetworkEvent::Response(ResponseEvent {
            url: "https://api.test/login".to_string(),
            headers: json_headers(),
            status,
            token: RequestToken::new("req-1"),
        })
    }

    #[test]
    fn test_request_then_response_correlated() {
        let store = Arc::new(RecordStore::new());
        let sink = Arc::new(CollectSink::default());
        let correlator = Correlator::new(Arc::clone(&store), Arc::clone(&sink));

        correlator.handle_event(post_login_request());
        correlator.handle_event(login_response(200));

        let record = store.get("https://api.test/login").unwrap();
        assert_eq!(record.validator.status_code, 200);
        assert_eq!(record.data.payload, "{\"u\":\"a\"}");
        assert_eq!(record.request_token, RequestToken::new("req-1"));

        let emitted = sink.emitted.lock().unwrap();
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].url, "https://api.test/login");
        // Emission happens before enrichment
        assert!(emitted[0].header.cookies.is_empty());
        assert!(emitted[0].response_body.is_empty());
    }

    #[test]
    fn test_orphan_response_is_noop_without_emission() {
        let store = Arc::new(RecordStore::new());
        let sink = Arc::new(CollectSink::default());
        let correlator = Correlator::new(Arc::clone(&store), Arc::clone(&sink));

        correlator.handle_event(login_response(200));

        assert!(store.is_empty());
        assert!(sink.emitted.lock().unwrap().is_empty());
    }

    #[test]
    fn test_out_of_scope_response_not_attached() {
        let store = Arc::new(RecordStore::new());
        let sink = Arc::new(CollectSink::default());
        let correlator = Correlator::new(Arc::clone(&store), Arc::clone(&sink));

        correlator.handle_event(post_login_request());
        correlator.handle_event(NetworkEvent::Response(ResponseEvent {
            url: "https://api.test/login".to_string(),
            headers: HashMap::from([("content-type".to_string(), "text/html".to_string())]),
            status: 200,
            token: RequestToken::new("req-1"),
        }));

        let record = store.get("https://api.test/login").unwrap();
        assert_eq!(record.validator.status_code, 0);
        assert!(sink.emitted.lock().unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_request_overwrites_response_data() {
        let store = Arc::new(RecordStore::new());
        let correlator = Correlator::new(Arc::clone(&store), NullSink);

        correlator.handle_event(post_login_request());
        correlator.handle_event(login_response(200));
        correlator.handle_event(post_login_request());

        let record = store.get("https://api.test/login").unwrap();
        assert_eq!(record.validator.status_code, 0);
    }

    #[test]
    fn test_out_of_scope_request_not_stored() {
        let store = Arc::new(RecordStore::new());
        let correlator = Correlator::new(Arc::clone(&store), NullSink);

        correlator.handle_event(NetworkEvent::Request(RequestEvent {
            url: "https://example.com/image.png".to_string(),
            method: "PUT".to_string(),
            headers: HashMap::new(),
            post_data: None,
        }));

        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_run_exits_on_stop_token() {
        let store = Arc::new(RecordStore::new());
        let correlator = Correlator::new(Arc::clone(&store), NullSink);

        let (tx, mut rx) = mpsc::channel(8);
        let stop = CancellationToken::new();

        tx.send(post_login_request()).await.unwrap();
        tx.send(login_response(200)).await.unwrap();

        let run = tokio::spawn({
            let stop = stop.clone();
            async move { correlator.run(&mut rx, &stop).await }
        });

        // Let the correlator drain the queued events before stopping
        while !store.get("https://api.test/login").is_some_and(|r| r.has_response()) {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        stop.cancel();

        assert!(run.await.unwrap());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_run_exits_when_stream_closes() {
        let store = Arc::new(RecordStore::new());
        let correlator = Correlator::new(store, NullSink);

        let (tx, mut rx) = mpsc::channel(8);
        drop(tx);

        let stop = CancellationToken::new();
        assert!(!correlator.run(&mut rx, &stop).await);
    }
}
