//! Concurrent record store keyed by request URL

use dashmap::DashMap;

use crate::browser::RequestToken;

use super::record::CaptureRecord;

/// Concurrent map from request URL to capture record
///
/// The correlator writes while a session runs; the finalizer iterates only
/// after the correlator has stopped. Thread safety is a defensive guarantee
/// here, the load-bearing property is the stop-before-iterate ordering.
#[derive(Default)]
pub struct RecordStore {
    records: DashMap<String, CaptureRecord>,
}

impl RecordStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, replacing any previous record for the same URL
    ///
    /// Last write wins: a later request to the same URL overwrites the
    /// stored record entirely, including any response data already attached.
    pub fn insert(&self, record: CaptureRecord) {
        self.records.insert(record.url.clone(), record);
    }

    /// Attach response data to the record stored for `url`
    ///
    /// Returns a snapshot of the updated record, or `None` when no request
    /// was tracked for that URL (orphan responses are a no-op).
    pub fn attach_response(
        &self,
        url: &str,
        status: i64,
        token: RequestToken,
    ) -> Option<CaptureRecord> {
        let mut entry = self.records.get_mut(url)?;
        entry.validator.status_code = status;
        entry.request_token = token;
        Some(entry.value().clone())
    }

    /// Remove every record that never received a response
    ///
    /// Returns the number of records removed. Idempotent: a second pass
    /// over a pruned store removes nothing.
    pub fn prune_unanswered(&self) -> usize {
        let before = self.records.len();
        self.records.retain(|_, record| record.has_response());
        before - self.records.len()
    }

    /// Copy of the record stored for `url`
    #[must_use]
    pub fn get(&self, url: &str) -> Option<CaptureRecord> {
        self.records.get(url).map(|entry| entry.value().clone())
    }

    /// Mutate the record stored for `url` in place
    ///
    /// Returns whether a record existed.
    pub fn with_mut(&self, url: &str, f: impl FnOnce(&mut CaptureRecord)) -> bool {
        match self.records.get_mut(url) {
            Some(mut entry) => {
                f(entry.value_mut());
                true
            }
            None => false,
        }
    }

    /// URLs currently tracked, in unspecified order
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.records.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Snapshot of every stored record, in unspecified order
    #[must_use]
    pub fn snapshot(&self) -> Vec<CaptureRecord> {
        self.records.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Number of tracked records
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
