//! Traffic capture and correlation engine
//!
//! Classifies raw browser network events, correlates request and response
//! halves into records keyed by URL, and finalizes the store when the
//! session stops.

mod classify;
mod correlator;
mod finalizer;
mod record;
mod store;

pub use classify::{classify_request, response_in_scope};
pub use correlator::{Correlator, NullSink, RecordSink};
pub use finalizer::finalize;
pub use record::{ApiDocument, CaptureRecord, Data, Header, Method, Validator};
pub use store::RecordStore;
