//! Capture session lifecycle
//!
//! One controller owns the Idle → Running → StoppingDrain → Idle state
//! machine and the cancellation signal that triggers finalization.

mod controller;

pub use controller::{SessionController, SessionState};
