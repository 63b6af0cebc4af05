//! Apisnare - browser-driven JSON API capture
//!
//! Drives a controlled Chromium session, watches its network traffic, and
//! reconstructs replayable descriptions of the JSON-bearing exchanges it
//! observes.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::cargo)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::multiple_crate_versions
)]

pub mod browser;
pub mod capture;
pub mod config;
pub mod error;
pub mod session;

pub use error::{Result, SnareError};
