//! Core domain + application logic for the channel keyword forwarder.
//!
//! This crate is intentionally framework-agnostic. The message source and the
//! destination messenger live behind ports (traits) implemented in adapter crates.

pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod last_seen;
pub mod logging;
pub mod messaging;
pub mod poller;
pub mod refresh;
pub mod snapshot;
pub mod source;

pub use errors::{Error, Result};
