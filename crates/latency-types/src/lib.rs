//! Common types for the transaction latency benchmark.
//!
//! This crate defines the data model shared by every stage of the benchmark:
//! raw and validated transaction requests, per-request outcomes with their stage
//! timestamps, chain transaction envelopes, dispatch events, secret handling and
//! the configuration schema framework used by pluggable implementations.

/// Chain-facing types: envelopes, signed payloads, hashes and receipts.
pub mod delivery;
/// Events published while a batch is being dispatched.
pub mod events;
/// Per-request outcome records and status classification.
pub mod outcome;
/// Registry trait for self-registering implementations.
pub mod registry;
/// Raw request records and their validated form.
pub mod request;
/// Secret string wrapper for private keys.
pub mod secret_string;
/// Utility functions for formatting and time.
pub mod utils;
/// Configuration validation types for implementation tables.
pub mod validation;

pub use delivery::*;
pub use events::*;
pub use outcome::*;
pub use registry::ImplementationRegistry;
pub use request::*;
pub use secret_string::SecretString;
pub use utils::{round_millis, truncate_id, without_0x_prefix, StageClock};
pub use validation::*;
