//! Utility functions shared across the benchmark crates.

pub mod clock;
pub mod formatting;

pub use clock::{round_millis, StageClock};
pub use formatting::{truncate_id, without_0x_prefix};
