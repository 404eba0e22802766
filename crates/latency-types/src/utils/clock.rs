//! Stage timestamp clock.
//!
//! Timestamps are reported as float seconds since the Unix epoch so they can be
//! compared with the generator-assigned `t_generated`. Within a run they must never
//! go backwards, so the clock reads the wall clock once and advances it with a
//! monotonic [`Instant`].

use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Wall-clock anchored monotonic clock.
#[derive(Debug, Clone, Copy)]
pub struct StageClock {
	anchor_epoch_secs: f64,
	anchor: Instant,
}

impl StageClock {
	/// Anchors a new clock at the current wall time.
	pub fn new() -> Self {
		let anchor_epoch_secs = SystemTime::now()
			.duration_since(UNIX_EPOCH)
			.map(|d| d.as_secs_f64())
			.unwrap_or(0.0);
		Self {
			anchor_epoch_secs,
			anchor: Instant::now(),
		}
	}

	/// Current time in float seconds since the Unix epoch.
	pub fn now(&self) -> f64 {
		self.anchor_epoch_secs + self.anchor.elapsed().as_secs_f64()
	}
}

impl Default for StageClock {
	fn default() -> Self {
		Self::new()
	}
}

/// Rounds a duration in seconds to millisecond precision.
pub fn round_millis(seconds: f64) -> f64 {
	(seconds * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_clock_is_monotonic_and_near_wall_time() {
		let clock = StageClock::new();
		let wall = SystemTime::now()
			.duration_since(UNIX_EPOCH)
			.unwrap()
			.as_secs_f64();

		let mut previous = clock.now();
		assert!((previous - wall).abs() < 1.0);
		for _ in 0..1000 {
			let next = clock.now();
			assert!(next >= previous);
			previous = next;
		}
	}

	#[test]
	fn test_round_millis() {
		assert_eq!(round_millis(1.23449), 1.234);
		assert_eq!(round_millis(1.2346), 1.235);
		assert_eq!(round_millis(0.0), 0.0);
		assert_eq!(round_millis(-0.0004), 0.0);
	}
}
