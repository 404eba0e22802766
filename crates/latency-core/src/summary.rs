//! Batch summary and latency statistics.

use chrono::{DateTime, Utc};
use latency_types::{round_millis, OutcomeStatus, TransactionOutcome};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

/// Distribution of a latency sample, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencyStats {
	pub count: usize,
	pub min: f64,
	pub mean: f64,
	pub p50: f64,
	pub p95: f64,
	pub max: f64,
}

impl LatencyStats {
	/// Computes statistics over the samples; `None` when there are none.
	///
	/// Percentiles use the nearest-rank method.
	pub fn from_samples(mut samples: Vec<f64>) -> Option<Self> {
		samples.retain(|s| s.is_finite());
		if samples.is_empty() {
			return None;
		}
		samples.sort_by(|a, b| a.total_cmp(b));

		let count = samples.len();
		let rank = |p: f64| {
			let index = ((p / 100.0) * count as f64).ceil() as usize;
			samples[index.clamp(1, count) - 1]
		};

		Some(Self {
			count,
			min: round_millis(samples[0]),
			mean: round_millis(samples.iter().sum::<f64>() / count as f64),
			p50: round_millis(rank(50.0)),
			p95: round_millis(rank(95.0)),
			max: round_millis(samples[count - 1]),
		})
	}
}

/// Per-stage latency breakdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageBreakdown {
	/// `t_received - t_generated`
	pub queue: Option<LatencyStats>,
	/// `t_signed - t_received`
	pub signing: Option<LatencyStats>,
	/// `t_broadcast - t_signed`
	pub broadcast: Option<LatencyStats>,
	/// `t_confirmed - t_broadcast`
	pub confirmation: Option<LatencyStats>,
}

/// Summary of one benchmark run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
	pub run_id: Uuid,
	pub bench_id: String,
	pub started_at: DateTime<Utc>,
	pub duration_seconds: f64,
	pub total: usize,
	pub confirmed: usize,
	pub reverted: usize,
	pub failed: usize,
	/// End-to-end latency of outcomes that have both ends stamped.
	pub total_delay: Option<LatencyStats>,
	pub stages: StageBreakdown,
}

impl BatchSummary {
	/// Summarizes an outcome set.
	pub fn from_outcomes(
		bench_id: &str,
		started_at: DateTime<Utc>,
		duration: Duration,
		outcomes: &[TransactionOutcome],
	) -> Self {
		let count = |status: OutcomeStatus| outcomes.iter().filter(|o| o.status == status).count();
		let delta = |from: fn(&TransactionOutcome) -> Option<f64>,
		             to: fn(&TransactionOutcome) -> Option<f64>| {
			LatencyStats::from_samples(
				outcomes
					.iter()
					.filter_map(|o| Some(to(o)? - from(o)?))
					.collect(),
			)
		};

		Self {
			run_id: Uuid::new_v4(),
			bench_id: bench_id.to_string(),
			started_at,
			duration_seconds: round_millis(duration.as_secs_f64()),
			total: outcomes.len(),
			confirmed: count(OutcomeStatus::ConfirmedSuccess),
			reverted: count(OutcomeStatus::ConfirmedFailure),
			failed: count(OutcomeStatus::Error),
			total_delay: LatencyStats::from_samples(
				outcomes.iter().filter_map(|o| o.total_delay()).collect(),
			),
			stages: StageBreakdown {
				queue: delta(|o| o.timestamps.generated, |o| o.timestamps.received),
				signing: delta(|o| o.timestamps.received, |o| o.timestamps.signed),
				broadcast: delta(|o| o.timestamps.signed, |o| o.timestamps.broadcast),
				confirmation: delta(|o| o.timestamps.broadcast, |o| o.timestamps.confirmed),
			},
		}
	}

	/// Writes the summary as pretty-printed JSON.
	pub async fn write_json(&self, path: &Path) -> std::io::Result<()> {
		let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			tokio::fs::create_dir_all(parent).await?;
		}
		tokio::fs::write(path, json).await
	}
}

impl fmt::Display for BatchSummary {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{} requests in {:.3}s: {} confirmed, {} reverted, {} failed",
			self.total, self.duration_seconds, self.confirmed, self.reverted, self.failed
		)?;
		if let Some(stats) = &self.total_delay {
			write!(
				f,
				"; total_delay p50={:.3}s p95={:.3}s max={:.3}s",
				stats.p50, stats.p95, stats.max
			)?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use latency_types::{StageTimestamps, TransactionHash};
	use tempfile::TempDir;

	fn confirmed(generated: f64, delay: f64, status: OutcomeStatus) -> TransactionOutcome {
		TransactionOutcome {
			user_id: "u".into(),
			nft_id: "n".into(),
			tx_hash: Some(TransactionHash(vec![1; 32])),
			status,
			error: None,
			block_number: Some(1),
			timestamps: StageTimestamps {
				generated: Some(generated),
				received: Some(generated + 0.5),
				signed: Some(generated + 0.75),
				broadcast: Some(generated + 1.0),
				confirmed: Some(generated + delay),
			},
		}
	}

	#[test]
	fn test_stats_nearest_rank() {
		let stats = LatencyStats::from_samples((1..=20).map(f64::from).collect()).unwrap();
		assert_eq!(stats.count, 20);
		assert_eq!(stats.min, 1.0);
		assert_eq!(stats.max, 20.0);
		assert_eq!(stats.mean, 10.5);
		assert_eq!(stats.p50, 10.0);
		assert_eq!(stats.p95, 19.0);

		let single = LatencyStats::from_samples(vec![2.5]).unwrap();
		assert_eq!((single.p50, single.p95), (2.5, 2.5));

		assert!(LatencyStats::from_samples(vec![]).is_none());
	}

	#[test]
	fn test_summary_counts_and_stages() {
		let outcomes = vec![
			confirmed(100.0, 3.0, OutcomeStatus::ConfirmedSuccess),
			confirmed(100.0, 5.0, OutcomeStatus::ConfirmedFailure),
			TransactionOutcome::failed(
				"u",
				"n",
				StageTimestamps {
					received: Some(100.5),
					..StageTimestamps::default()
				},
				"boom",
			),
		];

		let summary =
			BatchSummary::from_outcomes("bench", Utc::now(), Duration::from_millis(5250), &outcomes);
		assert_eq!(summary.total, 3);
		assert_eq!(summary.confirmed, 1);
		assert_eq!(summary.reverted, 1);
		assert_eq!(summary.failed, 1);
		assert_eq!(summary.duration_seconds, 5.25);

		let total = summary.total_delay.as_ref().unwrap();
		assert_eq!(total.count, 2);
		assert_eq!(total.max, 5.0);

		let queue = summary.stages.queue.as_ref().unwrap();
		assert_eq!(queue.count, 2);
		assert_eq!(queue.mean, 0.5);
		assert_eq!(summary.stages.confirmation.as_ref().unwrap().p95, 4.0);

		let line = summary.to_string();
		assert!(line.starts_with("3 requests in 5.250s: 1 confirmed, 1 reverted, 1 failed"));
	}

	#[tokio::test]
	async fn test_write_json() {
		let temp_dir = TempDir::new().unwrap();
		let path = temp_dir.path().join("reports").join("summary.json");
		let summary = BatchSummary::from_outcomes("bench", Utc::now(), Duration::ZERO, &[]);

		summary.write_json(&path).await.unwrap();
		let value: serde_json::Value =
			serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
		assert_eq!(value["bench_id"], "bench");
		assert_eq!(value["total"], 0);
		assert!(value["total_delay"].is_null());
	}
}
