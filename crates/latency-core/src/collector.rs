//! Fan-in of per-request outcomes.
//!
//! Pipelines finish in any order. Each one submits its outcome, tagged with the
//! request's input position, through a cloneable [`OutcomeSink`]; the single
//! [`ResultCollector`] waits until every position is filled and hands the outcomes
//! back in input order.

use latency_types::TransactionOutcome;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors that can occur while collecting outcomes.
#[derive(Debug, Error)]
pub enum CollectorError {
	/// Every sink was dropped before all outcomes arrived.
	#[error("Collected {received} of {expected} outcomes before all senders closed")]
	Incomplete { expected: usize, received: usize },
}

/// Sending half handed to pipelines.
#[derive(Clone)]
pub struct OutcomeSink {
	sender: mpsc::UnboundedSender<(usize, TransactionOutcome)>,
}

impl OutcomeSink {
	/// Submits the outcome of the request at `index`.
	///
	/// Returns false if the collector has already gone away.
	pub fn submit(&self, index: usize, outcome: TransactionOutcome) -> bool {
		self.sender.send((index, outcome)).is_ok()
	}
}

/// Collects exactly one outcome per input position.
pub struct ResultCollector {
	expected: usize,
	receiver: mpsc::UnboundedReceiver<(usize, TransactionOutcome)>,
}

impl ResultCollector {
	/// Creates a collector expecting `expected` outcomes, plus its sink.
	pub fn new(expected: usize) -> (Self, OutcomeSink) {
		let (sender, receiver) = mpsc::unbounded_channel();
		(Self { expected, receiver }, OutcomeSink { sender })
	}

	/// Waits until every position has an outcome and returns them in input order.
	///
	/// Out-of-range and duplicate submissions are dropped; the first outcome for a
	/// position wins.
	pub async fn wait_all(mut self) -> Result<Vec<TransactionOutcome>, CollectorError> {
		let mut slots: Vec<Option<TransactionOutcome>> = (0..self.expected).map(|_| None).collect();
		let mut received = 0;

		while received < self.expected {
			let Some((index, outcome)) = self.receiver.recv().await else {
				return Err(CollectorError::Incomplete {
					expected: self.expected,
					received,
				});
			};

			match slots.get_mut(index) {
				None => {
					tracing::warn!(index, expected = self.expected, "Dropping out-of-range outcome");
				},
				Some(Some(_)) => {
					tracing::warn!(index, "Dropping duplicate outcome");
				},
				Some(slot) => {
					*slot = Some(outcome);
					received += 1;
				},
			}
		}

		Ok(slots.into_iter().flatten().collect())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use latency_types::StageTimestamps;

	fn outcome(user_id: &str) -> TransactionOutcome {
		TransactionOutcome::failed(user_id, "nft", StageTimestamps::default(), "test")
	}

	#[tokio::test]
	async fn test_orders_by_index() {
		let (collector, sink) = ResultCollector::new(3);
		for index in [2, 0, 1] {
			let sink = sink.clone();
			tokio::spawn(async move {
				sink.submit(index, outcome(&format!("u{}", index)));
			});
		}

		let outcomes = collector.wait_all().await.unwrap();
		let users: Vec<_> = outcomes.iter().map(|o| o.user_id.as_str()).collect();
		assert_eq!(users, vec!["u0", "u1", "u2"]);
	}

	#[tokio::test]
	async fn test_drops_duplicates_and_out_of_range() {
		let (collector, sink) = ResultCollector::new(2);
		assert!(sink.submit(0, outcome("first")));
		assert!(sink.submit(0, outcome("second")));
		assert!(sink.submit(7, outcome("stray")));
		assert!(sink.submit(1, outcome("last")));

		let outcomes = collector.wait_all().await.unwrap();
		assert_eq!(outcomes.len(), 2);
		assert_eq!(outcomes[0].user_id, "first");
		assert_eq!(outcomes[1].user_id, "last");
	}

	#[tokio::test]
	async fn test_incomplete_when_senders_close() {
		let (collector, sink) = ResultCollector::new(3);
		sink.submit(1, outcome("only"));
		drop(sink);

		let result = collector.wait_all().await;
		assert!(matches!(
			result,
			Err(CollectorError::Incomplete {
				expected: 3,
				received: 1
			})
		));
	}

	#[tokio::test]
	async fn test_empty_batch() {
		let (collector, _sink) = ResultCollector::new(0);
		assert!(collector.wait_all().await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_submit_after_collector_dropped() {
		let (collector, sink) = ResultCollector::new(1);
		drop(collector);
		assert!(!sink.submit(0, outcome("late")));
	}
}
