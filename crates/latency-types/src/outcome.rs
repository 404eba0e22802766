//! Per-request outcome records.
//!
//! Every dispatched request produces exactly one [`TransactionOutcome`], whether its
//! pipeline confirmed, reverted on-chain or failed along the way.

use crate::utils::round_millis;
use crate::TransactionHash;
use serde::{Deserialize, Serialize};

/// Terminal status of a request's pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutcomeStatus {
	/// A receipt was obtained and its status flag reports success.
	ConfirmedSuccess,
	/// A receipt was obtained but the transaction reverted.
	ConfirmedFailure,
	/// Some stage between validation and confirmation failed.
	Error,
}

impl OutcomeStatus {
	/// Value written to the report's `status` column.
	///
	/// Confirmed outcomes carry the on-chain status flag, everything else the
	/// error marker.
	pub fn as_report_str(&self) -> &'static str {
		match self {
			OutcomeStatus::ConfirmedSuccess => "1",
			OutcomeStatus::ConfirmedFailure => "0",
			OutcomeStatus::Error => "error",
		}
	}

	/// Returns true if a receipt was obtained.
	pub fn is_confirmed(&self) -> bool {
		!matches!(self, OutcomeStatus::Error)
	}
}

/// The five stage-boundary timestamps of a request, in float seconds since epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StageTimestamps {
	/// Assigned by the load generator.
	pub generated: Option<f64>,
	/// Dispatcher picked the request up.
	pub received: Option<f64>,
	/// Signing completed.
	pub signed: Option<f64>,
	/// Broadcast accepted by the node.
	pub broadcast: Option<f64>,
	/// Receipt obtained.
	pub confirmed: Option<f64>,
}

impl StageTimestamps {
	/// Returns true when all five timestamps are present.
	pub fn is_complete(&self) -> bool {
		self.generated.is_some()
			&& self.received.is_some()
			&& self.signed.is_some()
			&& self.broadcast.is_some()
			&& self.confirmed.is_some()
	}

	/// Returns true if the present timestamps never decrease in stage order.
	pub fn is_monotonic(&self) -> bool {
		let present: Vec<f64> = [
			self.generated,
			self.received,
			self.signed,
			self.broadcast,
			self.confirmed,
		]
		.into_iter()
		.flatten()
		.collect();
		present.windows(2).all(|pair| pair[0] <= pair[1])
	}
}

/// Terminal record for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionOutcome {
	pub user_id: String,
	pub nft_id: String,
	/// Present once the broadcast succeeded.
	pub tx_hash: Option<TransactionHash>,
	pub status: OutcomeStatus,
	/// Failure reason, present only for [`OutcomeStatus::Error`].
	pub error: Option<String>,
	/// Block that included the transaction, when a receipt was obtained.
	pub block_number: Option<u64>,
	pub timestamps: StageTimestamps,
}

impl TransactionOutcome {
	/// Creates an error outcome carrying whatever timestamps were captured.
	pub fn failed(
		user_id: impl Into<String>,
		nft_id: impl Into<String>,
		timestamps: StageTimestamps,
		error: impl Into<String>,
	) -> Self {
		Self {
			user_id: user_id.into(),
			nft_id: nft_id.into(),
			tx_hash: None,
			status: OutcomeStatus::Error,
			error: Some(error.into()),
			block_number: None,
			timestamps,
		}
	}

	/// End-to-end latency, `t_confirmed - t_generated`, rounded to milliseconds.
	pub fn total_delay(&self) -> Option<f64> {
		let generated = self.timestamps.generated?;
		let confirmed = self.timestamps.confirmed?;
		Some(round_millis(confirmed - generated))
	}
}
