//! Event types published while a batch is dispatched.
//!
//! Events flow through the dispatcher's event bus so that progress can be
//! streamed as individual requests terminate, independent of the final report.

use crate::TransactionOutcome;
use serde::{Deserialize, Serialize};

/// Events emitted by the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DispatchEvent {
	/// A request reached a terminal state.
	RequestCompleted {
		/// Position of the request in the input batch.
		index: usize,
		outcome: TransactionOutcome,
	},
	/// Every request in the batch has produced an outcome.
	BatchCompleted {
		total: usize,
		confirmed: usize,
		reverted: usize,
		failed: usize,
	},
}
