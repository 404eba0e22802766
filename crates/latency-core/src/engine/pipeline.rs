//! Per-request pipeline.
//!
//! Runs one request through validate → nonce → sign → broadcast → confirm,
//! stamping each stage boundary. Every failure ends as an `Error` outcome that
//! keeps the timestamps captured so far; nothing escapes to the batch.

use crate::nonce::NonceManager;
use latency_account::{AccountError, AccountService};
use latency_delivery::{DeliveryError, DeliveryService};
use latency_types::{
	truncate_id, ChainTransaction, OutcomeStatus, RequestError, RequestRecord, StageClock,
	StageTimestamps, TransactionHash, TransactionOutcome, TransactionReceipt, TransactionRequest,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

/// Errors that end a single request's pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
	/// The request record is missing or has a malformed field.
	#[error("Malformed request: {0}")]
	Malformed(#[from] RequestError),
	/// The signing key was rejected or signing failed.
	#[error("Account error: {0}")]
	Account(#[from] AccountError),
	/// The chain client failed.
	#[error("Delivery error: {0}")]
	Delivery(#[from] DeliveryError),
}

/// Envelope parameters shared by every request of a batch.
#[derive(Debug, Clone, Copy)]
pub struct EnvelopeParams {
	pub chain_id: u64,
	pub gas_limit: u64,
	pub gas_price: u128,
}

/// Stage runner shared by all pipelines of a batch.
pub struct RequestPipeline {
	pub(crate) account: Arc<AccountService>,
	pub(crate) delivery: Arc<DeliveryService>,
	pub(crate) nonces: NonceManager,
	pub(crate) clock: StageClock,
}

/// Progress of one request, filled in as stages complete.
#[derive(Default)]
struct Progress {
	timestamps: StageTimestamps,
	tx_hash: Option<TransactionHash>,
}

impl RequestPipeline {
	/// Runs a request to its terminal outcome.
	///
	/// `received` is the moment the dispatcher picked the request up.
	#[instrument(skip_all, fields(user_id = %record.user_id(), nft_id = %record.nft_id()))]
	pub async fn process(
		&self,
		record: RequestRecord,
		received: f64,
		params: EnvelopeParams,
	) -> TransactionOutcome {
		let mut progress = Progress {
			timestamps: StageTimestamps {
				generated: record.generated_at(),
				received: Some(received),
				..StageTimestamps::default()
			},
			tx_hash: None,
		};

		match self.execute(&record, params, &mut progress).await {
			Ok(receipt) => {
				let status = if receipt.success {
					OutcomeStatus::ConfirmedSuccess
				} else {
					OutcomeStatus::ConfirmedFailure
				};
				TransactionOutcome {
					user_id: record.user_id().to_string(),
					nft_id: record.nft_id().to_string(),
					tx_hash: progress.tx_hash,
					status,
					error: None,
					block_number: Some(receipt.block_number),
					timestamps: progress.timestamps,
				}
			},
			Err(e) => {
				tracing::debug!(error = %e, "Pipeline failed");
				let mut outcome = TransactionOutcome::failed(
					record.user_id(),
					record.nft_id(),
					progress.timestamps,
					e.to_string(),
				);
				outcome.tx_hash = progress.tx_hash;
				outcome
			},
		}
	}

	async fn execute(
		&self,
		record: &RequestRecord,
		params: EnvelopeParams,
		progress: &mut Progress,
	) -> Result<TransactionReceipt, PipelineError> {
		let request = TransactionRequest::try_from(record)?;
		progress.timestamps.generated = Some(request.generated_at);

		let account = self.account.account_for(&request.signing_key)?;
		let address = account.address();

		let reservation = self.nonces.reserve(address).await?;
		let envelope = ChainTransaction {
			to: request.contract_address,
			data: request.encoded_payload.clone(),
			nonce: reservation.nonce(),
			gas_limit: params.gas_limit,
			gas_price: params.gas_price,
			chain_id: params.chain_id,
		};

		let signed = account.sign_transaction(&envelope).await?;
		progress.timestamps.signed = Some(self.clock.now());
		tracing::debug!(nonce = envelope.nonce, "Signed transaction");

		let tx_hash = match self.delivery.broadcast(&signed).await {
			Ok(hash) => {
				reservation.commit();
				hash
			},
			Err(e) => {
				reservation.invalidate();
				return Err(e.into());
			},
		};
		progress.timestamps.broadcast = Some(self.clock.now());
		tracing::debug!(tx_hash = %truncate_id(&tx_hash.to_hex()), "Broadcast transaction");
		progress.tx_hash = Some(tx_hash.clone());

		let receipt = self.delivery.confirm(&tx_hash).await?;
		progress.timestamps.confirmed = Some(self.clock.now());
		tracing::debug!(
			block_number = receipt.block_number,
			success = receipt.success,
			"Received receipt"
		);

		Ok(receipt)
	}
}
