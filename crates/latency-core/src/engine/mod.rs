//! Batch dispatch engine.
//!
//! The [`Dispatcher`] fans a batch out over a fixed pool of worker permits and
//! waits on the [`ResultCollector`] until every request has an outcome. The
//! [`BenchEngine`] wraps it with the request source, report writer and summary
//! to perform one complete run.

pub mod event_bus;
pub mod pipeline;

use crate::collector::{CollectorError, ResultCollector};
use crate::nonce::NonceManager;
use crate::summary::BatchSummary;
use latency_account::AccountService;
use latency_config::{Config, GasPriceMode, NonceStrategy};
use latency_delivery::{DeliveryError, DeliveryService};
use latency_storage::{ReportWriter, RequestSource, StorageError};
use latency_types::{
	DispatchEvent, OutcomeStatus, RequestRecord, StageClock, StageTimestamps, TransactionOutcome,
};
use pipeline::{EnvelopeParams, RequestPipeline};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::Semaphore;

/// Errors that abort a whole run.
///
/// Per-request failures never surface here; they become `Error` outcomes.
#[derive(Debug, Error)]
pub enum DispatchError {
	/// The network gas price could not be determined.
	#[error("Failed to query gas price: {0}")]
	GasPrice(#[source] DeliveryError),
	/// The worker pool was closed.
	#[error("Worker pool closed: {0}")]
	Pool(String),
	/// Not every request produced an outcome.
	#[error("Result collection failed: {0}")]
	Collector(#[from] CollectorError),
	/// The request batch could not be read.
	#[error("Failed to read requests: {0}")]
	Input(#[source] StorageError),
	/// The report could not be written.
	#[error("Failed to write report: {0}")]
	Report(#[source] StorageError),
	/// The batch summary could not be written.
	#[error("Failed to write summary: {0}")]
	Summary(String),
}

/// Batch-wide dispatch parameters.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
	/// Maximum number of pipelines in flight.
	pub workers: usize,
	pub chain_id: u64,
	pub gas_limit: u64,
	pub gas_price: GasPriceMode,
	/// Gas price used in fixed mode, in wei.
	pub fixed_gas_price: u128,
	pub nonce_strategy: NonceStrategy,
}

impl DispatchSettings {
	/// Extracts dispatch parameters from the configuration.
	pub fn from_config(config: &Config) -> Self {
		Self {
			workers: config.bench.workers.max(1),
			chain_id: config.network.chain_id,
			gas_limit: config.transaction.gas_limit,
			gas_price: config.transaction.gas_price,
			fixed_gas_price: config.transaction.gas_price_wei(),
			nonce_strategy: config.transaction.nonce_strategy,
		}
	}
}

/// Bounded-parallelism dispatcher for request batches.
pub struct Dispatcher {
	settings: DispatchSettings,
	delivery: Arc<DeliveryService>,
	pipeline: Arc<RequestPipeline>,
	event_bus: event_bus::EventBus,
}

impl Dispatcher {
	/// Creates a dispatcher. Stage timestamps are measured against a clock
	/// anchored now.
	pub fn new(
		settings: DispatchSettings,
		account: Arc<AccountService>,
		delivery: Arc<DeliveryService>,
		event_bus: event_bus::EventBus,
	) -> Self {
		let pipeline = Arc::new(RequestPipeline {
			account,
			delivery: delivery.clone(),
			nonces: NonceManager::new(settings.nonce_strategy, delivery.clone()),
			clock: StageClock::new(),
		});
		Self {
			settings,
			delivery,
			pipeline,
			event_bus,
		}
	}

	/// Returns a reference to the event bus.
	pub fn event_bus(&self) -> &event_bus::EventBus {
		&self.event_bus
	}

	/// Dispatches every request and returns one outcome per request, in input order.
	///
	/// At most `workers` pipelines run at once; a new one starts as soon as any
	/// running pipeline finishes.
	///
	/// A pipeline that panics is reported as an `Error` outcome carrying only its
	/// generation and receipt timestamps. A hash or later stage timestamps it had
	/// already captured are not recovered.
	pub async fn dispatch(
		&self,
		batch: Vec<RequestRecord>,
	) -> Result<Vec<TransactionOutcome>, DispatchError> {
		let params = EnvelopeParams {
			chain_id: self.settings.chain_id,
			gas_limit: self.settings.gas_limit,
			gas_price: self.resolve_gas_price().await?,
		};

		let total = batch.len();
		tracing::info!(
			requests = total,
			workers = self.settings.workers,
			gas_price = params.gas_price,
			"Dispatching batch"
		);

		let (collector, sink) = ResultCollector::new(total);
		let semaphore = Arc::new(Semaphore::new(self.settings.workers));

		for (index, record) in batch.into_iter().enumerate() {
			let permit = semaphore
				.clone()
				.acquire_owned()
				.await
				.map_err(|e| DispatchError::Pool(e.to_string()))?;

			let pipeline = self.pipeline.clone();
			let event_bus = self.event_bus.clone();
			let sink = sink.clone();

			tokio::spawn(async move {
				let _permit = permit; // Keep permit alive for duration of task
				let received = pipeline.clock.now();
				let user_id = record.user_id().to_string();
				let nft_id = record.nft_id().to_string();
				let generated = record.generated_at();

				let task = tokio::spawn({
					let pipeline = pipeline.clone();
					async move { pipeline.process(record, received, params).await }
				});
				let outcome = match task.await {
					Ok(outcome) => outcome,
					Err(e) => {
						tracing::error!(index, user_id = %user_id, "Pipeline aborted: {}", e);
						TransactionOutcome::failed(
							user_id,
							nft_id,
							StageTimestamps {
								generated,
								received: Some(received),
								..Default::default()
							},
							format!("Pipeline aborted: {}", e),
						)
					},
				};

				event_bus
					.publish(DispatchEvent::RequestCompleted {
						index,
						outcome: outcome.clone(),
					})
					.ok();
				sink.submit(index, outcome);
			});
		}
		drop(sink);

		let outcomes = collector.wait_all().await?;

		let count = |status: OutcomeStatus| outcomes.iter().filter(|o| o.status == status).count();
		let confirmed = count(OutcomeStatus::ConfirmedSuccess);
		let reverted = count(OutcomeStatus::ConfirmedFailure);
		let failed = count(OutcomeStatus::Error);
		tracing::info!(total, confirmed, reverted, failed, "Batch complete");

		self.event_bus
			.publish(DispatchEvent::BatchCompleted {
				total,
				confirmed,
				reverted,
				failed,
			})
			.ok();

		Ok(outcomes)
	}

	async fn resolve_gas_price(&self) -> Result<u128, DispatchError> {
		match self.settings.gas_price {
			GasPriceMode::Fixed => Ok(self.settings.fixed_gas_price),
			GasPriceMode::Network => self
				.delivery
				.get_gas_price()
				.await
				.map_err(DispatchError::GasPrice),
		}
	}
}

/// One complete benchmark run: read, dispatch, report, summarize.
pub struct BenchEngine {
	bench_id: String,
	source: Box<dyn RequestSource>,
	writer: Box<dyn ReportWriter>,
	dispatcher: Dispatcher,
	summary_path: Option<PathBuf>,
}

impl BenchEngine {
	pub fn new(
		bench_id: impl Into<String>,
		source: Box<dyn RequestSource>,
		writer: Box<dyn ReportWriter>,
		dispatcher: Dispatcher,
		summary_path: Option<PathBuf>,
	) -> Self {
		Self {
			bench_id: bench_id.into(),
			source,
			writer,
			dispatcher,
			summary_path,
		}
	}

	/// Returns a reference to the event bus.
	pub fn event_bus(&self) -> &event_bus::EventBus {
		self.dispatcher.event_bus()
	}

	/// Runs the batch end to end and returns its summary.
	pub async fn run(&self) -> Result<BatchSummary, DispatchError> {
		let started_at = chrono::Utc::now();
		let started = Instant::now();

		let batch = self.source.read_batch().await.map_err(DispatchError::Input)?;
		let outcomes = self.dispatcher.dispatch(batch).await?;

		self.writer
			.write(&outcomes)
			.await
			.map_err(DispatchError::Report)?;

		let summary =
			BatchSummary::from_outcomes(&self.bench_id, started_at, started.elapsed(), &outcomes);

		if let Some(path) = &self.summary_path {
			summary
				.write_json(path)
				.await
				.map_err(|e| DispatchError::Summary(e.to_string()))?;
		}

		Ok(summary)
	}
}
