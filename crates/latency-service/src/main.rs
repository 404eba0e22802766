//! Main entry point for the transaction latency benchmark.
//!
//! This binary launches the load generator, waits for it to stage a request
//! batch, dispatches every request through sign → broadcast → confirm with bounded
//! parallelism and writes a per-transaction latency report. Implementations of
//! each component are selected from configuration.

use clap::Parser;
use latency_config::Config;
use latency_core::LoadGenerator;
use latency_types::{truncate_id, DispatchEvent, OutcomeStatus};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::broadcast::{self, error::RecvError};

mod factory_registry;

/// Command-line arguments for the benchmark.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,

	/// Override the worker pool size
	#[arg(short, long, env = "TX_LATENCY_WORKERS")]
	workers: Option<usize>,

	/// Read requests from this CSV file instead of the configured input
	#[arg(short, long)]
	input: Option<PathBuf>,

	/// Write the report to this CSV file instead of the configured output
	#[arg(short, long)]
	output: Option<PathBuf>,

	/// Do not launch the configured load generator
	#[arg(long)]
	skip_generator: bool,
}

/// Main entry point for the benchmark.
///
/// This function:
/// 1. Parses command-line arguments
/// 2. Initializes logging infrastructure
/// 3. Loads configuration from file and applies overrides
/// 4. Launches the load generator and waits for its batch
/// 5. Runs the batch and reports
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();
	let started = Instant::now();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};

	// Create env filter with default from args
	let default_directive = args.log_level.to_string();
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started tx-latency");

	// Load configuration
	let mut config = Config::from_file(&args.config).await?;
	apply_overrides(&mut config, &args);
	config.validate()?;
	tracing::info!(
		workers = config.bench.workers,
		chain_id = config.network.chain_id,
		"Loaded configuration [{}]",
		config.bench.id
	);

	// Stage the batch
	let mut generator = match (&config.generator, args.skip_generator) {
		(Some(settings), false) => {
			let mut generator = LoadGenerator::spawn(&settings.command, &settings.args)?;
			generator
				.wait_until_ready(
					&settings.ready_file,
					Duration::from_secs(settings.ready_timeout_seconds),
					Duration::from_millis(settings.settle_interval_ms),
				)
				.await?;
			Some(generator)
		},
		(Some(settings), true) => {
			if !tokio::fs::try_exists(&settings.ready_file).await? {
				return Err(format!(
					"Input batch {} does not exist",
					settings.ready_file.display()
				)
				.into());
			}
			tracing::info!("Skipping load generator");
			None
		},
		(None, _) => None,
	};

	// Build and run the engine
	let engine = factory_registry::build_bench_from_config(config)?;
	let progress = tokio::spawn(log_progress(engine.event_bus().subscribe()));

	let result = engine.run().await;
	drop(engine);
	progress.await.ok();

	let summary = result?;
	tracing::info!(run_id = %summary.run_id, "{}", summary);

	if let Some(generator) = generator.as_mut() {
		let status = generator.wait().await?;
		tracing::info!(%status, "Load generator exited");
	}

	tracing::info!(
		elapsed = %format!("{:.3}s", started.elapsed().as_secs_f64()),
		"Stopped tx-latency"
	);
	Ok(())
}

/// Applies command-line overrides to the loaded configuration.
///
/// `--input` and `--output` switch the respective section to the `csv`
/// implementation at the given path.
fn apply_overrides(config: &mut Config, args: &Args) {
	if let Some(workers) = args.workers {
		config.bench.workers = workers;
	}
	if let Some(path) = &args.input {
		config.input.primary = "csv".to_string();
		let table = config
			.input
			.implementations
			.entry("csv".to_string())
			.or_insert_with(empty_table);
		set_csv_path(table, path);
	}
	if let Some(path) = &args.output {
		config.output.primary = "csv".to_string();
		let table = config
			.output
			.implementations
			.entry("csv".to_string())
			.or_insert_with(empty_table);
		set_csv_path(table, path);
	}
}

fn empty_table() -> toml::Value {
	toml::Value::Table(toml::map::Map::new())
}

fn set_csv_path(table: &mut toml::Value, path: &std::path::Path) {
	if let toml::Value::Table(table) = table {
		table.insert(
			"path".to_string(),
			toml::Value::String(path.display().to_string()),
		);
	}
}

/// Logs every dispatch event until the event bus closes.
async fn log_progress(mut events: broadcast::Receiver<DispatchEvent>) {
	loop {
		match events.recv().await {
			Ok(DispatchEvent::RequestCompleted { index, outcome }) => {
				let tx_hash = outcome
					.tx_hash
					.as_ref()
					.map(|h| truncate_id(&h.to_hex()))
					.unwrap_or_default();
				match outcome.status {
					OutcomeStatus::ConfirmedSuccess => tracing::info!(
						index,
						user_id = %outcome.user_id,
						tx_hash = %tx_hash,
						total_delay = ?outcome.total_delay(),
						"Transaction confirmed"
					),
					OutcomeStatus::ConfirmedFailure => tracing::warn!(
						index,
						user_id = %outcome.user_id,
						tx_hash = %tx_hash,
						"Transaction reverted"
					),
					OutcomeStatus::Error => tracing::warn!(
						index,
						user_id = %outcome.user_id,
						tx_hash = %tx_hash,
						error = outcome.error.as_deref().unwrap_or_default(),
						"Transaction failed"
					),
				}
			},
			Ok(DispatchEvent::BatchCompleted { .. }) => break,
			Err(RecvError::Lagged(skipped)) => {
				tracing::debug!(skipped, "Progress log fell behind");
			},
			Err(RecvError::Closed) => break,
		}
	}
}
