//! Builder pattern for constructing benchmark engines.
//!
//! Composes a [`BenchEngine`] from configuration and factory functions for each
//! pluggable component: request source, report writer, account and delivery.
//! Only the implementation named `primary` in each section is instantiated.

use crate::engine::{event_bus::EventBus, BenchEngine, DispatchSettings, Dispatcher};
use latency_account::{AccountFactory, AccountService};
use latency_config::Config;
use latency_delivery::{DeliveryFactory, DeliveryService};
use latency_storage::{SourceFactory, WriterFactory};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during engine construction.
///
/// These errors indicate problems with configuration or missing required components
/// when building an engine instance.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Container for all factory functions needed to build a BenchEngine.
///
/// Each map is keyed by implementation name, as referenced by the `primary`
/// field of the matching configuration section.
#[derive(Default)]
pub struct BenchFactories {
	pub source_factories: HashMap<String, SourceFactory>,
	pub writer_factories: HashMap<String, WriterFactory>,
	pub account_factories: HashMap<String, AccountFactory>,
	pub delivery_factories: HashMap<String, DeliveryFactory>,
}

/// Builder for constructing a BenchEngine with pluggable implementations.
pub struct BenchBuilder {
	config: Config,
}

impl BenchBuilder {
	/// Creates a new BenchBuilder with the given configuration.
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Builds the BenchEngine using the factories for each component type.
	pub fn build(self, factories: BenchFactories) -> Result<BenchEngine, BuilderError> {
		let config = self.config;
		config
			.validate()
			.map_err(|e| BuilderError::Config(e.to_string()))?;

		let empty = toml::Value::Table(toml::map::Map::new());

		// Request source
		let factory = lookup("input", &config.input.primary, &factories.source_factories)?;
		let table = config.input_implementation().unwrap_or(&empty);
		let source =
			factory(table).map_err(|e| creation_failed("input", &config.input.primary, e))?;
		source
			.config_schema()
			.validate(table)
			.map_err(|e| creation_failed("input", &config.input.primary, e))?;
		tracing::info!(component = "input", implementation = %config.input.primary, "Loaded");

		// Report writer
		let factory = lookup("output", &config.output.primary, &factories.writer_factories)?;
		let table = config.output_implementation().unwrap_or(&empty);
		let writer =
			factory(table).map_err(|e| creation_failed("output", &config.output.primary, e))?;
		writer
			.config_schema()
			.validate(table)
			.map_err(|e| creation_failed("output", &config.output.primary, e))?;
		tracing::info!(component = "output", implementation = %config.output.primary, "Loaded");

		// Account
		let factory = lookup("account", &config.account.primary, &factories.account_factories)?;
		let account = Arc::new(AccountService::new(factory));
		tracing::info!(component = "account", implementation = %config.account.primary, "Loaded");

		// Delivery
		let factory = lookup(
			"delivery",
			&config.delivery.primary,
			&factories.delivery_factories,
		)?;
		let table = config.delivery_implementation().unwrap_or(&empty);
		let implementation = factory(table, &config.network)
			.map_err(|e| creation_failed("delivery", &config.delivery.primary, e))?;
		implementation
			.config_schema()
			.validate(table)
			.map_err(|e| creation_failed("delivery", &config.delivery.primary, e))?;
		let delivery = Arc::new(DeliveryService::new(
			implementation,
			config.delivery.confirmation_timeout_seconds,
		));
		tracing::info!(
			component = "delivery",
			implementation = %config.delivery.primary,
			chain_id = config.network.chain_id,
			confirmation_timeout_seconds = config.delivery.confirmation_timeout_seconds,
			"Loaded"
		);

		let dispatcher = Dispatcher::new(
			DispatchSettings::from_config(&config),
			account,
			delivery,
			EventBus::default(),
		);

		Ok(BenchEngine::new(
			config.bench.id.clone(),
			source,
			writer,
			dispatcher,
			config.output.summary_path.clone(),
		))
	}
}

fn lookup<F: Copy>(
	component: &str,
	name: &str,
	factories: &HashMap<String, F>,
) -> Result<F, BuilderError> {
	factories.get(name).copied().ok_or_else(|| {
		let mut available: Vec<_> = factories.keys().map(String::as_str).collect();
		available.sort_unstable();
		BuilderError::MissingComponent(format!(
			"Unknown {} implementation '{}'. Available: [{}]",
			component,
			name,
			available.join(", ")
		))
	})
}

fn creation_failed(component: &str, name: &str, error: impl std::fmt::Display) -> BuilderError {
	tracing::error!(
		component = component,
		implementation = %name,
		error = %error,
		"Failed to create implementation"
	);
	BuilderError::Config(format!(
		"Failed to create {} implementation '{}': {}",
		component, name, error
	))
}

#[cfg(test)]
mod tests {
	use super::*;
	use latency_config::builders::ConfigBuilder;
	use latency_storage::implementations::csv::CsvRequestSource;
	use latency_types::OutcomeStatus;

	fn factories() -> BenchFactories {
		BenchFactories {
			source_factories: latency_storage::get_all_sources()
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect(),
			writer_factories: latency_storage::get_all_writers()
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect(),
			account_factories: latency_account::get_all_implementations()
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect(),
			delivery_factories: latency_delivery::get_all_implementations()
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect(),
		}
	}

	#[tokio::test]
	async fn test_build_and_run_empty_batch() {
		let config = ConfigBuilder::new().bench_id("builder-test").build();
		let engine = BenchBuilder::new(config).build(factories()).unwrap();

		let summary = engine.run().await.unwrap();
		assert_eq!(summary.bench_id, "builder-test");
		assert_eq!(summary.total, 0);
	}

	#[tokio::test]
	async fn test_build_with_inline_records() {
		let mut config = ConfigBuilder::new().workers(2).build();
		let records: toml::Value = toml::from_str(
			r#"
			[[records]]
			user_id = "alice"
			nft_id = "1"
			timestamp = "1700000000.5"
			private_key = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
			contract_address = "0x5FbDB2315678afecb367f032d93F642f64180aa3"
			encoded_data = "0xa0712d68"

			[[records]]
			user_id = "bob"
			nft_id = "2"
			"#,
		)
		.unwrap();
		config
			.input
			.implementations
			.insert("memory".to_string(), records);

		let engine = BenchBuilder::new(config).build(factories()).unwrap();
		let mut events = engine.event_bus().subscribe();

		let summary = engine.run().await.unwrap();
		assert_eq!(summary.total, 2);
		assert_eq!(summary.confirmed, 1);
		assert_eq!(summary.failed, 1);

		match events.recv().await.unwrap() {
			latency_types::DispatchEvent::RequestCompleted { outcome, .. } => {
				assert_ne!(outcome.status, OutcomeStatus::ConfirmedFailure);
			},
			other => panic!("unexpected event: {:?}", other),
		}
	}

	#[test]
	fn test_unknown_implementation() {
		let mut config = ConfigBuilder::new().build();
		config.account.primary = "kms".to_string();

		let result = BenchBuilder::new(config).build(factories());
		match result {
			Err(BuilderError::MissingComponent(message)) => {
				assert!(message.contains("Unknown account implementation 'kms'"));
				assert!(message.contains("Available: [local]"));
			},
			_ => panic!("expected missing component"),
		}
	}

	#[test]
	fn test_invalid_config_is_rejected() {
		let config = ConfigBuilder::new().workers(0).build();
		let result = BenchBuilder::new(config).build(factories());
		assert!(matches!(result, Err(BuilderError::Config(_))));
	}

	#[test]
	fn test_built_implementation_schema_is_checked() {
		fn csv_ignoring_table(
			_: &toml::Value,
		) -> Result<Box<dyn latency_storage::RequestSource>, latency_storage::StorageError> {
			Ok(Box::new(CsvRequestSource::new("batch.csv")))
		}

		let mut factories = factories();
		factories
			.source_factories
			.insert("csv".to_string(), csv_ignoring_table);

		let mut config = ConfigBuilder::new().build();
		config.input.primary = "csv".to_string();
		config
			.input
			.implementations
			.insert("csv".to_string(), toml::Value::Table(toml::map::Map::new()));

		match BenchBuilder::new(config).build(factories) {
			Err(BuilderError::Config(message)) => {
				assert!(message.contains("Failed to create input implementation 'csv'"));
				assert!(message.contains("Missing required field: path"));
			},
			_ => panic!("expected config error"),
		}
	}

	#[test]
	fn test_factory_failure() {
		let mut table = toml::map::Map::new();
		table.insert("revert_selector".to_string(), toml::Value::from("zz"));
		let config = ConfigBuilder::new()
			.mock_delivery(toml::Value::Table(table))
			.build();

		let result = BenchBuilder::new(config).build(factories());
		match result {
			Err(BuilderError::Config(message)) => {
				assert!(message.contains("Failed to create delivery implementation 'mock'"));
			},
			_ => panic!("expected config error"),
		}
	}
}
