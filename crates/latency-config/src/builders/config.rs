//! Configuration builder for test and development configurations.
//!
//! Produces a [`Config`] wired to the in-process `mock` delivery and `memory`
//! source and writer implementations, so a full dispatch can run without a network
//! or filesystem.

use crate::{
	AccountConfig, BenchConfig, Config, DeliveryConfig, GasPriceMode, InputConfig, NetworkConfig,
	NonceStrategy, OutputConfig, TransactionConfig,
};
use std::collections::HashMap;

/// Builder for creating `Config` instances with a fluent API.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	bench_id: String,
	workers: usize,
	chain_id: u64,
	gas_price: GasPriceMode,
	nonce_strategy: NonceStrategy,
	confirmation_timeout_seconds: u64,
	delivery: toml::Value,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	/// Creates a new `ConfigBuilder` with defaults suitable for testing.
	pub fn new() -> Self {
		Self {
			bench_id: "test-bench".to_string(),
			workers: 4,
			chain_id: 31337,
			gas_price: GasPriceMode::Fixed,
			nonce_strategy: NonceStrategy::Chain,
			confirmation_timeout_seconds: 5,
			delivery: toml::Value::Table(toml::map::Map::new()),
		}
	}

	/// Sets the bench ID.
	pub fn bench_id(mut self, id: impl Into<String>) -> Self {
		self.bench_id = id.into();
		self
	}

	/// Sets the worker count.
	pub fn workers(mut self, workers: usize) -> Self {
		self.workers = workers;
		self
	}

	/// Sets the chain ID.
	pub fn chain_id(mut self, chain_id: u64) -> Self {
		self.chain_id = chain_id;
		self
	}

	/// Sets the gas price mode.
	pub fn gas_price(mut self, mode: GasPriceMode) -> Self {
		self.gas_price = mode;
		self
	}

	/// Sets the nonce strategy.
	pub fn nonce_strategy(mut self, strategy: NonceStrategy) -> Self {
		self.nonce_strategy = strategy;
		self
	}

	/// Sets the confirmation timeout in seconds.
	pub fn confirmation_timeout_seconds(mut self, seconds: u64) -> Self {
		self.confirmation_timeout_seconds = seconds;
		self
	}

	/// Sets the raw table passed to the `mock` delivery implementation.
	pub fn mock_delivery(mut self, table: toml::Value) -> Self {
		self.delivery = table;
		self
	}

	/// Builds the `Config` with the configured values.
	pub fn build(self) -> Config {
		let empty = || toml::Value::Table(toml::map::Map::new());

		Config {
			bench: BenchConfig {
				id: self.bench_id,
				workers: self.workers,
			},
			network: NetworkConfig {
				chain_id: self.chain_id,
				rpc_url: String::new(),
			},
			transaction: TransactionConfig {
				gas_price: self.gas_price,
				nonce_strategy: self.nonce_strategy,
				..TransactionConfig::default()
			},
			account: AccountConfig::default(),
			delivery: DeliveryConfig {
				primary: "mock".to_string(),
				confirmation_timeout_seconds: self.confirmation_timeout_seconds,
				implementations: HashMap::from([("mock".to_string(), self.delivery)]),
			},
			input: InputConfig {
				primary: "memory".to_string(),
				implementations: HashMap::from([("memory".to_string(), empty())]),
			},
			output: OutputConfig {
				primary: "memory".to_string(),
				summary_path: None,
				implementations: HashMap::from([("memory".to_string(), empty())]),
			},
			generator: None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_built_config_is_valid() {
		let config = ConfigBuilder::new()
			.workers(2)
			.nonce_strategy(NonceStrategy::Reserved)
			.build();
		assert!(config.validate().is_ok());
		assert_eq!(config.bench.workers, 2);
		assert_eq!(config.transaction.nonce_strategy, NonceStrategy::Reserved);
		assert!(config.delivery_implementation().is_some());
	}
}
