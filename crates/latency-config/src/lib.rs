//! Configuration module for the transaction latency benchmark.
//!
//! Configuration is loaded from TOML files and validated before use. Environment
//! variables can be referenced as `${VAR}` or `${VAR:-default}`, which keeps RPC
//! endpoints and API keys out of checked-in files.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files:
//! - Use `include = ["network.toml", "io.toml"]` to include other config files
//! - Each top-level section must be unique across all files (no duplicates allowed)

#[cfg(feature = "testing")]
pub mod builders;
mod loader;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Upper bound on the worker pool size.
pub const MAX_WORKERS: usize = 10_000;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep only the message, not the echoed input
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for a benchmark run.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Run identity and worker pool size.
	pub bench: BenchConfig,
	/// Target network.
	pub network: NetworkConfig,
	/// Transaction envelope parameters.
	#[serde(default)]
	pub transaction: TransactionConfig,
	/// Signer selection.
	#[serde(default)]
	pub account: AccountConfig,
	/// Chain client selection and confirmation policy.
	pub delivery: DeliveryConfig,
	/// Where the request batch is read from.
	pub input: InputConfig,
	/// Where the outcome report is written to.
	pub output: OutputConfig,
	/// Optional load generator launched before dispatch.
	pub generator: Option<GeneratorConfig>,
}

/// Run identity and worker pool size.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BenchConfig {
	/// Identifier used in logs and the batch summary.
	pub id: String,
	/// Maximum number of request pipelines in flight.
	/// Defaults to 100 if not specified.
	#[serde(default = "default_workers")]
	pub workers: usize,
}

fn default_workers() -> usize {
	100
}

/// Target network configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
	/// EIP-155 chain identifier.
	pub chain_id: u64,
	/// HTTP(S) JSON-RPC endpoint. Required by network-backed delivery implementations.
	#[serde(default)]
	pub rpc_url: String,
}

/// How the gas price of each envelope is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GasPriceMode {
	/// Use `gas_price_gwei` for every transaction.
	#[default]
	Fixed,
	/// Query the chain client once per batch.
	Network,
}

/// How account nonces are assigned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NonceStrategy {
	/// Fetch the nonce from the chain independently for every request.
	#[default]
	Chain,
	/// Reserve nonces locally per account, serializing same-account requests
	/// from nonce lookup through broadcast.
	Reserved,
}

/// Transaction envelope parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransactionConfig {
	/// Gas limit for every transaction.
	#[serde(default = "default_gas_limit")]
	pub gas_limit: u64,
	/// Gas price selection mode.
	#[serde(default)]
	pub gas_price: GasPriceMode,
	/// Gas price in gwei used in `fixed` mode.
	#[serde(default = "default_gas_price_gwei")]
	pub gas_price_gwei: u64,
	/// Nonce assignment strategy.
	#[serde(default)]
	pub nonce_strategy: NonceStrategy,
}

impl Default for TransactionConfig {
	fn default() -> Self {
		Self {
			gas_limit: default_gas_limit(),
			gas_price: GasPriceMode::default(),
			gas_price_gwei: default_gas_price_gwei(),
			nonce_strategy: NonceStrategy::default(),
		}
	}
}

impl TransactionConfig {
	/// Fixed gas price in wei.
	pub fn gas_price_wei(&self) -> u128 {
		self.gas_price_gwei as u128 * 1_000_000_000
	}
}

fn default_gas_limit() -> u64 {
	300_000
}

fn default_gas_price_gwei() -> u64 {
	30
}

/// Signer selection.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountConfig {
	/// Account implementation used to sign every request.
	#[serde(default = "default_account_primary")]
	pub primary: String,
}

impl Default for AccountConfig {
	fn default() -> Self {
		Self {
			primary: default_account_primary(),
		}
	}
}

fn default_account_primary() -> String {
	"local".to_string()
}

/// Chain client selection and confirmation policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeliveryConfig {
	/// Which implementation to use.
	pub primary: String,
	/// Upper bound on each receipt wait, in seconds. `0` waits indefinitely.
	/// Defaults to 120 seconds if not specified.
	#[serde(default = "default_confirmation_timeout_seconds")]
	pub confirmation_timeout_seconds: u64,
	/// Map of delivery implementation names to their raw configurations.
	#[serde(default)]
	pub implementations: HashMap<String, toml::Value>,
}

fn default_confirmation_timeout_seconds() -> u64 {
	120
}

/// Request batch source.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InputConfig {
	/// Which implementation to use.
	pub primary: String,
	/// Map of source implementation names to their raw configurations.
	#[serde(default)]
	pub implementations: HashMap<String, toml::Value>,
}

/// Report destination.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
	/// Which implementation to use.
	pub primary: String,
	/// Optional path for a JSON batch summary.
	pub summary_path: Option<PathBuf>,
	/// Map of writer implementation names to their raw configurations.
	#[serde(default)]
	pub implementations: HashMap<String, toml::Value>,
}

/// External load generator launched before dispatch.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneratorConfig {
	/// Program to execute.
	pub command: String,
	/// Arguments passed to the program.
	#[serde(default)]
	pub args: Vec<String>,
	/// File the generator stages the batch into; readiness is judged on it.
	pub ready_file: PathBuf,
	/// How long to wait for the batch to be staged.
	#[serde(default = "default_ready_timeout_seconds")]
	pub ready_timeout_seconds: u64,
	/// Poll interval; the file counts as staged once its size is unchanged for one interval.
	#[serde(default = "default_settle_interval_ms")]
	pub settle_interval_ms: u64,
}

fn default_ready_timeout_seconds() -> u64 {
	60
}

fn default_settle_interval_ms() -> u64 {
	500
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last = 0;

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let value = match std::env::var(var_name.as_str()) {
			Ok(v) => v,
			Err(_) => match cap.get(2) {
				Some(default) => default.as_str().to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name.as_str()
					)))
				},
			},
		};

		result.push_str(&input[last..full_match.start()]);
		result.push_str(&value);
		last = full_match.end();
	}
	result.push_str(&input[last..]);

	Ok(result)
}

impl Config {
	/// Loads configuration from a file, following `include` directives.
	pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path.file_name().ok_or_else(|| {
			ConfigError::Validation(format!("Invalid path: {}", path.display()))
		})?;
		loader.load_config(file_name).await
	}

	/// Validates the configuration.
	///
	/// Checks:
	/// - bench id is not empty and the worker count is within bounds
	/// - the chain id is set and the gas limit is positive
	/// - every `primary` refers to a configured implementation
	/// - the generator command, if any, is not empty
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.bench.id.trim().is_empty() {
			return Err(ConfigError::Validation("Bench ID cannot be empty".into()));
		}
		if self.bench.workers == 0 {
			return Err(ConfigError::Validation(
				"workers must be at least 1".into(),
			));
		}
		if self.bench.workers > MAX_WORKERS {
			return Err(ConfigError::Validation(format!(
				"workers cannot exceed {}",
				MAX_WORKERS
			)));
		}

		if self.network.chain_id == 0 {
			return Err(ConfigError::Validation(
				"network.chain_id must be greater than 0".into(),
			));
		}

		if self.transaction.gas_limit == 0 {
			return Err(ConfigError::Validation(
				"transaction.gas_limit must be greater than 0".into(),
			));
		}
		if self.transaction.gas_price == GasPriceMode::Fixed && self.transaction.gas_price_gwei == 0
		{
			return Err(ConfigError::Validation(
				"transaction.gas_price_gwei must be greater than 0 in fixed mode".into(),
			));
		}

		if self.account.primary.is_empty() {
			return Err(ConfigError::Validation(
				"Account primary implementation cannot be empty".into(),
			));
		}

		validate_primary("delivery", &self.delivery.primary, &self.delivery.implementations)?;
		validate_primary("input", &self.input.primary, &self.input.implementations)?;
		validate_primary("output", &self.output.primary, &self.output.implementations)?;

		if let Some(generator) = &self.generator {
			if generator.command.trim().is_empty() {
				return Err(ConfigError::Validation(
					"generator.command cannot be empty".into(),
				));
			}
			if generator.settle_interval_ms == 0 {
				return Err(ConfigError::Validation(
					"generator.settle_interval_ms must be greater than 0".into(),
				));
			}
		}

		Ok(())
	}

	/// Returns the raw table of the primary delivery implementation.
	pub fn delivery_implementation(&self) -> Option<&toml::Value> {
		self.delivery.implementations.get(&self.delivery.primary)
	}

	/// Returns the raw table of the primary input implementation.
	pub fn input_implementation(&self) -> Option<&toml::Value> {
		self.input.implementations.get(&self.input.primary)
	}

	/// Returns the raw table of the primary output implementation.
	pub fn output_implementation(&self) -> Option<&toml::Value> {
		self.output.implementations.get(&self.output.primary)
	}
}

fn validate_primary(
	section: &str,
	primary: &str,
	implementations: &HashMap<String, toml::Value>,
) -> Result<(), ConfigError> {
	if primary.is_empty() {
		return Err(ConfigError::Validation(format!(
			"{} primary implementation cannot be empty",
			section
		)));
	}
	if !implementations.contains_key(primary) {
		return Err(ConfigError::Validation(format!(
			"Primary {} '{}' not found in implementations",
			section, primary
		)));
	}
	Ok(())
}

/// Parses configuration from a TOML string.
///
/// Environment variables are resolved and the configuration is validated after
/// parsing.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
