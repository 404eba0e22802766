//! Alloy-based EVM delivery implementation.
//!
//! Talks to a single JSON-RPC endpoint over HTTP. Transactions arrive already
//! signed, so the provider carries no wallet and broadcasts raw bytes.

use crate::{DeliveryError, DeliveryInterface};
use alloy_primitives::{Address, FixedBytes};
use alloy_provider::{Provider, ProviderBuilder};
use alloy_transport_http::Http;
use async_trait::async_trait;
use latency_config::NetworkConfig;
use latency_types::{
	ConfigSchema, Field, FieldType, Schema, SignedTransaction, TransactionHash, TransactionReceipt,
	ValidationError,
};
use std::sync::Arc;
use std::time::Duration;

/// Default receipt polling interval.
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Alloy-based EVM delivery implementation.
pub struct AlloyDelivery {
	/// Provider for the configured network.
	provider: Arc<dyn Provider<Http<reqwest::Client>> + Send + Sync>,
	/// How often receipts are polled.
	poll_interval: Duration,
}

impl AlloyDelivery {
	/// Creates a new AlloyDelivery for the given RPC endpoint.
	pub fn new(rpc_url: &str, poll_interval: Duration) -> Result<Self, DeliveryError> {
		let url = rpc_url
			.parse()
			.map_err(|e| DeliveryError::InvalidConfig(format!("Invalid RPC URL: {}", e)))?;

		let provider = ProviderBuilder::new().on_http(url);

		Ok(Self {
			provider: Arc::new(provider) as Arc<dyn Provider<Http<reqwest::Client>> + Send + Sync>,
			poll_interval,
		})
	}
}

/// Configuration schema for the Alloy delivery implementation.
pub struct AlloyDeliverySchema;

impl ConfigSchema for AlloyDeliverySchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			// Required fields
			vec![],
			// Optional fields
			vec![Field::new(
				"poll_interval_ms",
				FieldType::Integer {
					min: Some(1),
					max: Some(60_000),
				},
			)],
		);

		schema.validate(config)
	}
}

#[async_trait]
impl DeliveryInterface for AlloyDelivery {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(AlloyDeliverySchema)
	}

	async fn get_nonce(&self, address: Address) -> Result<u64, DeliveryError> {
		self.provider
			.get_transaction_count(address)
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to get nonce: {}", e)))
	}

	async fn broadcast(&self, tx: &SignedTransaction) -> Result<TransactionHash, DeliveryError> {
		let pending_tx = self
			.provider
			.send_raw_transaction(&tx.raw)
			.await
			.map_err(|e| DeliveryError::TransactionFailed(format!("Failed to send transaction: {}", e)))?;

		let tx_hash = *pending_tx.tx_hash();
		tracing::debug!(tx_hash = %tx_hash, "Broadcast transaction");

		Ok(TransactionHash(tx_hash.0.to_vec()))
	}

	async fn wait_for_receipt(
		&self,
		hash: &TransactionHash,
	) -> Result<TransactionReceipt, DeliveryError> {
		if hash.0.len() != 32 {
			return Err(DeliveryError::Network(format!(
				"Invalid transaction hash length: {}",
				hash.0.len()
			)));
		}
		let tx_hash = FixedBytes::<32>::from_slice(&hash.0);

		loop {
			match self.provider.get_transaction_receipt(tx_hash).await {
				Ok(Some(receipt)) => {
					return Ok(TransactionReceipt {
						hash: TransactionHash(receipt.transaction_hash.0.to_vec()),
						block_number: receipt.block_number.unwrap_or(0),
						success: receipt.status(),
					});
				},
				Ok(None) => {
					// Not mined yet
					tokio::time::sleep(self.poll_interval).await;
				},
				Err(e) => {
					return Err(DeliveryError::Network(format!(
						"Failed to get receipt: {}",
						e
					)));
				},
			}
		}
	}

	async fn get_gas_price(&self) -> Result<u128, DeliveryError> {
		self.provider
			.get_gas_price()
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to get gas price: {}", e)))
	}
}

/// Factory function to create an HTTP-based delivery implementation from configuration.
///
/// # Parameters
/// - `config`: TOML table containing:
///   - `poll_interval_ms` (optional): receipt polling interval, defaults to 1000
/// - `network`: target network; its `rpc_url` must be set
pub fn create_http_delivery(
	config: &toml::Value,
	network: &NetworkConfig,
) -> Result<Box<dyn DeliveryInterface>, DeliveryError> {
	AlloyDeliverySchema
		.validate(config)
		.map_err(|e| DeliveryError::InvalidConfig(e.to_string()))?;

	if network.rpc_url.trim().is_empty() {
		return Err(DeliveryError::InvalidConfig(
			"network.rpc_url is required for evm_alloy delivery".to_string(),
		));
	}

	let poll_interval_ms = config
		.get("poll_interval_ms")
		.and_then(|v| v.as_integer())
		.map(|v| v as u64)
		.unwrap_or(DEFAULT_POLL_INTERVAL_MS);

	let delivery = AlloyDelivery::new(&network.rpc_url, Duration::from_millis(poll_interval_ms))?;
	Ok(Box::new(delivery))
}

/// Registry for the HTTP/Alloy delivery implementation.
pub struct Registry;

impl latency_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "evm_alloy";
	type Factory = crate::DeliveryFactory;

	fn factory() -> Self::Factory {
		create_http_delivery
	}
}

impl crate::DeliveryRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;

	fn network(rpc_url: &str) -> NetworkConfig {
		NetworkConfig {
			chain_id: 11155111,
			rpc_url: rpc_url.to_string(),
		}
	}

	fn table(src: &str) -> toml::Value {
		toml::from_str(src).unwrap()
	}

	#[test]
	fn test_schema_bounds() {
		assert!(AlloyDeliverySchema.validate(&table("")).is_ok());
		assert!(AlloyDeliverySchema.validate(&table("poll_interval_ms = 250")).is_ok());
		assert!(AlloyDeliverySchema.validate(&table("poll_interval_ms = 0")).is_err());
	}

	#[test]
	fn test_factory_requires_rpc_url() {
		let result = create_http_delivery(&table(""), &network(""));
		assert!(matches!(result, Err(DeliveryError::InvalidConfig(_))));

		let result = create_http_delivery(&table(""), &network("not a url"));
		assert!(matches!(result, Err(DeliveryError::InvalidConfig(_))));
	}

	#[tokio::test]
	async fn test_factory_builds_without_connecting() {
		let result = create_http_delivery(
			&table("poll_interval_ms = 250"),
			&network("http://127.0.0.1:8545"),
		);
		assert!(result.is_ok());
	}

	#[tokio::test]
	async fn test_rejects_malformed_hash() {
		let delivery = AlloyDelivery::new("http://127.0.0.1:8545", Duration::from_millis(10)).unwrap();
		let result = delivery
			.wait_for_receipt(&TransactionHash(vec![1, 2, 3]))
			.await;
		assert!(matches!(result, Err(DeliveryError::Network(_))));
	}
}
