//! Transaction delivery module for the transaction latency benchmark.
//!
//! This module talks to the chain on behalf of the dispatcher: it reads account
//! nonces and the network gas price, broadcasts signed transactions and waits for
//! their receipts. Implementations are selected by name from configuration.

use alloy_primitives::Address;
use async_trait::async_trait;
use latency_config::NetworkConfig;
use latency_types::{
	ConfigSchema, ImplementationRegistry, SignedTransaction, TransactionHash, TransactionReceipt,
};
use std::time::Duration;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod evm {
		pub mod alloy;
	}
	pub mod mock;
}

/// Errors that can occur during transaction delivery operations.
#[derive(Debug, Error)]
pub enum DeliveryError {
	/// Error that occurs during network communication.
	#[error("Network error: {0}")]
	Network(String),
	/// Error that occurs when the node rejects a transaction.
	#[error("Transaction failed: {0}")]
	TransactionFailed(String),
	/// Error that occurs when no receipt arrives within the confirmation timeout.
	#[error("Timed out after {0}s waiting for receipt")]
	Timeout(u64),
	/// Error that occurs when an implementation is misconfigured.
	#[error("Invalid configuration: {0}")]
	InvalidConfig(String),
}

/// Trait defining the interface for chain clients.
///
/// This trait must be implemented by any delivery implementation that wants to
/// integrate with the benchmark. Methods are called concurrently from many
/// request pipelines and must be safe to share.
#[async_trait]
pub trait DeliveryInterface: Send + Sync {
	/// Returns the configuration schema for this delivery implementation.
	///
	/// The schema is used to validate the implementation's TOML table before the
	/// implementation is created.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Gets the current transaction count for an address.
	async fn get_nonce(&self, address: Address) -> Result<u64, DeliveryError>;

	/// Broadcasts a signed transaction and returns the hash reported by the node.
	async fn broadcast(&self, tx: &SignedTransaction) -> Result<TransactionHash, DeliveryError>;

	/// Waits until the transaction is mined and returns its receipt.
	///
	/// Implementations wait indefinitely; bounding the wait is up to the caller.
	async fn wait_for_receipt(
		&self,
		hash: &TransactionHash,
	) -> Result<TransactionReceipt, DeliveryError>;

	/// Gets the current network gas price in wei.
	async fn get_gas_price(&self) -> Result<u128, DeliveryError>;
}

/// Type alias for delivery factory functions.
///
/// Receives the implementation's raw TOML table and the target network.
pub type DeliveryFactory =
	fn(&toml::Value, &NetworkConfig) -> Result<Box<dyn DeliveryInterface>, DeliveryError>;

/// Registry trait for delivery implementations.
pub trait DeliveryRegistry: ImplementationRegistry<Factory = DeliveryFactory> {}

/// Get all registered delivery implementations.
///
/// Returns a vector of (name, factory) tuples for all available delivery implementations.
pub fn get_all_implementations() -> Vec<(&'static str, DeliveryFactory)> {
	use implementations::{evm::alloy, mock};

	vec![
		(alloy::Registry::NAME, alloy::Registry::factory()),
		(mock::Registry::NAME, mock::Registry::factory()),
	]
}

/// Service that manages transaction delivery.
///
/// Wraps the configured implementation and applies the confirmation timeout to
/// every receipt wait.
pub struct DeliveryService {
	/// The underlying delivery implementation.
	implementation: Box<dyn DeliveryInterface>,
	/// Upper bound on each receipt wait. `None` waits indefinitely.
	confirmation_timeout: Option<Duration>,
}

impl DeliveryService {
	/// Creates a new DeliveryService.
	///
	/// A `confirmation_timeout_seconds` of zero disables the timeout.
	pub fn new(
		implementation: Box<dyn DeliveryInterface>,
		confirmation_timeout_seconds: u64,
	) -> Self {
		let confirmation_timeout = (confirmation_timeout_seconds > 0)
			.then(|| Duration::from_secs(confirmation_timeout_seconds));
		Self {
			implementation,
			confirmation_timeout,
		}
	}

	/// Gets the current transaction count for an address.
	pub async fn get_nonce(&self, address: Address) -> Result<u64, DeliveryError> {
		self.implementation.get_nonce(address).await
	}

	/// Broadcasts a signed transaction.
	pub async fn broadcast(
		&self,
		tx: &SignedTransaction,
	) -> Result<TransactionHash, DeliveryError> {
		self.implementation.broadcast(tx).await
	}

	/// Waits for the transaction's receipt, bounded by the confirmation timeout.
	pub async fn confirm(
		&self,
		hash: &TransactionHash,
	) -> Result<TransactionReceipt, DeliveryError> {
		let wait = self.implementation.wait_for_receipt(hash);
		match self.confirmation_timeout {
			Some(limit) => tokio::time::timeout(limit, wait)
				.await
				.map_err(|_| DeliveryError::Timeout(limit.as_secs()))?,
			None => wait.await,
		}
	}

	/// Gets the current network gas price in wei.
	pub async fn get_gas_price(&self) -> Result<u128, DeliveryError> {
		self.implementation.get_gas_price().await
	}
}

#[cfg(test)]
mod tests {
	use super::implementations::mock::MockDelivery;
	use super::*;

	fn stalled_hash() -> TransactionHash {
		TransactionHash(vec![0xaa; 32])
	}

	#[tokio::test(start_paused = true)]
	async fn test_confirm_times_out() {
		let mock = MockDelivery::default();
		mock.stall(stalled_hash());
		let service = DeliveryService::new(Box::new(mock), 3);

		let result = service.confirm(&stalled_hash()).await;
		assert!(matches!(result, Err(DeliveryError::Timeout(3))));
	}

	#[tokio::test]
	async fn test_zero_timeout_is_unbounded() {
		let service = DeliveryService::new(Box::new(MockDelivery::default()), 0);
		assert!(service.confirmation_timeout.is_none());
	}

	#[test]
	fn test_registered_implementations() {
		let names: Vec<_> = get_all_implementations()
			.into_iter()
			.map(|(name, _)| name)
			.collect();
		assert_eq!(names, vec!["evm_alloy", "mock"]);
	}
}
