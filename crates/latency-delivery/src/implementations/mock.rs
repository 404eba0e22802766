//! In-process mock chain for dry runs and tests.
//!
//! The mock decodes every broadcast, recovers its sender and enforces sequential
//! nonces per account the way a node's transaction pool does. Behavior can be
//! steered per request through the first four bytes of the call data: a matching
//! `fail_selector` is rejected at broadcast, `revert_selector` is mined with a
//! failed status and `stall_selector` is never mined.

use crate::{DeliveryError, DeliveryInterface};
use alloy_consensus::{Transaction, TxEnvelope};
use alloy_eips::eip2718::Decodable2718;
use alloy_primitives::Address;
use async_trait::async_trait;
use dashmap::DashMap;
use latency_config::NetworkConfig;
use latency_types::{
	without_0x_prefix, ConfigSchema, Field, FieldType, Schema, SignedTransaction,
	TransactionHash, TransactionReceipt, ValidationError,
};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Gas price reported when none is configured: 1 gwei.
const DEFAULT_GAS_PRICE_WEI: u128 = 1_000_000_000;

/// Fate of an accepted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fate {
	Success,
	Revert,
	Stall,
}

/// Tunables for the mock chain.
#[derive(Debug, Clone, Default)]
pub struct MockSettings {
	/// Delay before every nonce lookup.
	pub nonce_latency: Duration,
	/// Delay before a broadcast is accepted.
	pub broadcast_latency: Duration,
	/// Delay before a receipt is returned.
	pub confirm_latency: Duration,
	/// Call data prefix rejected at broadcast.
	pub fail_selector: Option<Vec<u8>>,
	/// Call data prefix mined with a failed status.
	pub revert_selector: Option<Vec<u8>>,
	/// Call data prefix never mined.
	pub stall_selector: Option<Vec<u8>>,
	/// Reported gas price; `None` makes gas price queries fail.
	pub gas_price: Option<u128>,
}

#[derive(Default)]
struct MockState {
	/// Next expected nonce per sender.
	nonces: DashMap<Address, u64>,
	/// Accepted transactions.
	transactions: DashMap<TransactionHash, Fate>,
	/// Last mined block.
	block_number: AtomicU64,
	/// Calls currently executing.
	in_flight: AtomicUsize,
	/// Highest value `in_flight` reached.
	max_in_flight: AtomicUsize,
	/// Number of broadcasts accepted.
	accepted: AtomicUsize,
}

/// Tracks one executing call in the in-flight gauge.
struct InFlightGuard<'a>(&'a MockState);

impl<'a> InFlightGuard<'a> {
	fn enter(state: &'a MockState) -> Self {
		let current = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
		state.max_in_flight.fetch_max(current, Ordering::SeqCst);
		Self(state)
	}
}

impl Drop for InFlightGuard<'_> {
	fn drop(&mut self) {
		self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
	}
}

/// Mock delivery implementation.
///
/// Clones share the same chain state, so a test can keep a handle for inspection
/// after boxing another clone into a service.
#[derive(Clone)]
pub struct MockDelivery {
	settings: MockSettings,
	state: Arc<MockState>,
}

impl Default for MockDelivery {
	fn default() -> Self {
		Self::new(MockSettings {
			gas_price: Some(DEFAULT_GAS_PRICE_WEI),
			..MockSettings::default()
		})
	}
}

impl MockDelivery {
	/// Creates a mock chain with the given settings.
	pub fn new(settings: MockSettings) -> Self {
		Self {
			settings,
			state: Arc::new(MockState::default()),
		}
	}

	/// Highest number of concurrently executing calls observed.
	pub fn max_in_flight(&self) -> usize {
		self.state.max_in_flight.load(Ordering::SeqCst)
	}

	/// Number of broadcasts accepted so far.
	pub fn accepted(&self) -> usize {
		self.state.accepted.load(Ordering::SeqCst)
	}

	/// Next nonce the mock expects from `address`.
	pub fn next_nonce(&self, address: Address) -> u64 {
		self.state.nonces.get(&address).map(|n| *n).unwrap_or(0)
	}

	/// Registers a transaction that will never be mined.
	pub fn stall(&self, hash: TransactionHash) {
		self.state.transactions.insert(hash, Fate::Stall);
	}

	fn fate_of(&self, input: &[u8]) -> Fate {
		let matches = |selector: &Option<Vec<u8>>| {
			selector
				.as_deref()
				.is_some_and(|s| !s.is_empty() && input.starts_with(s))
		};
		if matches(&self.settings.stall_selector) {
			Fate::Stall
		} else if matches(&self.settings.revert_selector) {
			Fate::Revert
		} else {
			Fate::Success
		}
	}
}

/// Configuration schema for the mock delivery implementation.
pub struct MockDeliverySchema;

impl ConfigSchema for MockDeliverySchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let latency = |name: &str| {
			Field::new(
				name,
				FieldType::Integer {
					min: Some(0),
					max: Some(600_000),
				},
			)
		};
		let selector = |name: &str| {
			Field::new(name, FieldType::String).with_validator(|value| {
				let s = value.as_str().unwrap_or_default();
				match hex::decode(without_0x_prefix(s)) {
					Ok(bytes) if !bytes.is_empty() => Ok(()),
					_ => Err("must be a non-empty hex string".to_string()),
				}
			})
		};

		let schema = Schema::new(
			// Required fields
			vec![],
			// Optional fields
			vec![
				latency("nonce_latency_ms"),
				latency("broadcast_latency_ms"),
				latency("confirm_latency_ms"),
				selector("fail_selector"),
				selector("revert_selector"),
				selector("stall_selector"),
				Field::new(
					"gas_price_wei",
					FieldType::Integer {
						min: Some(1),
						max: None,
					},
				),
				Field::new("fail_gas_price", FieldType::Boolean),
			],
		);

		schema.validate(config)
	}
}

#[async_trait]
impl DeliveryInterface for MockDelivery {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MockDeliverySchema)
	}

	async fn get_nonce(&self, address: Address) -> Result<u64, DeliveryError> {
		let _guard = InFlightGuard::enter(&self.state);
		tokio::time::sleep(self.settings.nonce_latency).await;
		Ok(self.next_nonce(address))
	}

	async fn broadcast(&self, tx: &SignedTransaction) -> Result<TransactionHash, DeliveryError> {
		let _guard = InFlightGuard::enter(&self.state);
		tokio::time::sleep(self.settings.broadcast_latency).await;

		let envelope = TxEnvelope::decode_2718(&mut tx.raw.as_ref())
			.map_err(|e| DeliveryError::TransactionFailed(format!("Invalid transaction: {}", e)))?;

		let input = envelope.input();
		if let Some(selector) = self.settings.fail_selector.as_deref() {
			if !selector.is_empty() && input.starts_with(selector) {
				return Err(DeliveryError::TransactionFailed(
					"Mock broadcast rejected".to_string(),
				));
			}
		}

		let sender = envelope
			.recover_signer()
			.map_err(|e| DeliveryError::TransactionFailed(format!("Invalid signature: {}", e)))?;
		let nonce = envelope.nonce();

		{
			let mut expected = self.state.nonces.entry(sender).or_insert(0);
			if nonce < *expected {
				return Err(DeliveryError::TransactionFailed(format!(
					"nonce too low: next nonce {}, tx nonce {}",
					*expected, nonce
				)));
			}
			if nonce > *expected {
				return Err(DeliveryError::TransactionFailed(format!(
					"nonce too high: next nonce {}, tx nonce {}",
					*expected, nonce
				)));
			}
			*expected += 1;
		}

		let hash = TransactionHash(envelope.tx_hash().0.to_vec());
		self.state
			.transactions
			.insert(hash.clone(), self.fate_of(input));
		self.state.accepted.fetch_add(1, Ordering::SeqCst);

		Ok(hash)
	}

	async fn wait_for_receipt(
		&self,
		hash: &TransactionHash,
	) -> Result<TransactionReceipt, DeliveryError> {
		let _guard = InFlightGuard::enter(&self.state);

		let fate = self
			.state
			.transactions
			.get(hash)
			.map(|f| *f)
			.ok_or_else(|| DeliveryError::Network(format!("Unknown transaction {}", hash)))?;

		if fate == Fate::Stall {
			std::future::pending::<()>().await;
		}
		tokio::time::sleep(self.settings.confirm_latency).await;

		Ok(TransactionReceipt {
			hash: hash.clone(),
			block_number: self.state.block_number.fetch_add(1, Ordering::SeqCst) + 1,
			success: fate == Fate::Success,
		})
	}

	async fn get_gas_price(&self) -> Result<u128, DeliveryError> {
		self.settings
			.gas_price
			.ok_or_else(|| DeliveryError::Network("Mock gas price unavailable".to_string()))
	}
}

fn millis(config: &toml::Value, key: &str) -> Duration {
	let ms = config
		.get(key)
		.and_then(|v| v.as_integer())
		.unwrap_or(0);
	Duration::from_millis(ms as u64)
}

fn selector(config: &toml::Value, key: &str) -> Option<Vec<u8>> {
	config
		.get(key)
		.and_then(|v| v.as_str())
		.and_then(|s| hex::decode(without_0x_prefix(s)).ok())
}

/// Factory function to create a mock delivery implementation from configuration.
///
/// # Parameters
/// - `config`: TOML table containing optional latencies (`nonce_latency_ms`,
///   `broadcast_latency_ms`, `confirm_latency_ms`), selectors (`fail_selector`,
///   `revert_selector`, `stall_selector`), `gas_price_wei` and `fail_gas_price`
/// - `_network`: unused; the mock accepts any chain id
pub fn create_mock_delivery(
	config: &toml::Value,
	_network: &NetworkConfig,
) -> Result<Box<dyn DeliveryInterface>, DeliveryError> {
	MockDeliverySchema
		.validate(config)
		.map_err(|e| DeliveryError::InvalidConfig(e.to_string()))?;

	let fail_gas_price = config
		.get("fail_gas_price")
		.and_then(|v| v.as_bool())
		.unwrap_or(false);
	let gas_price = config
		.get("gas_price_wei")
		.and_then(|v| v.as_integer())
		.map(|v| v as u128)
		.unwrap_or(DEFAULT_GAS_PRICE_WEI);

	let settings = MockSettings {
		nonce_latency: millis(config, "nonce_latency_ms"),
		broadcast_latency: millis(config, "broadcast_latency_ms"),
		confirm_latency: millis(config, "confirm_latency_ms"),
		fail_selector: selector(config, "fail_selector"),
		revert_selector: selector(config, "revert_selector"),
		stall_selector: selector(config, "stall_selector"),
		gas_price: (!fail_gas_price).then_some(gas_price),
	};

	Ok(Box::new(MockDelivery::new(settings)))
}

/// Registry for the mock delivery implementation.
pub struct Registry;

impl latency_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "mock";
	type Factory = crate::DeliveryFactory;

	fn factory() -> Self::Factory {
		create_mock_delivery
	}
}

impl crate::DeliveryRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::{address, Bytes};
	use latency_account::implementations::local::LocalWallet;
	use latency_account::AccountInterface;
	use latency_types::{ChainTransaction, SecretString};

	const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

	async fn signed(nonce: u64, data: &[u8]) -> SignedTransaction {
		let wallet = LocalWallet::new(&SecretString::from(KEY)).unwrap();
		wallet
			.sign_transaction(&ChainTransaction {
				to: address!("5FbDB2315678afecb367f032d93F642f64180aa3"),
				data: Bytes::copy_from_slice(data),
				nonce,
				gas_limit: 300_000,
				gas_price: 1,
				chain_id: 31337,
			})
			.await
			.unwrap()
	}

	fn settings() -> MockSettings {
		MockSettings {
			revert_selector: Some(vec![0xde, 0xad]),
			fail_selector: Some(vec![0xfa, 0x11]),
			gas_price: Some(7),
			..MockSettings::default()
		}
	}

	#[tokio::test]
	async fn test_broadcast_and_confirm() {
		let mock = MockDelivery::new(settings());
		let sender = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");

		assert_eq!(mock.get_nonce(sender).await.unwrap(), 0);
		let tx = signed(0, &[0x01]).await;
		let hash = mock.broadcast(&tx).await.unwrap();
		assert_eq!(hash, tx.hash);
		assert_eq!(mock.get_nonce(sender).await.unwrap(), 1);

		let receipt = mock.wait_for_receipt(&hash).await.unwrap();
		assert!(receipt.success);
		assert_eq!(receipt.block_number, 1);
		assert_eq!(mock.accepted(), 1);
	}

	#[tokio::test]
	async fn test_nonce_enforcement() {
		let mock = MockDelivery::new(settings());
		mock.broadcast(&signed(0, &[0x01]).await).await.unwrap();

		let replay = mock.broadcast(&signed(0, &[0x02]).await).await;
		assert!(matches!(replay, Err(DeliveryError::TransactionFailed(m)) if m.contains("nonce too low")));

		let gap = mock.broadcast(&signed(5, &[0x02]).await).await;
		assert!(matches!(gap, Err(DeliveryError::TransactionFailed(m)) if m.contains("nonce too high")));
	}

	#[tokio::test]
	async fn test_selectors() {
		let mock = MockDelivery::new(settings());

		let reverted = mock.broadcast(&signed(0, &[0xde, 0xad, 0x00]).await).await.unwrap();
		assert!(!mock.wait_for_receipt(&reverted).await.unwrap().success);

		let rejected = mock.broadcast(&signed(1, &[0xfa, 0x11]).await).await;
		assert!(rejected.is_err());
		assert_eq!(mock.accepted(), 1);
	}

	#[tokio::test]
	async fn test_unknown_hash() {
		let mock = MockDelivery::default();
		let result = mock.wait_for_receipt(&TransactionHash(vec![0; 32])).await;
		assert!(matches!(result, Err(DeliveryError::Network(_))));
	}

	#[tokio::test]
	async fn test_factory() {
		let network = NetworkConfig {
			chain_id: 31337,
			rpc_url: String::new(),
		};
		let config: toml::Value =
			toml::from_str("confirm_latency_ms = 5\nrevert_selector = \"0xdeadbeef\"\nfail_gas_price = true")
				.unwrap();
		let delivery = create_mock_delivery(&config, &network).unwrap();
		assert!(delivery.get_gas_price().await.is_err());

		let bad: toml::Value = toml::from_str("revert_selector = \"zz\"").unwrap();
		assert!(matches!(
			create_mock_delivery(&bad, &network),
			Err(DeliveryError::InvalidConfig(_))
		));
	}
}
