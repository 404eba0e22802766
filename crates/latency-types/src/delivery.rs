//! Chain-facing types for the benchmark.
//!
//! This module defines the transaction envelope handed to a signer, the signed
//! payload handed to a chain client, and the hash and receipt types returned by it.

use alloy_primitives::{Address, Bytes};
use std::fmt;

/// Blockchain transaction hash representation.
///
/// Stores transaction hashes as raw bytes so chain clients are free to use their
/// own hash types internally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct TransactionHash(pub Vec<u8>);

impl TransactionHash {
	/// Returns the hash as a 0x-prefixed lowercase hex string.
	pub fn to_hex(&self) -> String {
		format!("0x{}", hex::encode(&self.0))
	}
}

impl fmt::Display for TransactionHash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.to_hex())
	}
}

/// Transaction receipt returned once a transaction has been mined.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TransactionReceipt {
	/// The hash of the transaction.
	pub hash: TransactionHash,
	/// The block number where the transaction was included.
	pub block_number: u64,
	/// Whether the transaction executed successfully (receipt status flag).
	pub success: bool,
}

/// Unsigned chain transaction envelope.
///
/// Built by the dispatcher for every request: a plain contract call that carries
/// no value, with a fixed gas limit and a legacy gas price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainTransaction {
	/// Destination contract.
	pub to: Address,
	/// Call data.
	pub data: Bytes,
	/// Account nonce.
	pub nonce: u64,
	/// Gas limit.
	pub gas_limit: u64,
	/// Gas price in wei.
	pub gas_price: u128,
	/// EIP-155 chain identifier.
	pub chain_id: u64,
}

/// A signed, network-encoded transaction ready for broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
	/// Hash of the signed transaction, known before broadcast.
	pub hash: TransactionHash,
	/// Raw EIP-2718 encoded bytes.
	pub raw: Bytes,
}
