//! Local private-key account implementation.
//!
//! Signs legacy EIP-155 transactions in-process with an alloy
//! [`PrivateKeySigner`] and encodes them as EIP-2718 envelopes.

use crate::{AccountError, AccountInterface};
use alloy_consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy_eips::eip2718::Encodable2718;
use alloy_primitives::{Address, TxKind, U256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use latency_types::{ChainTransaction, SecretString, SignedTransaction, TransactionHash};

/// Account backed by a private key held in memory.
pub struct LocalWallet {
	signer: PrivateKeySigner,
}

impl LocalWallet {
	/// Parses a hex private key, with or without `0x` prefix.
	pub fn new(private_key: &SecretString) -> Result<Self, AccountError> {
		let signer = private_key.with_exposed(|key| {
			key.trim()
				.parse::<PrivateKeySigner>()
				.map_err(|_| AccountError::InvalidKey("Invalid private key format".to_string()))
		})?;
		Ok(Self { signer })
	}
}

#[async_trait]
impl AccountInterface for LocalWallet {
	fn address(&self) -> Address {
		self.signer.address()
	}

	async fn sign_transaction(
		&self,
		tx: &ChainTransaction,
	) -> Result<SignedTransaction, AccountError> {
		let legacy = TxLegacy {
			chain_id: Some(tx.chain_id),
			nonce: tx.nonce,
			gas_price: tx.gas_price,
			gas_limit: tx.gas_limit,
			to: TxKind::Call(tx.to),
			value: U256::ZERO,
			input: tx.data.clone(),
		};

		let signature = self
			.signer
			.sign_hash_sync(&legacy.signature_hash())
			.map_err(|e| AccountError::SigningFailed(e.to_string()))?;
		let signed = legacy.into_signed(signature);
		let hash = *signed.hash();
		let raw = TxEnvelope::Legacy(signed).encoded_2718();

		Ok(SignedTransaction {
			hash: TransactionHash(hash.0.to_vec()),
			raw: raw.into(),
		})
	}
}

/// Factory function to create a local account from a request key.
pub fn create_account(
	private_key: &SecretString,
) -> Result<Box<dyn AccountInterface>, AccountError> {
	Ok(Box::new(LocalWallet::new(private_key)?))
}

/// Registry for the local account implementation.
pub struct Registry;

impl latency_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "local";
	type Factory = crate::AccountFactory;

	fn factory() -> Self::Factory {
		create_account
	}
}

impl crate::AccountRegistry for Registry {}
