//! Account module for the transaction latency benchmark.
//!
//! Every request in a batch carries its own private key, so accounts are created
//! per request from the key rather than loaded once from configuration. This module
//! defines the signing interface, the factory type implementations register, and
//! a service that builds accounts through the selected factory.

use alloy_primitives::Address;
use async_trait::async_trait;
use latency_types::{ChainTransaction, ImplementationRegistry, SecretString, SignedTransaction};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod local;
}

/// Errors that can occur during account operations.
#[derive(Debug, Error)]
pub enum AccountError {
	/// Error that occurs when signing operations fail.
	#[error("Signing failed: {0}")]
	SigningFailed(String),
	/// Error that occurs when a cryptographic key is invalid or malformed.
	#[error("Invalid key: {0}")]
	InvalidKey(String),
	/// Error that occurs when the requested implementation is unavailable.
	#[error("Implementation error: {0}")]
	Implementation(String),
}

/// Trait defining the interface for account implementations.
///
/// An account owns one signing key. It exposes the address derived from that key
/// and turns unsigned envelopes into network-encoded signed transactions.
#[async_trait]
pub trait AccountInterface: Send + Sync {
	/// Returns the address derived from the account's key.
	fn address(&self) -> Address;

	/// Signs a transaction envelope.
	///
	/// The returned payload carries the raw bytes for broadcast and the
	/// transaction hash, which is known before the transaction is sent.
	async fn sign_transaction(
		&self,
		tx: &ChainTransaction,
	) -> Result<SignedTransaction, AccountError>;
}

/// Type alias for account factory functions.
///
/// Builds an account from a request's private key. Implementations must never
/// include the key material in returned errors.
pub type AccountFactory = fn(&SecretString) -> Result<Box<dyn AccountInterface>, AccountError>;

/// Registry trait for account implementations.
pub trait AccountRegistry: ImplementationRegistry<Factory = AccountFactory> {}

/// Get all registered account implementations.
///
/// Returns a vector of (name, factory) tuples for all available account implementations.
pub fn get_all_implementations() -> Vec<(&'static str, AccountFactory)> {
	use implementations::local;

	vec![(local::Registry::NAME, local::Registry::factory())]
}

/// Service that creates accounts for request keys.
///
/// Wraps the factory of the configured implementation so callers never deal with
/// implementation selection.
pub struct AccountService {
	/// Factory of the configured account implementation.
	factory: AccountFactory,
}

impl AccountService {
	/// Creates a new AccountService with the specified factory.
	pub fn new(factory: AccountFactory) -> Self {
		Self { factory }
	}

	/// Creates a service for a registered implementation name.
	pub fn from_name(name: &str) -> Result<Self, AccountError> {
		get_all_implementations()
			.into_iter()
			.find(|(registered, _)| *registered == name)
			.map(|(_, factory)| Self::new(factory))
			.ok_or_else(|| {
				AccountError::Implementation(format!("Unknown account implementation '{}'", name))
			})
	}

	/// Builds the account owning the given key.
	pub fn account_for(
		&self,
		private_key: &SecretString,
	) -> Result<Box<dyn AccountInterface>, AccountError> {
		(self.factory)(private_key)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_from_name() {
		assert!(AccountService::from_name("local").is_ok());
		assert!(matches!(
			AccountService::from_name("hsm"),
			Err(AccountError::Implementation(_))
		));
	}
}
