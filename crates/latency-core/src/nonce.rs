//! Account nonce assignment.
//!
//! With the `chain` strategy every request reads its nonce from the chain, so
//! concurrent requests from one account can collide. With the `reserved` strategy
//! requests from the same account take turns: a reservation holds the account's
//! slot from nonce lookup until the broadcast settles, and a successful broadcast
//! advances a locally cached next nonce.

use alloy_primitives::Address;
use dashmap::DashMap;
use latency_config::NonceStrategy;
use latency_delivery::{DeliveryError, DeliveryService};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Hands out nonces according to the configured strategy.
pub struct NonceManager {
	strategy: NonceStrategy,
	delivery: Arc<DeliveryService>,
	/// Cached next nonce per account; `None` forces a chain lookup.
	accounts: DashMap<Address, Arc<Mutex<Option<u64>>>>,
}

/// A nonce assigned to one request.
///
/// Under the `reserved` strategy the account stays locked until the reservation
/// is committed, invalidated or dropped. Dropping leaves the cache untouched,
/// which is right when the nonce was never sent.
pub struct NonceReservation {
	nonce: u64,
	slot: Option<OwnedMutexGuard<Option<u64>>>,
}

impl NonceReservation {
	pub fn nonce(&self) -> u64 {
		self.nonce
	}

	/// Marks the nonce as consumed by a successful broadcast.
	pub fn commit(mut self) {
		if let Some(slot) = self.slot.as_mut() {
			**slot = Some(self.nonce + 1);
		}
	}

	/// Forgets the cached nonce so the next request reads it from the chain.
	pub fn invalidate(mut self) {
		if let Some(slot) = self.slot.as_mut() {
			**slot = None;
		}
	}
}

impl NonceManager {
	pub fn new(strategy: NonceStrategy, delivery: Arc<DeliveryService>) -> Self {
		Self {
			strategy,
			delivery,
			accounts: DashMap::new(),
		}
	}

	/// Reserves the next nonce for `address`.
	pub async fn reserve(&self, address: Address) -> Result<NonceReservation, DeliveryError> {
		match self.strategy {
			NonceStrategy::Chain => Ok(NonceReservation {
				nonce: self.delivery.get_nonce(address).await?,
				slot: None,
			}),
			NonceStrategy::Reserved => {
				let slot = self.accounts.entry(address).or_default().clone();
				let guard = slot.lock_owned().await;
				let nonce = match *guard {
					Some(cached) => cached,
					None => self.delivery.get_nonce(address).await?,
				};
				tracing::trace!(%address, nonce, "Reserved nonce");
				Ok(NonceReservation {
					nonce,
					slot: Some(guard),
				})
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::address;
	use latency_delivery::implementations::mock::MockDelivery;

	const ACCOUNT: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");

	fn manager(strategy: NonceStrategy) -> NonceManager {
		let delivery = DeliveryService::new(Box::new(MockDelivery::default()), 0);
		NonceManager::new(strategy, Arc::new(delivery))
	}

	#[tokio::test]
	async fn test_reserved_nonces_are_contiguous() {
		let nonces = manager(NonceStrategy::Reserved);

		let mut seen = Vec::new();
		for _ in 0..4 {
			let reservation = nonces.reserve(ACCOUNT).await.unwrap();
			seen.push(reservation.nonce());
			reservation.commit();
		}
		assert_eq!(seen, vec![0, 1, 2, 3]);
	}

	#[tokio::test]
	async fn test_dropped_reservation_keeps_nonce() {
		let nonces = manager(NonceStrategy::Reserved);

		nonces.reserve(ACCOUNT).await.unwrap().commit();
		let unused = nonces.reserve(ACCOUNT).await.unwrap();
		assert_eq!(unused.nonce(), 1);
		drop(unused);

		assert_eq!(nonces.reserve(ACCOUNT).await.unwrap().nonce(), 1);
	}

	#[tokio::test]
	async fn test_invalidate_refetches_from_chain() {
		let nonces = manager(NonceStrategy::Reserved);

		nonces.reserve(ACCOUNT).await.unwrap().commit();
		nonces.reserve(ACCOUNT).await.unwrap().invalidate();

		// Nothing was broadcast, so the chain still reports zero
		assert_eq!(nonces.reserve(ACCOUNT).await.unwrap().nonce(), 0);
	}

	#[tokio::test]
	async fn test_reservation_serializes_account() {
		let nonces = Arc::new(manager(NonceStrategy::Reserved));
		let held = nonces.reserve(ACCOUNT).await.unwrap();

		let waiter = {
			let nonces = nonces.clone();
			tokio::spawn(async move { nonces.reserve(ACCOUNT).await.map(|r| r.nonce()) })
		};
		tokio::time::sleep(std::time::Duration::from_millis(20)).await;
		assert!(!waiter.is_finished());

		held.commit();
		assert_eq!(waiter.await.unwrap().unwrap(), 1);
	}

	#[tokio::test]
	async fn test_chain_strategy_reads_every_time() {
		let nonces = manager(NonceStrategy::Chain);
		let first = nonces.reserve(ACCOUNT).await.unwrap();
		let second = nonces.reserve(ACCOUNT).await.unwrap();
		assert_eq!(first.nonce(), second.nonce());
	}
}
