//! Event bus for dispatch progress.
//!
//! A thin wrapper around a tokio broadcast channel. Publishing never blocks; when
//! nobody is subscribed the event is simply dropped.

use latency_types::DispatchEvent;
use tokio::sync::broadcast;

/// Default number of buffered events per subscriber.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Broadcast channel carrying [`DispatchEvent`]s.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<DispatchEvent>,
}

impl EventBus {
	/// Creates a new event bus with the given per-subscriber capacity.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	/// Subscribes to events published from now on.
	pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
		self.sender.subscribe()
	}

	/// Publishes an event to all subscribers.
	///
	/// Fails only when there are no subscribers.
	pub fn publish(
		&self,
		event: DispatchEvent,
	) -> Result<(), broadcast::error::SendError<DispatchEvent>> {
		self.sender.send(event)?;
		Ok(())
	}
}

impl Default for EventBus {
	fn default() -> Self {
		Self::new(DEFAULT_CAPACITY)
	}
}
