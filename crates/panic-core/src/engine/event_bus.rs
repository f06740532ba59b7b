//! Broadcast channel for events of committed invocations.

use panic_types::PanicEvent;
use tokio::sync::broadcast;

/// Fan-out of contract events to any number of subscribers.
///
/// Only events of invocations that succeeded are ever published. Slow
/// subscribers lag and lose the oldest events rather than blocking the engine.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<PanicEvent>,
}

impl EventBus {
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<PanicEvent> {
		self.sender.subscribe()
	}

	/// Publishes an event. Fails only when nobody is subscribed.
	pub fn publish(
		&self,
		event: PanicEvent,
	) -> Result<usize, broadcast::error::SendError<PanicEvent>> {
		self.sender.send(event)
	}
}
