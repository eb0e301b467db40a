//! Broadcast bus for desk events.
//!
//! Publishing never blocks and never fails for lack of subscribers. A slow
//! subscriber that falls more than `capacity` events behind observes a
//! `Lagged` error and skips ahead.

use orderdesk_types::DeskEvent;
use tokio::sync::broadcast;

/// Cloneable handle to the desk event channel.
#[derive(Debug, Clone)]
pub struct EventBus {
	sender: broadcast::Sender<DeskEvent>,
}

impl EventBus {
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity.max(1));
		Self { sender }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<DeskEvent> {
		self.sender.subscribe()
	}

	/// Publishes an event. Returns the number of subscribers that received it.
	pub fn publish(&self, event: DeskEvent) -> usize {
		self.sender.send(event).unwrap_or(0)
	}

	pub fn subscriber_count(&self) -> usize {
		self.sender.receiver_count()
	}
}
