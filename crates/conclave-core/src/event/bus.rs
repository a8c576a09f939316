//! Fan-out of `RoundTableEvent`s to observers.
//!
//! Built on a `tokio::sync::broadcast` channel. Events published while no
//! one listens are dropped. An observer that falls behind by more than the
//! capacity sees `RecvError::Lagged` and skips ahead; publishing never waits.

use conclave_types::event::RoundTableEvent;
use tokio::sync::broadcast;

/// Capacity used by [`EventBus::default`].
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Shared sender half of the round-table event channel.
///
/// Clones publish into the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<RoundTableEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Receiver for every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<RoundTableEvent> {
        self.sender.subscribe()
    }

    /// Send `event` to current observers and return how many there were.
    pub fn publish(&self, event: RoundTableEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("observers", &self.sender.receiver_count())
            .finish()
    }
}
