//! Broadcast channel for state changes

use guard_core::StateChange;
use tokio::sync::broadcast;
use tracing::trace;

const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Fans every state write out to all subscribers
///
/// Listener filtering happens in the runtime; the bus itself carries
/// everything.
pub struct ChangeBus {
    sender: broadcast::Sender<StateChange>,
}

impl ChangeBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.sender.subscribe()
    }

    pub fn fire(&self, change: StateChange) {
        trace!(entity_id = %change.entity_id, "Firing state change");
        // No receivers is fine
        let _ = self.sender.send(change);
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new()
    }
}
