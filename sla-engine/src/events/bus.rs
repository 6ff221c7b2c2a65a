//! Event bus for lifecycle notifications
//!
//! Tokio broadcast channel; publishing never blocks and works without an
//! async runtime, so the synchronous desk can publish directly.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

use super::types::LifecycleEvent;

/// Channel capacity for broadcast
const CHANNEL_CAPACITY: usize = 256;

/// Shared reference to EventBus
pub type SharedEventBus = Arc<EventBus>;

/// Broadcast pub/sub for [`LifecycleEvent`]s
pub struct EventBus {
    sender: broadcast::Sender<LifecycleEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(CHANNEL_CAPACITY)
    }

    /// Bus whose slow subscribers lag after `capacity` unread events.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Create a shared reference to this event bus
    pub fn shared(self) -> SharedEventBus {
        Arc::new(self)
    }

    /// Publish an event; returns how many subscribers received it.
    pub fn publish(&self, event: LifecycleEvent) -> usize {
        let event_type = event.event_type();
        let ticket_id = event.ticket_id().to_string();

        match self.sender.send(event) {
            Ok(count) => {
                debug!(event_type, ticket_id, receivers = count, "Event published");
                count
            }
            Err(_) => {
                // No receivers is OK
                debug!(event_type, ticket_id, "Event published (no receivers)");
                0
            }
        }
    }

    /// Subscribe to receive events
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.sender.subscribe()
    }

    /// Get the number of current subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
