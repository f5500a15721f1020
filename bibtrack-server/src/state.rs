//! Shared session state
//!
//! One `SharedState` is constructed per race session and handed by `Arc` to
//! the request handlers, the finish ingest task, and the SSE fan-out. The
//! store and clock sit behind RwLocks so every read-modify-write sequence
//! (check, decide, write) runs under mutual exclusion; events are emitted
//! after guards are dropped.

use tokio::sync::{broadcast, RwLock};

use bibtrack_common::events::{EventBus, RaceEvent};

use crate::clock::RaceClock;
use crate::store::LeaderboardStore;

pub struct SharedState {
    pub store: RwLock<LeaderboardStore>,
    pub clock: RwLock<RaceClock>,
    event_bus: EventBus,
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            store: RwLock::new(LeaderboardStore::new()),
            clock: RwLock::new(RaceClock::new()),
            event_bus: EventBus::new(100),
        }
    }

    /// Broadcast an event to all subscribers. No receivers is OK.
    pub fn broadcast_event(&self, event: RaceEvent) {
        self.event_bus.emit_lossy(event);
    }

    /// Subscribe to the event stream (used by the SSE endpoint)
    pub fn subscribe_events(&self) -> broadcast::Receiver<RaceEvent> {
        self.event_bus.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.event_bus.subscriber_count()
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_and_clock_start_empty() {
        let state = SharedState::new();
        assert!(state.store.read().await.entries().is_empty());
        assert!(!state.clock.read().await.is_running());
    }

    #[tokio::test]
    async fn test_broadcast_reaches_subscriber() {
        let state = SharedState::new();
        let mut rx = state.subscribe_events();
        assert_eq!(state.subscriber_count(), 1);

        state.broadcast_event(RaceEvent::reload());
        assert!(matches!(rx.recv().await.unwrap(), RaceEvent::Reload { .. }));
    }
}
