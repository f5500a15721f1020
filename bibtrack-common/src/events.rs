//! Event types for the BibTrack notification system
//!
//! Provides the shared `RaceEvent` definitions and the `EventBus` used to
//! fan leaderboard and clock mutations out to subscribers.
//!
//! # Architecture
//!
//! BibTrack uses hybrid communication:
//! - **EventBus** (tokio::broadcast): one-to-many push to SSE subscribers
//! - **Finish channel** (tokio::mpsc): tracking pipeline → store writer
//! - **Shared state** (tokio::RwLock): read-heavy access to store and clock

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::{RaceClockState, ResultEntry};

/// Events pushed to leaderboard subscribers.
///
/// Two delivery shapes: the incremental variants carry a payload a client
/// can apply locally; `Reload` carries none and instructs clients to drop
/// local state and refetch the full leaderboard. Any mutation that could
/// leave a naively-patched client view stale or duplicated (bib renumber,
/// roster import, reorder, delete) goes out as `Reload`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RaceEvent {
    /// A new finisher appeared on the leaderboard.
    ResultAdded {
        entry: ResultEntry,
        timestamp: DateTime<Utc>,
    },

    /// An existing entry changed in place (finish time or identity fields).
    ResultUpdated {
        entry: ResultEntry,
        timestamp: DateTime<Utc>,
    },

    /// Race clock state changed (start/stop/edit/reset).
    ClockUpdated {
        clock: RaceClockState,
        timestamp: DateTime<Utc>,
    },

    /// Full-collection change; subscribers must refetch.
    Reload { timestamp: DateTime<Utc> },
}

impl RaceEvent {
    /// Get event type as string for SSE event naming and filtering
    pub fn event_type(&self) -> &str {
        match self {
            RaceEvent::ResultAdded { .. } => "ResultAdded",
            RaceEvent::ResultUpdated { .. } => "ResultUpdated",
            RaceEvent::ClockUpdated { .. } => "ClockUpdated",
            RaceEvent::Reload { .. } => "Reload",
        }
    }

    pub fn result_added(entry: ResultEntry) -> Self {
        RaceEvent::ResultAdded {
            entry,
            timestamp: Utc::now(),
        }
    }

    pub fn result_updated(entry: ResultEntry) -> Self {
        RaceEvent::ResultUpdated {
            entry,
            timestamp: Utc::now(),
        }
    }

    pub fn clock_updated(clock: RaceClockState) -> Self {
        RaceEvent::ClockUpdated {
            clock,
            timestamp: Utc::now(),
        }
    }

    pub fn reload() -> Self {
        RaceEvent::Reload {
            timestamp: Utc::now(),
        }
    }
}

/// Central event distribution bus for leaderboard and clock events.
///
/// Uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
///
/// A subscriber whose receiver is dropped (connection closed) is removed
/// from the active set without affecting delivery to the others.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<RaceEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events. Events emitted before subscription
    /// are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<RaceEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers.
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists,
    /// `Err` otherwise.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: RaceEvent) -> Result<usize, broadcast::error::SendError<RaceEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring whether anyone is listening.
    pub fn emit_lossy(&self, event: RaceEvent) {
        let _ = self.tx.send(event);
    }

    /// Current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
