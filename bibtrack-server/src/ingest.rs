//! Finish event ingest
//!
//! Consumes `FinishEvent`s from the tracking pipeline's bounded channel,
//! converts the wall-clock crossing instant into official race time via the
//! clock, merges the result into the leaderboard, and notifies subscribers.
//! Events are broadcast only after the store guard is dropped.

use std::sync::Arc;

use bibtrack_common::events::RaceEvent;
use bibtrack_common::time::format_race_time;
use bibtrack_common::types::FinishEvent;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::state::SharedState;
use crate::store::{FinishRecord, RecordOutcome};

/// Spawn the store-writer task for pipeline finish events.
pub fn spawn_ingest(
    state: Arc<SharedState>,
    mut finish_rx: mpsc::Receiver<FinishEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = finish_rx.recv().await {
            ingest_finish(&state, event).await;
        }
        info!("Finish ingest channel closed");
    })
}

async fn ingest_finish(state: &SharedState, event: FinishEvent) {
    let official_ms = {
        let clock = state.clock.read().await;
        match clock.official_ms(event.wall_clock_time) {
            Ok(ms) => ms,
            Err(e) => {
                // A crossing without a running clock cannot be timed;
                // substituting a guess would silently corrupt results.
                warn!(
                    "Dropping finish for racer {} (bib {}): {}",
                    event.tracker_id, event.bib_number, e
                );
                return;
            }
        }
    };

    let outcome = {
        let mut store = state.store.write().await;
        store.record_finish(FinishRecord {
            bib_number: event.bib_number.clone(),
            finish_time_ms: official_ms,
            racer_name: Some(format!("Racer {}", event.tracker_id)),
            gender: None,
            team: None,
        })
    };

    info!(
        "Racer {} finished: bib #{} at {}",
        event.tracker_id,
        event.bib_number,
        format_race_time(official_ms)
    );

    match outcome {
        RecordOutcome::Added(entry) => state.broadcast_event(RaceEvent::result_added(entry)),
        RecordOutcome::Updated(entry) => state.broadcast_event(RaceEvent::result_updated(entry)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bibtrack_common::time;

    fn crossing(bib: &str) -> FinishEvent {
        FinishEvent {
            tracker_id: 1,
            bib_number: bib.to_string(),
            wall_clock_time: time::now(),
            capture_time_ms: 4_000.0,
            inferred_race_time_ms: None,
        }
    }

    #[tokio::test]
    async fn test_finish_is_merged_and_broadcast() {
        let state = Arc::new(SharedState::new());
        state.clock.write().await.start();
        let mut events = state.subscribe_events();

        let (tx, rx) = mpsc::channel(8);
        let handle = spawn_ingest(Arc::clone(&state), rx);

        tx.send(crossing("42")).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        let store = state.store.read().await;
        let entry = store.find_by_bib("42").unwrap();
        assert!(entry.has_finished());
        assert_eq!(entry.rank, Some(1));

        match events.recv().await.unwrap() {
            RaceEvent::ResultAdded { entry, .. } => assert_eq!(entry.bib_number, "42"),
            other => panic!("expected ResultAdded, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_finish_without_running_clock_is_dropped() {
        let state = Arc::new(SharedState::new());

        let (tx, rx) = mpsc::channel(8);
        let handle = spawn_ingest(Arc::clone(&state), rx);

        tx.send(crossing("42")).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        assert!(state.store.read().await.entries().is_empty());
    }

    #[tokio::test]
    async fn test_repeated_bib_updates_in_place() {
        let state = Arc::new(SharedState::new());
        state.clock.write().await.start();

        let (tx, rx) = mpsc::channel(8);
        let handle = spawn_ingest(Arc::clone(&state), rx);

        tx.send(crossing("42")).await.unwrap();
        tx.send(crossing("42")).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        let store = state.store.read().await;
        assert_eq!(store.entries().len(), 1);
    }
}
