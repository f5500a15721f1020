//! Leaderboard state
//!
//! The store is the single point of mutation for the published result set.
//! It owns the result entries and the roster-of-truth; the tracking
//! pipeline and request handlers reach it only through `SharedState`.

pub mod leaderboard;
pub mod roster;

pub use leaderboard::{EntryPatch, FinishRecord, LeaderboardStore, RecordOutcome};
pub use roster::{normalize_gender, parse_roster_csv, RosterBatch, RosterRow};
