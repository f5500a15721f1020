//! Wire types shared between the tracking pipeline, the leaderboard store,
//! and clients.
//!
//! All JSON field names are camelCase to match the admin and viewer clients.
//! These records are validated at the transport boundary; business logic
//! never sees untyped payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One leaderboard row, one per participant.
///
/// `finish_time_ms == None` means "not yet finished". `rank` is defined iff
/// the finish time is defined; ranks form a contiguous 1..N ordering over
/// all finished entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultEntry {
    /// Stable per-participant identifier.
    pub id: Uuid,
    pub bib_number: String,
    pub racer_name: String,
    pub finish_time_ms: Option<f64>,
    pub rank: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
}

impl ResultEntry {
    pub fn has_finished(&self) -> bool {
        self.finish_time_ms.is_some()
    }
}

/// Immutable roster entry, keyed by bib number.
///
/// Populated only by roster import; finish processing never mutates these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub bib_number: String,
    pub racer_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
}

/// A finish-line crossing, as produced by the tracking pipeline.
///
/// The sole channel by which tracking state becomes a leaderboard entry;
/// immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishEvent {
    pub tracker_id: u32,
    /// Resolved bib, or the `Unknown-{trackerId}` placeholder when no bib
    /// could be read.
    pub bib_number: String,
    /// Wall-clock instant of the crossing. Authoritative for official
    /// timing: the processing pipeline may run slower or faster than real
    /// time, so the source clock must not be used for results.
    pub wall_clock_time: DateTime<Utc>,
    /// Source-clock position of the crossing (e.g. video timestamp).
    pub capture_time_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inferred_race_time_ms: Option<f64>,
}

/// Race clock status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockStatus {
    Stopped,
    Running,
    Paused,
}

impl std::fmt::Display for ClockStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClockStatus::Stopped => write!(f, "stopped"),
            ClockStatus::Running => write!(f, "running"),
            ClockStatus::Paused => write!(f, "paused"),
        }
    }
}

/// Published race clock state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaceClockState {
    pub race_start_time: Option<DateTime<Utc>>,
    pub status: ClockStatus,
    /// Cumulative manual adjustment in milliseconds; independent of
    /// `race_start_time`.
    pub offset: f64,
}

/// Outcome of a roster import batch. Row-level failures are collected here
/// alongside the rows that succeeded; an import is never all-or-nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub created: u32,
    pub updated: u32,
    pub errors: Vec<String>,
}
