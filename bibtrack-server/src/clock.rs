//! Official race clock
//!
//! A time-base state machine translating wall-clock instants into official
//! elapsed race time. Independent of tracking; mutated only by operator
//! requests.
//!
//! `stop` does not accumulate an implicit pause offset — restarting after a
//! stop resumes from wall-clock "now" and only a manual `edit` corrects for
//! the downtime.

use bibtrack_common::types::{ClockStatus, RaceClockState};
use chrono::{DateTime, Utc};

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct RaceClock {
    start_time: Option<DateTime<Utc>>,
    status: ClockStatus,
    offset_ms: f64,
}

impl RaceClock {
    pub fn new() -> Self {
        Self {
            start_time: None,
            status: ClockStatus::Stopped,
            offset_ms: 0.0,
        }
    }

    /// Start the clock at wall-clock "now".
    ///
    /// Does not touch the offset: an edit made before a restart persists.
    pub fn start(&mut self) {
        self.start_at(Utc::now());
    }

    pub fn start_at(&mut self, now: DateTime<Utc>) {
        self.start_time = Some(now);
        self.status = ClockStatus::Running;
    }

    /// Stop the clock. Only the status changes; the start time is retained.
    pub fn stop(&mut self) {
        self.status = ClockStatus::Stopped;
    }

    /// Reset to the initial state: start time cleared, offset zeroed.
    pub fn reset(&mut self) {
        *self = RaceClock::new();
    }

    /// Adjust the clock so it reads `desired_ms` right now.
    ///
    /// While running this computes the offset against the current elapsed
    /// time; while stopped the offset is set directly, defining where the
    /// clock will begin counting from once started.
    pub fn edit(&mut self, desired_ms: f64) {
        self.edit_at(desired_ms, Utc::now());
    }

    pub fn edit_at(&mut self, desired_ms: f64, now: DateTime<Utc>) {
        match (self.status, self.start_time) {
            (ClockStatus::Running, Some(start)) => {
                self.offset_ms = desired_ms - elapsed_ms(start, now);
            }
            _ => {
                self.offset_ms = desired_ms;
            }
        }
    }

    /// Official race time for the wall-clock instant `t`.
    ///
    /// Defined only while the clock is running with a recorded start; any
    /// other state is a precondition failure rather than a silently wrong
    /// value.
    pub fn official_ms(&self, t: DateTime<Utc>) -> Result<f64> {
        match (self.status, self.start_time) {
            (ClockStatus::Running, Some(start)) => Ok(elapsed_ms(start, t) + self.offset_ms),
            _ => Err(Error::ClockNotRunning),
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == ClockStatus::Running
    }

    /// Snapshot for publication to clients.
    pub fn state(&self) -> RaceClockState {
        RaceClockState {
            race_start_time: self.start_time,
            status: self.status,
            offset: self.offset_ms,
        }
    }
}

impl Default for RaceClock {
    fn default() -> Self {
        Self::new()
    }
}

fn elapsed_ms(start: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (now - start).num_milliseconds() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn t0() -> DateTime<Utc> {
        "2026-06-07T09:00:00Z".parse().unwrap()
    }

    #[test]
    fn test_initial_state() {
        let clock = RaceClock::new();
        let state = clock.state();
        assert_eq!(state.status, ClockStatus::Stopped);
        assert_eq!(state.race_start_time, None);
        assert_eq!(state.offset, 0.0);
    }

    #[test]
    fn test_official_time_requires_running_clock() {
        let clock = RaceClock::new();
        assert!(matches!(
            clock.official_ms(t0()),
            Err(Error::ClockNotRunning)
        ));

        let mut clock = RaceClock::new();
        clock.start_at(t0());
        clock.stop();
        assert!(matches!(
            clock.official_ms(t0() + Duration::seconds(10)),
            Err(Error::ClockNotRunning)
        ));
    }

    #[test]
    fn test_elapsed_time_while_running() {
        let mut clock = RaceClock::new();
        clock.start_at(t0());
        let ms = clock.official_ms(t0() + Duration::seconds(95)).unwrap();
        assert_eq!(ms, 95_000.0);
    }

    #[test]
    fn test_edit_while_running_rebases_next_query() {
        // start at T0, edit to 01:00.00 at T0+5s: the next query at T0+5s
        // must read back 60000ms.
        let mut clock = RaceClock::new();
        clock.start_at(t0());

        let edit_instant = t0() + Duration::seconds(5);
        clock.edit_at(60_000.0, edit_instant);

        let ms = clock.official_ms(edit_instant).unwrap();
        assert!((ms - 60_000.0).abs() < 1.0, "got {}", ms);

        // and keeps counting from there
        let later = clock.official_ms(edit_instant + Duration::seconds(2)).unwrap();
        assert!((later - 62_000.0).abs() < 1.0, "got {}", later);
    }

    #[test]
    fn test_edit_before_start_defines_starting_point() {
        let mut clock = RaceClock::new();
        clock.edit_at(30_000.0, t0());
        assert_eq!(clock.state().offset, 30_000.0);

        // the offset survives the start transition
        clock.start_at(t0() + Duration::seconds(1));
        let ms = clock.official_ms(t0() + Duration::seconds(1)).unwrap();
        assert_eq!(ms, 30_000.0);
    }

    #[test]
    fn test_stop_then_start_does_not_correct_for_downtime() {
        let mut clock = RaceClock::new();
        clock.start_at(t0());
        clock.stop();

        // restart ten seconds later: the clock counts from the new start,
        // with no implicit pause offset
        let restart = t0() + Duration::seconds(10);
        clock.start_at(restart);
        let ms = clock.official_ms(restart + Duration::seconds(3)).unwrap();
        assert_eq!(ms, 3_000.0);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut clock = RaceClock::new();
        clock.start_at(t0());
        clock.edit_at(42_000.0, t0() + Duration::seconds(1));
        clock.reset();

        let state = clock.state();
        assert_eq!(state.status, ClockStatus::Stopped);
        assert_eq!(state.race_start_time, None);
        assert_eq!(state.offset, 0.0);
    }
}
