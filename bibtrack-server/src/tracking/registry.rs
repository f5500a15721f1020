//! Per-tracker state
//!
//! One `TrackState` per tracker identity, created on first sighting and
//! kept for the life of the session. OCR samples are append-only; the
//! finish transition is monotonic and fires exactly once.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

/// One OCR read attributed to a tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrSample {
    pub text: String,
    pub ocr_confidence: f32,
    pub detector_confidence: f32,
}

#[derive(Debug, Clone, Default)]
pub struct TrackState {
    pub ocr_samples: Vec<OcrSample>,
    pub has_finished: bool,
    pub finish_capture_ms: Option<f64>,
    pub finish_wall_time: Option<DateTime<Utc>>,
}

/// Owns the per-tracker state map. Lives inside the tracking pipeline
/// thread; all access is single-owner, so read-modify-write sequences are
/// naturally exclusive.
#[derive(Debug, Default)]
pub struct TrackRegistry {
    tracks: HashMap<u32, TrackState>,
}

impl TrackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a tracker's state, creating the default (no samples, not
    /// finished) on first sighting of the id.
    pub fn get_or_create(&mut self, tracker_id: u32) -> &mut TrackState {
        self.tracks.entry(tracker_id).or_default()
    }

    pub fn get(&self, tracker_id: u32) -> Option<&TrackState> {
        self.tracks.get(&tracker_id)
    }

    pub fn record_sample(&mut self, tracker_id: u32, sample: OcrSample) {
        self.get_or_create(tracker_id).ocr_samples.push(sample);
    }

    /// Perform the finish transition for a tracker.
    ///
    /// Returns true only the first time; repeated observations of the
    /// crossing condition (a runner lingering in the finish zone) are
    /// no-ops and the recorded timestamps never change.
    pub fn mark_finished(
        &mut self,
        tracker_id: u32,
        capture_ms: f64,
        wall_time: DateTime<Utc>,
    ) -> bool {
        let state = self.get_or_create(tracker_id);
        if state.has_finished {
            return false;
        }
        state.has_finished = true;
        state.finish_capture_ms = Some(capture_ms);
        state.finish_wall_time = Some(wall_time);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &TrackState)> {
        self.tracks.iter().map(|(id, state)| (*id, state))
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(text: &str, conf: f32) -> OcrSample {
        OcrSample {
            text: text.to_string(),
            ocr_confidence: conf,
            detector_confidence: 0.8,
        }
    }

    #[test]
    fn test_get_or_create_defaults() {
        let mut registry = TrackRegistry::new();
        let state = registry.get_or_create(7);
        assert!(state.ocr_samples.is_empty());
        assert!(!state.has_finished);
        assert_eq!(registry.len(), 1);

        // second call returns the same state
        registry.record_sample(7, sample("42", 0.9));
        assert_eq!(registry.get(7).unwrap().ocr_samples.len(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_samples_are_append_only() {
        let mut registry = TrackRegistry::new();
        registry.record_sample(1, sample("12", 0.5));
        registry.record_sample(1, sample("12", 0.7));
        registry.record_sample(1, sample("72", 0.3));

        let texts: Vec<&str> = registry.get(1).unwrap()
            .ocr_samples
            .iter()
            .map(|s| s.text.as_str())
            .collect();
        assert_eq!(texts, vec!["12", "12", "72"]);
    }

    #[test]
    fn test_mark_finished_fires_exactly_once() {
        let mut registry = TrackRegistry::new();
        let first_wall = Utc::now();

        assert!(registry.mark_finished(3, 10_000.0, first_wall));

        // the runner lingers in the zone; later observations change nothing
        for i in 0..5 {
            let later = first_wall + chrono::Duration::seconds(i + 1);
            assert!(!registry.mark_finished(3, 10_000.0 + i as f64, later));
        }

        let state = registry.get(3).unwrap();
        assert!(state.has_finished);
        assert_eq!(state.finish_capture_ms, Some(10_000.0));
        assert_eq!(state.finish_wall_time, Some(first_wall));
    }

    #[test]
    fn test_finish_state_invariant() {
        let mut registry = TrackRegistry::new();
        registry.get_or_create(1);
        registry.mark_finished(2, 5_000.0, Utc::now());

        for (_, state) in registry.iter() {
            assert_eq!(
                state.has_finished,
                state.finish_capture_ms.is_some() && state.finish_wall_time.is_some()
            );
        }
    }
}
