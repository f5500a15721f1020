//! Finish-line crossing detection
//!
//! A per-tracker state machine: NOT_FINISHED → FINISHED, terminal. The
//! crossing condition (horizontal center at or past the finish zone) is
//! checked every frame and gated on the registry's finished flag, so a
//! runner who lingers at the line is counted once.

use bibtrack_common::config::TrackingConfig;
use bibtrack_common::time;
use bibtrack_common::types::FinishEvent;
use tracing::info;

use crate::tracking::bibs::resolve_bib;
use crate::tracking::registry::{OcrSample, TrackRegistry};
use crate::tracking::source::Frame;

pub struct FinishLineMonitor {
    registry: TrackRegistry,
    cfg: TrackingConfig,
}

impl FinishLineMonitor {
    pub fn new(cfg: TrackingConfig) -> Self {
        Self {
            registry: TrackRegistry::new(),
            cfg,
        }
    }

    pub fn registry(&self) -> &TrackRegistry {
        &self.registry
    }

    pub fn record_sample(&mut self, tracker_id: u32, sample: OcrSample) {
        self.registry.record_sample(tracker_id, sample);
    }

    /// Accumulated score of the tracker's currently winning bib, if any.
    pub fn resolved_score(&self, tracker_id: u32) -> Option<f32> {
        self.registry
            .get(tracker_id)
            .and_then(|state| resolve_bib(&state.ocr_samples, &self.cfg))
            .map(|r| r.score)
    }

    /// Check every tracked person in the frame against the finish zone and
    /// return the crossings that fired on this frame.
    ///
    /// Both timestamps are captured at the instant of detection; the
    /// wall-clock one is what official timing uses, since the source may be
    /// processed slower or faster than real time.
    pub fn observe_frame(&mut self, frame: &Frame) -> Vec<FinishEvent> {
        let finish_zone_start_x = frame.frame_width as f32 * self.cfg.finish_line_fraction as f32;
        let mut events = Vec::new();

        for person in frame.persons() {
            let Some(tracker_id) = person.tracker_id else {
                continue;
            };
            self.registry.get_or_create(tracker_id);

            if person.bbox.center_x() < finish_zone_start_x {
                continue;
            }

            let wall_time = time::now();
            if !self
                .registry
                .mark_finished(tracker_id, frame.source_time_ms, wall_time)
            {
                continue;
            }

            // Every crossing yields exactly one leaderboard-visible
            // outcome, bib or not.
            let bib_number = match self
                .registry
                .get(tracker_id)
                .and_then(|state| resolve_bib(&state.ocr_samples, &self.cfg))
            {
                Some(resolved) => {
                    info!(
                        "Racer {} entered finish zone at {:.2}s with bib #{} (score {:.2})",
                        tracker_id,
                        frame.source_time_ms / 1000.0,
                        resolved.bib,
                        resolved.score
                    );
                    resolved.bib
                }
                None => {
                    info!(
                        "Racer {} entered finish zone at {:.2}s with no readable bib",
                        tracker_id,
                        frame.source_time_ms / 1000.0
                    );
                    format!("Unknown-{}", tracker_id)
                }
            };

            events.push(FinishEvent {
                tracker_id,
                bib_number,
                wall_clock_time: wall_time,
                capture_time_ms: frame.source_time_ms,
                inferred_race_time_ms: None,
            });
        }

        events
    }
}
