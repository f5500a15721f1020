//! Tracking pipeline
//!
//! The frame loop: pull detector output, check finish-line crossings, run
//! gated OCR sampling, and push `FinishEvent`s to the ingest task over a
//! bounded channel. Runs on its own thread; a transient source or OCR
//! failure is logged and skipped, and only a bounded run of consecutive
//! failures halts the affected stage.

use std::cmp::Ordering;

use bibtrack_common::config::TrackingConfig;
use bibtrack_common::time::format_race_time;
use bibtrack_common::types::FinishEvent;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::error::{Error, Result};
use crate::tracking::bibs::resolve_bib;
use crate::tracking::monitor::FinishLineMonitor;
use crate::tracking::registry::OcrSample;
use crate::tracking::source::{DetectionSource, Frame, Observation, OcrService};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSummary {
    pub frames_processed: u64,
    pub finishers: usize,
}

pub struct TrackingPipeline<S: DetectionSource> {
    source: S,
    ocr: Box<dyn OcrService>,
    monitor: FinishLineMonitor,
    cfg: TrackingConfig,
    finish_tx: mpsc::Sender<FinishEvent>,
    ocr_failures: u32,
    ocr_halted: bool,
}

impl<S: DetectionSource> TrackingPipeline<S> {
    pub fn new(
        source: S,
        ocr: Box<dyn OcrService>,
        cfg: TrackingConfig,
        finish_tx: mpsc::Sender<FinishEvent>,
    ) -> Self {
        Self {
            source,
            ocr,
            monitor: FinishLineMonitor::new(cfg.clone()),
            cfg,
            finish_tx,
            ocr_failures: 0,
            ocr_halted: false,
        }
    }

    /// Run until the source is exhausted or too many consecutive reads fail.
    ///
    /// Returning `Err` halts this pipeline only; the server keeps serving
    /// the leaderboard.
    pub fn run(mut self) -> Result<PipelineSummary> {
        info!("Tracking pipeline started");
        let mut consecutive_failures = 0u32;
        let mut frames_processed = 0u64;

        loop {
            match self.source.next_frame() {
                Ok(Some(frame)) => {
                    consecutive_failures = 0;
                    frames_processed += 1;
                    self.process_frame(&frame);
                }
                Ok(None) => break,
                Err(e) => {
                    consecutive_failures += 1;
                    warn!(
                        "Frame read failed ({} consecutive): {}",
                        consecutive_failures, e
                    );
                    if consecutive_failures >= self.cfg.max_consecutive_failures {
                        error!("Too many consecutive source failures, halting tracking");
                        return Err(Error::Source(
                            "consecutive read failures exceeded limit".to_string(),
                        ));
                    }
                }
            }
        }

        Ok(self.final_summary(frames_processed))
    }

    fn process_frame(&mut self, frame: &Frame) {
        // Crossings are checked before this frame's OCR reads are added,
        // so a crossing resolves against the samples seen so far.
        for event in self.monitor.observe_frame(frame) {
            if self.finish_tx.blocking_send(event).is_err() {
                warn!("Finish ingest channel closed; dropping event");
            }
        }
        self.sample_bibs(frame);
    }

    /// Associate bib boxes to tracked persons and collect OCR reads.
    ///
    /// A bib belongs to the person whose box contains its center. OCR only
    /// runs on confident detections, and stops entirely for a tracker whose
    /// resolved bib is already settled.
    fn sample_bibs(&mut self, frame: &Frame) {
        if self.ocr_halted {
            return;
        }

        let bibs: Vec<&Observation> = frame.bibs().collect();

        for person in frame.persons() {
            let Some(tracker_id) = person.tracker_id else {
                continue;
            };
            if self.monitor.resolved_score(tracker_id).unwrap_or(0.0) > self.cfg.settled_bib_score
            {
                continue;
            }

            for bib in &bibs {
                if !person
                    .bbox
                    .contains_point(bib.bbox.center_x(), bib.bbox.center_y())
                {
                    continue;
                }

                if bib.confidence > self.cfg.min_detector_confidence {
                    if let Some(region) = &bib.region {
                        match self.ocr.read_text(region) {
                            Ok(Some(read)) => {
                                self.ocr_failures = 0;
                                info!(
                                    "OCR guess for racer {}: '{}' (confidence {:.2})",
                                    tracker_id, read.text, read.confidence
                                );
                                self.monitor.record_sample(
                                    tracker_id,
                                    OcrSample {
                                        text: read.text,
                                        ocr_confidence: read.confidence,
                                        detector_confidence: bib.confidence,
                                    },
                                );
                            }
                            Ok(None) => {
                                self.ocr_failures = 0;
                            }
                            Err(e) => {
                                // degrades to "no sample this round"
                                self.ocr_failures += 1;
                                warn!(
                                    "OCR read failed ({} consecutive): {}",
                                    self.ocr_failures, e
                                );
                                if self.ocr_failures >= self.cfg.max_consecutive_failures {
                                    error!(
                                        "Too many consecutive OCR failures, disabling OCR stage"
                                    );
                                    self.ocr_halted = true;
                                    return;
                                }
                            }
                        }
                    }
                }
                break;
            }
        }
    }

    fn final_summary(&self, frames_processed: u64) -> PipelineSummary {
        let mut finishers: Vec<(u32, Option<String>, f64)> = self
            .monitor
            .registry()
            .iter()
            .filter_map(|(id, state)| {
                state.finish_capture_ms.map(|capture_ms| {
                    let bib = resolve_bib(&state.ocr_samples, &self.cfg).map(|r| r.bib);
                    (id, bib, capture_ms)
                })
            })
            .collect();
        finishers.sort_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(Ordering::Equal));

        info!(
            "Tracking finished: {} frames processed, {} finishers",
            frames_processed,
            finishers.len()
        );
        for (pos, (id, bib, capture_ms)) in finishers.iter().enumerate() {
            info!(
                "  {}. racer {} | bib {} | {}",
                pos + 1,
                id,
                bib.as_deref().unwrap_or("No Bib"),
                format_race_time(*capture_ms)
            );
        }

        PipelineSummary {
            frames_processed,
            finishers: finishers.len(),
        }
    }
}
