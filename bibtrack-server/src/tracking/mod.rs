//! Runner tracking
//!
//! Consumes per-frame tracker output from an external detector, accumulates
//! OCR reads per tracker, detects finish-line crossings, and hands
//! `FinishEvent`s to the ingest task over a bounded channel. Runs on its
//! own thread so leaderboard writes can never stall frame processing.

pub mod bibs;
pub mod monitor;
pub mod pipeline;
pub mod registry;
pub mod source;

pub use monitor::FinishLineMonitor;
pub use pipeline::TrackingPipeline;
pub use registry::{OcrSample, TrackRegistry, TrackState};
pub use source::{DetectionSource, Frame, JsonlSource, Observation, OcrService};
