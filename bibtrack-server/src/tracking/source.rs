//! Frame/track source and OCR boundaries
//!
//! Object detection, tracking, and OCR are external collaborators. The
//! pipeline consumes their typed output through these traits and never
//! touches pixels or models itself.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Axis-aligned box in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn center_x(&self) -> f32 {
        (self.x1 + self.x2) / 2.0
    }

    pub fn center_y(&self) -> f32 {
        (self.y1 + self.y2) / 2.0
    }

    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        self.x1 < x && x < self.x2 && self.y1 < y && y < self.y2
    }
}

/// Detected object classes. The detector distinguishes runners from the
/// bib regions pinned to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectClass {
    Person,
    Bib,
}

/// Raw crop of a detected region, handed to the OCR service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRegion {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// One detected object in a frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub class: ObjectClass,
    /// Tracker identity, stable across frames. Assigned by the upstream
    /// tracker for persons; bib boxes are matched to persons spatially.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracker_id: Option<u32>,
    pub bbox: BoundingBox,
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<ImageRegion>,
}

/// One frame's worth of detector output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub index: u64,
    /// Source-clock position (e.g. video timestamp). Never used for
    /// official results — processing may not run at 1x.
    pub source_time_ms: f64,
    pub frame_width: u32,
    pub frame_height: u32,
    pub observations: Vec<Observation>,
}

impl Frame {
    pub fn persons(&self) -> impl Iterator<Item = &Observation> {
        self.observations
            .iter()
            .filter(|o| o.class == ObjectClass::Person)
    }

    pub fn bibs(&self) -> impl Iterator<Item = &Observation> {
        self.observations
            .iter()
            .filter(|o| o.class == ObjectClass::Bib)
    }
}

/// A source of per-frame detector/tracker output.
///
/// `Ok(None)` signals the end of the source; an `Err` is a transient read
/// failure the pipeline may skip past.
pub trait DetectionSource: Send {
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// Reads text from an image region.
///
/// Returns `Ok(None)` when the region holds no legible text; an `Err`
/// degrades to "no sample this round" in the pipeline.
pub trait OcrService: Send {
    fn read_text(&mut self, region: &ImageRegion) -> Result<Option<OcrRead>>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrRead {
    pub text: String,
    pub confidence: f32,
}

/// Replay of recorded detector output: one JSON frame per line.
pub struct JsonlSource {
    path: PathBuf,
    lines: std::io::Lines<BufReader<File>>,
}

impl JsonlSource {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            lines: BufReader::new(file).lines(),
        })
    }
}

impl DetectionSource for JsonlSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            match self.lines.next() {
                None => return Ok(None),
                Some(Err(e)) => {
                    return Err(Error::Source(format!(
                        "{}: read failed: {}",
                        self.path.display(),
                        e
                    )))
                }
                Some(Ok(line)) if line.trim().is_empty() => continue,
                Some(Ok(line)) => {
                    let frame: Frame = serde_json::from_str(&line).map_err(|e| {
                        Error::Source(format!("{}: bad frame record: {}", self.path.display(), e))
                    })?;
                    debug!("replayed frame {} from {}", frame.index, self.path.display());
                    return Ok(Some(frame));
                }
            }
        }
    }
}

/// OCR over HTTP against an external reader service.
///
/// POSTs the raw region and expects `{"text": ..., "confidence": ...}` or
/// an empty body when nothing legible was found.
pub struct HttpOcrService {
    client: reqwest::blocking::Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct OcrResponse {
    text: Option<String>,
    confidence: Option<f32>,
}

impl HttpOcrService {
    pub fn new(endpoint: String) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            endpoint,
        }
    }
}

impl OcrService for HttpOcrService {
    fn read_text(&mut self, region: &ImageRegion) -> Result<Option<OcrRead>> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-region-width", region.width)
            .header("x-region-height", region.height)
            .body(region.data.clone())
            .send()
            .map_err(|e| Error::Ocr(format!("request to {} failed: {}", self.endpoint, e)))?;

        if !response.status().is_success() {
            return Err(Error::Ocr(format!(
                "{} returned {}",
                self.endpoint,
                response.status()
            )));
        }

        let body: OcrResponse = response
            .json()
            .map_err(|e| Error::Ocr(format!("bad response from {}: {}", self.endpoint, e)))?;

        match (body.text, body.confidence) {
            (Some(text), Some(confidence)) if !text.trim().is_empty() => Ok(Some(OcrRead {
                text: text.trim().to_string(),
                confidence,
            })),
            _ => Ok(None),
        }
    }
}

/// OCR stand-in for deployments without a reader service: every region
/// comes back unreadable, so finishers surface with placeholder bibs.
pub struct DisabledOcr;

impl OcrService for DisabledOcr {
    fn read_text(&mut self, _region: &ImageRegion) -> Result<Option<OcrRead>> {
        Ok(None)
    }
}
