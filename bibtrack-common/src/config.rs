//! Configuration loading
//!
//! Tracking parameters follow the priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`BIBTRACK_CONFIG`)
//! 3. Default platform config file location
//! 4. Compiled defaults (fallback)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Tunable parameters for the tracking pipeline.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Fraction of frame width where the finish zone begins (left-to-right).
    pub finish_line_fraction: f64,
    /// Bib text shorter than this is discarded as a misread.
    pub min_bib_len: usize,
    /// Bib text longer than this is discarded as a misread.
    pub max_bib_len: usize,
    /// OCR reads at or below this confidence are discarded.
    pub min_ocr_confidence: f32,
    /// Detector confidence required on a bib box before OCR is attempted.
    pub min_detector_confidence: f32,
    /// Accumulated score above which a tracker's bib is considered settled
    /// and further OCR is skipped.
    pub settled_bib_score: f32,
    /// Consecutive source or OCR failures tolerated before that pipeline
    /// stage is halted.
    pub max_consecutive_failures: u32,
    /// Capacity of the finish event channel between pipeline and store.
    pub finish_channel_capacity: usize,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            finish_line_fraction: 0.85,
            min_bib_len: 2,
            max_bib_len: 5,
            min_ocr_confidence: 0.4,
            min_detector_confidence: 0.70,
            settled_bib_score: 0.90,
            max_consecutive_failures: 10,
            finish_channel_capacity: 64,
        }
    }
}

impl TrackingConfig {
    /// Load configuration following the documented priority order.
    ///
    /// A missing file at the default location falls back to compiled
    /// defaults; an unreadable or malformed file named explicitly is an
    /// error.
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = cli_path {
            return Self::from_file(path);
        }

        if let Ok(path) = std::env::var("BIBTRACK_CONFIG") {
            return Self::from_file(Path::new(&path));
        }

        if let Some(path) = default_config_path() {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Ok(Self::default())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }
}

/// Default configuration file path for the platform
fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("bibtrack").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = TrackingConfig::default();
        assert_eq!(cfg.finish_line_fraction, 0.85);
        assert_eq!(cfg.min_bib_len, 2);
        assert_eq!(cfg.max_bib_len, 5);
        assert_eq!(cfg.min_ocr_confidence, 0.4);
        assert_eq!(cfg.max_consecutive_failures, 10);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let cfg: TrackingConfig = toml::from_str("finish_line_fraction = 0.9").unwrap();
        assert_eq!(cfg.finish_line_fraction, 0.9);
        assert_eq!(cfg.min_bib_len, 2);
    }

    #[test]
    fn test_malformed_toml_is_rejected() {
        let result: std::result::Result<TrackingConfig, _> =
            toml::from_str("finish_line_fraction = \"wide\"");
        assert!(result.is_err());
    }
}
