//! Bib number resolution from accumulated OCR samples
//!
//! OCR reads are noisy: misreads, partial digits, glare. Resolution is a
//! confidence-weighted vote over the full sample history — a few
//! high-confidence reads outweigh many low-confidence ones, so the score of
//! a candidate is the sum of OCR confidence over its samples, not a count.
//! Re-computable at any time; samples are never consumed.

use bibtrack_common::config::TrackingConfig;

use crate::tracking::registry::OcrSample;

/// Winning candidate and its accumulated score.
#[derive(Debug, Clone, PartialEq)]
pub struct BibResolution {
    pub bib: String,
    pub score: f32,
}

/// Resolve the most likely bib from a tracker's sample history.
///
/// Samples outside the plausible bib length or at low OCR confidence are
/// discarded first. Returns `None` when nothing survives filtering. Equal
/// scores resolve to the earliest-seen candidate, keeping the result
/// deterministic.
pub fn resolve_bib(samples: &[OcrSample], cfg: &TrackingConfig) -> Option<BibResolution> {
    let mut candidates: Vec<(String, f32)> = Vec::new();

    for sample in samples {
        let text = sample.text.trim();
        if text.len() < cfg.min_bib_len || text.len() > cfg.max_bib_len {
            continue;
        }
        if sample.ocr_confidence <= cfg.min_ocr_confidence {
            continue;
        }

        match candidates.iter_mut().find(|(bib, _)| bib == text) {
            Some((_, score)) => *score += sample.ocr_confidence,
            None => candidates.push((text.to_string(), sample.ocr_confidence)),
        }
    }

    let mut best: Option<(String, f32)> = None;
    for (bib, score) in candidates {
        match &best {
            Some((_, best_score)) if score <= *best_score => {}
            _ => best = Some((bib, score)),
        }
    }

    best.map(|(bib, score)| BibResolution { bib, score })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(text: &str, ocr_conf: f32, det_conf: f32) -> OcrSample {
        OcrSample {
            text: text.to_string(),
            ocr_confidence: ocr_conf,
            detector_confidence: det_conf,
        }
    }

    fn cfg() -> TrackingConfig {
        TrackingConfig::default()
    }

    #[test]
    fn test_accumulated_confidence_beats_single_strong_read() {
        // 123 scores 0.9 + 0.6 = 1.5, 128 scores 0.95
        let samples = vec![
            sample("123", 0.9, 0.8),
            sample("128", 0.95, 0.9),
            sample("123", 0.6, 0.7),
        ];

        let resolved = resolve_bib(&samples, &cfg()).unwrap();
        assert_eq!(resolved.bib, "123");
        assert!((resolved.score - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_filters_implausible_lengths() {
        let samples = vec![
            sample("1", 0.99, 0.9),      // too short
            sample("123456", 0.99, 0.9), // too long
            sample("77", 0.5, 0.9),
        ];
        assert_eq!(resolve_bib(&samples, &cfg()).unwrap().bib, "77");
    }

    #[test]
    fn test_filters_low_confidence_reads() {
        let samples = vec![sample("123", 0.4, 0.9), sample("123", 0.39, 0.9)];
        assert_eq!(resolve_bib(&samples, &cfg()), None);
    }

    #[test]
    fn test_no_samples_resolves_to_none() {
        assert_eq!(resolve_bib(&[], &cfg()), None);
    }

    #[test]
    fn test_resolution_is_deterministic_and_idempotent() {
        let samples = vec![
            sample("55", 0.6, 0.9),
            sample("56", 0.6, 0.9),
            sample("55", 0.5, 0.9),
        ];

        let first = resolve_bib(&samples, &cfg()).unwrap();
        let second = resolve_bib(&samples, &cfg()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.bib, "55");
    }

    #[test]
    fn test_equal_scores_resolve_to_earliest_seen() {
        let samples = vec![sample("21", 0.7, 0.9), sample("12", 0.7, 0.9)];
        assert_eq!(resolve_bib(&samples, &cfg()).unwrap().bib, "21");
    }

    #[test]
    fn test_whitespace_is_normalized() {
        let samples = vec![sample(" 88 ", 0.6, 0.9), sample("88", 0.6, 0.9)];
        let resolved = resolve_bib(&samples, &cfg()).unwrap();
        assert_eq!(resolved.bib, "88");
        assert!((resolved.score - 1.2).abs() < 1e-6);
    }
}
