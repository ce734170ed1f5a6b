use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};
use whatlang::Lang;

use crate::models::Corpus;

#[derive(Debug, Clone, PartialEq)]
pub struct DetectedLanguage {
    /// ISO 639-1 where one exists, otherwise the detector's own code.
    pub code: String,
    pub confidence: f64,
    /// Whether the detector stands behind its guess.
    pub reliable: bool,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DetectionFailure {
    #[error("no alphabetic content")]
    NoAlphabeticContent,

    #[error("language could not be determined")]
    Undetermined,

    #[error("confidence {0:.2} below threshold")]
    LowConfidence(f64),

    #[error("unreliable guess '{0}'")]
    Unreliable(String),
}

impl DetectionFailure {
    pub fn kind(&self) -> &'static str {
        match self {
            DetectionFailure::NoAlphabeticContent => "no_alphabetic_content",
            DetectionFailure::Undetermined => "undetermined",
            DetectionFailure::LowConfidence(_) => "low_confidence",
            DetectionFailure::Unreliable(_) => "unreliable",
        }
    }
}

pub trait LanguageDetector {
    fn detect(&self, text: &str) -> Result<DetectedLanguage, DetectionFailure>;
}

/// Trigram-based detection via `whatlang`.
#[derive(Debug, Clone, Default)]
pub struct WhatlangDetector {
    min_confidence: f64,
}

impl WhatlangDetector {
    pub fn new(min_confidence: f64) -> Self {
        Self { min_confidence }
    }
}

fn iso639_1(lang: Lang) -> &'static str {
    match lang {
        Lang::Fra => "fr",
        Lang::Eng => "en",
        Lang::Spa => "es",
        Lang::Por => "pt",
        Lang::Ita => "it",
        Lang::Deu => "de",
        Lang::Nld => "nl",
        Lang::Ara => "ar",
        Lang::Rus => "ru",
        Lang::Cmn => "zh",
        Lang::Jpn => "ja",
        Lang::Kor => "ko",
        Lang::Tur => "tr",
        Lang::Pol => "pl",
        other => other.code(),
    }
}

impl LanguageDetector for WhatlangDetector {
    fn detect(&self, text: &str) -> Result<DetectedLanguage, DetectionFailure> {
        if !text.chars().any(char::is_alphabetic) {
            return Err(DetectionFailure::NoAlphabeticContent);
        }
        let info = whatlang::detect(text).ok_or(DetectionFailure::Undetermined)?;
        if info.confidence() < self.min_confidence {
            return Err(DetectionFailure::LowConfidence(info.confidence()));
        }
        Ok(DetectedLanguage {
            code: iso639_1(info.lang()).to_string(),
            confidence: info.confidence(),
            reliable: info.is_reliable(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LanguageStats {
    pub kept: usize,
    pub detection_failed: usize,
    pub mismatched: usize,
    pub failures_by_cause: BTreeMap<&'static str, usize>,
    /// Detected code -> records dropped with it.
    pub mismatched_languages: BTreeMap<String, usize>,
}

/// Keeps only records written in the target language.
#[derive(Debug, Clone)]
pub struct LanguageFilter<D> {
    detector: D,
    target: String,
}

impl<D: LanguageDetector> LanguageFilter<D> {
    pub fn new(detector: D, target: impl Into<String>) -> Self {
        Self {
            detector,
            target: target.into(),
        }
    }

    /// An unreliable guess of another language is a detection failure, not a
    /// mismatch. An unreliable guess of the target is kept.
    fn classify(&self, text: &str) -> Result<DetectedLanguage, DetectionFailure> {
        let detected = self.detector.detect(text)?;
        if detected.code != self.target && !detected.reliable {
            return Err(DetectionFailure::Unreliable(detected.code));
        }
        Ok(detected)
    }

    pub fn filter(&self, corpus: Corpus) -> (Corpus, LanguageStats) {
        let mut stats = LanguageStats::default();
        let kept: Corpus = corpus
            .into_iter()
            .filter_map(|mut record| match self.classify(&record.raw_text) {
                Ok(detected) if detected.code == self.target => {
                    record.language = Some(detected.code);
                    Some(record)
                }
                Ok(detected) => {
                    debug!("Row {} dropped: language '{}'", record.ordinal, detected.code);
                    stats.mismatched += 1;
                    *stats.mismatched_languages.entry(detected.code).or_insert(0) += 1;
                    None
                }
                Err(failure) => {
                    debug!("Row {} dropped: {}", record.ordinal, failure);
                    stats.detection_failed += 1;
                    *stats.failures_by_cause.entry(failure.kind()).or_insert(0) += 1;
                    None
                }
            })
            .collect();
        stats.kept = kept.len();

        info!(
            "Language filter complete - target={}, kept={}, mismatched={}, detection_failed={}",
            self.target, stats.kept, stats.mismatched, stats.detection_failed
        );
        if !stats.mismatched_languages.is_empty() {
            info!("Dropped languages: {:?}", stats.mismatched_languages);
        }
        (kept, stats)
    }
}
