//! Corpus-level pipeline stages, in execution order.

pub mod dedup;
pub mod language;
pub mod reconcile;
pub mod themes;

pub use dedup::{deduplicate, DedupStats};
pub use language::{
    DetectedLanguage, DetectionFailure, LanguageDetector, LanguageFilter, LanguageStats,
    WhatlangDetector,
};
pub use reconcile::{
    agreement_rate, disagreements, reconcile, AgreementRate, ConfusionMatrix, Disagreement,
};
pub use themes::{theme_counts, ThemeTagger};
