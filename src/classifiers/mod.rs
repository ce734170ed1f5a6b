//! The two independent sentiment classifiers.
//!
//! Both report failures internally as [`FailureReason`] and degrade to a
//! Neutral verdict with a zero score at their public boundary, so a failing
//! record never aborts a run.

pub mod contextual;
pub mod http_model;
pub mod lexical;
pub mod lexicon;

use serde::Serialize;
use std::collections::BTreeMap;

pub use contextual::{
    ContextualClassifier, ContextualModel, ModelError, ModelPrediction, OrdinalScale,
};
pub use http_model::HttpModel;
pub use lexical::{LexicalClassifier, PolarityThresholds};
pub use lexicon::{FrenchLexicon, SentimentLexicon};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FailureReason {
    #[error("input is empty")]
    EmptyInput,

    #[error("score is not a finite number")]
    NonFiniteScore,

    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("malformed model response: {0}")]
    MalformedResponse(String),

    #[error("unknown model label '{0}'")]
    UnknownLabel(String),

    #[error("confidence {0} outside [0, 1]")]
    ConfidenceOutOfRange(f64),

    #[error("model returned {got} predictions for {expected} inputs")]
    BatchSizeMismatch { expected: usize, got: usize },
}

impl FailureReason {
    /// Stable key used to bucket failures in run statistics.
    pub fn kind(&self) -> &'static str {
        match self {
            FailureReason::EmptyInput => "empty_input",
            FailureReason::NonFiniteScore => "non_finite_score",
            FailureReason::ModelUnavailable(_) => "model_unavailable",
            FailureReason::MalformedResponse(_) => "malformed_response",
            FailureReason::UnknownLabel(_) => "unknown_label",
            FailureReason::ConfidenceOutOfRange(_) => "confidence_out_of_range",
            FailureReason::BatchSizeMismatch { .. } => "batch_size_mismatch",
        }
    }
}

/// Per-classifier failure tally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FailureCounts {
    pub total: usize,
    pub by_reason: BTreeMap<&'static str, usize>,
}

impl FailureCounts {
    pub fn record(&mut self, reason: &FailureReason) {
        self.total += 1;
        *self.by_reason.entry(reason.kind()).or_insert(0) += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_counts() {
        let mut counts = FailureCounts::default();
        counts.record(&FailureReason::EmptyInput);
        counts.record(&FailureReason::UnknownLabel("6 stars".into()));
        counts.record(&FailureReason::EmptyInput);
        assert_eq!(counts.total, 3);
        assert_eq!(counts.by_reason["empty_input"], 2);
        assert_eq!(counts.by_reason["unknown_label"], 1);
    }
}
