use futures::stream::{self, StreamExt};
use serde::Deserialize;
use std::collections::HashMap;
use std::future::Future;
use tracing::{debug, warn};

use crate::classifiers::FailureReason;
use crate::config::{ConfigError, ContextualConfig};
use crate::models::{Confidence, ContextualVerdict, Sentiment};

/// Top label a model assigned to one input.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelPrediction {
    pub label: String,
    pub score: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("server error: status={status}, body={body}")]
    Status { status: u16, body: String },

    #[error("invalid response: {0}")]
    Decode(String),
}

/// A pretrained ordinal sentiment model. Implementations must be safe to call
/// concurrently without mutating shared state.
pub trait ContextualModel: Send + Sync {
    /// One prediction per input, in input order.
    fn predict_batch(
        &self,
        inputs: &[String],
    ) -> impl Future<Output = Result<Vec<ModelPrediction>, ModelError>> + Send;
}

/// Validated label -> ordinal -> ternary tables.
#[derive(Debug, Clone)]
pub struct OrdinalScale {
    labels: HashMap<String, u8>,
    sentiments: [Sentiment; 5],
}

impl OrdinalScale {
    pub fn from_config(config: &ContextualConfig) -> Result<Self, ConfigError> {
        let mut labels = HashMap::new();
        for entry in &config.labels {
            if !(1..=5).contains(&entry.ordinal) {
                return Err(ConfigError::Invalid(
                    "contextual.labels",
                    format!("ordinal {} outside 1..=5", entry.ordinal),
                ));
            }
            labels.insert(entry.label.trim().to_lowercase(), entry.ordinal);
        }

        let mut sentiments: [Option<Sentiment>; 5] = [None; 5];
        for rule in &config.ordinal_map {
            let slot = (rule.ordinal as usize)
                .checked_sub(1)
                .and_then(|i| sentiments.get_mut(i))
                .ok_or_else(|| {
                    ConfigError::Invalid(
                        "contextual.ordinal_map",
                        format!("ordinal {} outside 1..=5", rule.ordinal),
                    )
                })?;
            *slot = Some(rule.sentiment);
        }
        let mut resolved = [Sentiment::Neutral; 5];
        for (i, sentiment) in sentiments.iter().enumerate() {
            resolved[i] = sentiment.ok_or_else(|| {
                ConfigError::Invalid(
                    "contextual.ordinal_map",
                    format!("ordinal {} is not mapped", i + 1),
                )
            })?;
        }

        Ok(Self {
            labels,
            sentiments: resolved,
        })
    }

    pub fn ordinal(&self, label: &str) -> Option<u8> {
        self.labels.get(&label.trim().to_lowercase()).copied()
    }

    pub fn sentiment(&self, ordinal: u8) -> Option<Sentiment> {
        (ordinal as usize)
            .checked_sub(1)
            .and_then(|i| self.sentiments.get(i))
            .copied()
    }

    pub fn interpret(
        &self,
        prediction: &ModelPrediction,
    ) -> Result<ContextualVerdict, FailureReason> {
        let confidence = Confidence::new(prediction.score)
            .ok_or(FailureReason::ConfidenceOutOfRange(prediction.score))?;
        let ordinal = self
            .ordinal(&prediction.label)
            .ok_or_else(|| FailureReason::UnknownLabel(prediction.label.clone()))?;
        let sentiment = self
            .sentiment(ordinal)
            .ok_or_else(|| FailureReason::UnknownLabel(prediction.label.clone()))?;
        Ok(ContextualVerdict {
            sentiment,
            confidence,
            ordinal: Some(ordinal),
        })
    }
}

/// Cuts `text` to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Classifier B: batched calls to a contextual model, mapped to three labels.
#[derive(Debug, Clone)]
pub struct ContextualClassifier<M> {
    model: M,
    scale: OrdinalScale,
    max_chars: usize,
    batch_size: usize,
    concurrency: usize,
}

impl<M: ContextualModel> ContextualClassifier<M> {
    pub fn new(model: M, config: &ContextualConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            model,
            scale: OrdinalScale::from_config(config)?,
            max_chars: config.max_chars,
            batch_size: config.batch_size.max(1),
            concurrency: config.concurrency.max(1),
        })
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    fn prepare(&self, text: &str) -> Result<String, FailureReason> {
        let truncated = truncate_chars(text, self.max_chars);
        if truncated.trim().is_empty() {
            return Err(FailureReason::EmptyInput);
        }
        Ok(truncated.to_string())
    }

    /// One result per input, in input order.
    pub async fn classify_batch_detailed(
        &self,
        texts: &[&str],
    ) -> Vec<Result<ContextualVerdict, FailureReason>> {
        // Prepared slots are overwritten once their batch answers.
        let mut results = Vec::with_capacity(texts.len());
        let mut prepared: Vec<(usize, String)> = Vec::new();
        for (idx, text) in texts.iter().enumerate() {
            match self.prepare(text) {
                Ok(input) => {
                    prepared.push((idx, input));
                    results.push(Ok(ContextualVerdict::fallback()));
                }
                Err(reason) => results.push(Err(reason)),
            }
        }

        let chunks: Vec<Vec<(usize, String)>> = prepared
            .chunks(self.batch_size)
            .map(|chunk| chunk.to_vec())
            .collect();
        debug!(
            "Contextual model - inputs={}, batches={}, batch_size={}",
            prepared.len(),
            chunks.len(),
            self.batch_size
        );

        let answered: Vec<(Vec<usize>, Result<Vec<ModelPrediction>, ModelError>)> =
            stream::iter(chunks)
                .map(|chunk| async move {
                    let (indices, inputs): (Vec<usize>, Vec<String>) = chunk.into_iter().unzip();
                    let response = self.model.predict_batch(&inputs).await;
                    (indices, response)
                })
                .buffered(self.concurrency)
                .collect()
                .await;

        for (indices, response) in answered {
            match response {
                Ok(predictions) if predictions.len() == indices.len() => {
                    for (idx, prediction) in indices.into_iter().zip(predictions) {
                        results[idx] = self.scale.interpret(&prediction);
                    }
                }
                Ok(predictions) => {
                    warn!(
                        "Contextual batch size mismatch - expected={}, got={}",
                        indices.len(),
                        predictions.len()
                    );
                    let reason = FailureReason::BatchSizeMismatch {
                        expected: indices.len(),
                        got: predictions.len(),
                    };
                    for idx in indices {
                        results[idx] = Err(reason.clone());
                    }
                }
                Err(err) => {
                    warn!("Contextual batch failed - size={}, error={}", indices.len(), err);
                    let reason = match err {
                        ModelError::Decode(msg) => FailureReason::MalformedResponse(msg),
                        other => FailureReason::ModelUnavailable(other.to_string()),
                    };
                    for idx in indices {
                        results[idx] = Err(reason.clone());
                    }
                }
            }
        }

        results
    }

    pub async fn classify_detailed(&self, text: &str) -> Result<ContextualVerdict, FailureReason> {
        self.classify_batch_detailed(&[text])
            .await
            .pop()
            .unwrap_or(Err(FailureReason::EmptyInput))
    }

    /// Never fails: every failed input comes back Neutral with a 0.0 score.
    pub async fn classify_batch(&self, texts: &[&str]) -> Vec<ContextualVerdict> {
        self.classify_batch_detailed(texts)
            .await
            .into_iter()
            .map(|r| r.unwrap_or_else(|_| ContextualVerdict::fallback()))
            .collect()
    }
}
