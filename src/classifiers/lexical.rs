use std::sync::Arc;

use crate::classifiers::lexicon::{FrenchLexicon, SentimentLexicon};
use crate::classifiers::FailureReason;
use crate::config::LexicalConfig;
use crate::models::{LexicalVerdict, Polarity, Sentiment};
use crate::utils::lemmas::LemmaTable;

// Negated polar words flip and lose half their weight.
const NEGATION_FACTOR: f64 = -0.5;

/// Dead zone around zero that maps to Neutral.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolarityThresholds {
    pub positive: f64,
    pub negative: f64,
}

impl PolarityThresholds {
    pub fn label(&self, score: f64) -> Sentiment {
        if score > self.positive {
            Sentiment::Positive
        } else if score < self.negative {
            Sentiment::Negative
        } else {
            Sentiment::Neutral
        }
    }
}

impl Default for PolarityThresholds {
    fn default() -> Self {
        Self {
            positive: 0.1,
            negative: -0.1,
        }
    }
}

/// Classifier A: averaged lexicon polarity with intensifiers and negation.
#[derive(Debug, Clone)]
pub struct LexicalClassifier<L = FrenchLexicon> {
    lexicon: L,
    lemmas: Arc<LemmaTable>,
    thresholds: PolarityThresholds,
    negation_window: usize,
}

impl LexicalClassifier<FrenchLexicon> {
    pub fn from_config(config: &LexicalConfig, lemmas: Arc<LemmaTable>) -> Self {
        Self::new(
            FrenchLexicon::new(),
            lemmas,
            PolarityThresholds {
                positive: config.positive_threshold,
                negative: config.negative_threshold,
            },
            config.negation_window,
        )
    }
}

impl<L: SentimentLexicon> LexicalClassifier<L> {
    pub fn new(
        lexicon: L,
        lemmas: Arc<LemmaTable>,
        thresholds: PolarityThresholds,
        negation_window: usize,
    ) -> Self {
        Self {
            lexicon,
            lemmas,
            thresholds,
            negation_window,
        }
    }

    pub fn thresholds(&self) -> PolarityThresholds {
        self.thresholds
    }

    /// Raw polarity, or why it could not be computed.
    pub fn polarity(&self, text: &str) -> Result<f64, FailureReason> {
        let lowered = text.to_lowercase();
        let tokens: Vec<&str> = lowered
            .split(|c: char| !c.is_alphabetic())
            .filter(|t| !t.is_empty())
            .map(|t| self.lemmas.lemma(t))
            .collect();
        if tokens.is_empty() {
            return Err(FailureReason::EmptyInput);
        }

        let mut total = 0.0;
        let mut polar_words = 0usize;
        let mut modifier = 1.0;
        let mut negation_active = false;
        let mut words_since_negation = 0usize;

        for token in tokens {
            if self.lexicon.is_negation(token) {
                negation_active = true;
                words_since_negation = 0;
                continue;
            }
            if let Some(factor) = self.lexicon.intensifier(token) {
                modifier *= factor;
                continue;
            }
            if let Some(base) = self.lexicon.score(token) {
                let mut score = base * modifier;
                if negation_active && words_since_negation < self.negation_window {
                    score *= NEGATION_FACTOR;
                }
                total += score;
                polar_words += 1;
                modifier = 1.0;
            }
            if negation_active {
                words_since_negation += 1;
                if words_since_negation >= self.negation_window {
                    negation_active = false;
                }
            }
        }

        if polar_words == 0 {
            return Ok(0.0);
        }
        let polarity = total / polar_words as f64;
        if !polarity.is_finite() {
            return Err(FailureReason::NonFiniteScore);
        }
        Ok(polarity)
    }

    pub fn classify_detailed(&self, text: &str) -> Result<LexicalVerdict, FailureReason> {
        let score = self.polarity(text)?;
        Ok(LexicalVerdict {
            sentiment: self.thresholds.label(score),
            polarity: Polarity(score),
        })
    }

    /// Never fails: degenerate input comes back Neutral with a 0.0 score.
    pub fn classify(&self, text: &str) -> LexicalVerdict {
        self.classify_detailed(text).unwrap_or_else(|_| LexicalVerdict::fallback())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::normalization::Normalizer;

    fn classifier() -> LexicalClassifier {
        LexicalClassifier::from_config(&LexicalConfig::default(), Arc::new(LemmaTable::french()))
    }

    #[test]
    fn test_positive_raw_and_clean() {
        let c = classifier();
        let normalizer = Normalizer::french().unwrap();
        let raw = "Le réseau est excellent, merci !!";

        let verdict = c.classify(raw);
        assert_eq!(verdict.sentiment, Sentiment::Positive);
        assert!(verdict.polarity.value() > 0.1);

        let verdict = c.classify(&normalizer.normalize(raw));
        assert_eq!(verdict.sentiment, Sentiment::Positive);
    }

    #[test]
    fn test_negative_raw_and_clean() {
        let c = classifier();
        let normalizer = Normalizer::french().unwrap();
        let raw = "Service catastrophique, aucune réponse";

        let verdict = c.classify(raw);
        assert_eq!(verdict.sentiment, Sentiment::Negative);
        assert!(verdict.polarity.value() < -0.1);

        let verdict = c.classify(&normalizer.normalize(raw));
        assert_eq!(verdict.sentiment, Sentiment::Negative);
    }

    #[test]
    fn test_negation_flips() {
        let c = classifier();
        let plain = c.polarity("le forfait est bon").unwrap();
        let negated = c.polarity("le forfait n'est pas bon").unwrap();
        assert!(plain > 0.0);
        assert!(negated < 0.0);
        assert_eq!(c.classify("le forfait n'est pas bon").sentiment, Sentiment::Negative);
    }

    #[test]
    fn test_intensifier_is_not_clamped() {
        let c = classifier();
        let normal = c.polarity("parfait").unwrap();
        let intensified = c.polarity("vraiment extrêmement parfait").unwrap();
        assert!(intensified > normal);
        assert!(intensified > 1.0);
    }

    #[test]
    fn test_dead_zone_is_neutral() {
        let c = classifier();
        assert_eq!(c.classify("le réseau").sentiment, Sentiment::Neutral);
        assert_eq!(c.classify("le réseau").polarity.value(), 0.0);
        // (0.5 - 0.4) / 2 = 0.05
        let verdict = c.classify("bien mais cher");
        assert_eq!(verdict.sentiment, Sentiment::Neutral);
        assert!((verdict.polarity.value() - 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_input_falls_back() {
        let c = classifier();
        assert_eq!(c.classify_detailed("!!! 123 😀"), Err(FailureReason::EmptyInput));
        assert_eq!(c.classify("!!! 123 😀"), LexicalVerdict::fallback());
        assert_eq!(c.classify(""), LexicalVerdict::fallback());
    }

    #[test]
    fn test_custom_thresholds() {
        let config = LexicalConfig {
            positive_threshold: 0.7,
            negative_threshold: -0.7,
            ..LexicalConfig::default()
        };
        let c = LexicalClassifier::from_config(&config, Arc::new(LemmaTable::french()));
        assert_eq!(c.classify("bon").sentiment, Sentiment::Neutral);
        assert_eq!(c.classify("excellent").sentiment, Sentiment::Positive);
    }
}
