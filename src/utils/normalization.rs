use regex::Regex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::config::{ConfigError, NormalizerConfig};
use crate::models::Corpus;
use crate::utils::lemmas::LemmaTable;
use crate::utils::stopwords::StopwordSet;

// Letters of the French alphabet beyond ASCII, both cases.
const FRENCH_EXTRA_LETTERS: &str = "àâäæçéèêëîïôöœùûüÿÀÂÄÆÇÉÈÊËÎÏÔÖŒÙÛÜŸ";

pub fn is_target_letter(c: char) -> bool {
    c.is_ascii_alphabetic() || FRENCH_EXTRA_LETTERS.contains(c)
}

/// Lowercase and strip diacritics, for accent-insensitive matching.
pub fn fold_diacritics(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizationStats {
    pub normalized: usize,
    /// Records whose clean text came out empty; excluded downstream.
    pub empty_after: usize,
}

/// Turns raw social-media text into a clean, lemmatized token string.
///
/// The output is a fixed point: normalizing a clean text again returns it unchanged.
#[derive(Debug, Clone)]
pub struct Normalizer {
    url_pattern: Regex,
    handle_pattern: Regex,
    punctuation: Regex,
    digits: Regex,
    stopwords: Arc<StopwordSet>,
    lemmas: Arc<LemmaTable>,
}

impl Normalizer {
    pub fn new(stopwords: Arc<StopwordSet>, lemmas: Arc<LemmaTable>) -> Result<Self, ConfigError> {
        lemmas.validate(&stopwords)?;
        Ok(Self {
            url_pattern: Regex::new(r"(?i)(?:https?://|www\.)\S*")?,
            handle_pattern: Regex::new(r"[@#]\w+")?,
            punctuation: Regex::new(r"[\p{P}\p{S}]")?,
            digits: Regex::new(r"\p{N}")?,
            stopwords,
            lemmas,
        })
    }

    pub fn french() -> Result<Self, ConfigError> {
        Self::new(Arc::new(StopwordSet::french()), Arc::new(LemmaTable::french()))
    }

    pub fn from_config(config: &NormalizerConfig) -> Result<Self, ConfigError> {
        let stopwords = match &config.stopwords_path {
            Some(path) => StopwordSet::from_path(path)?,
            None => StopwordSet::french(),
        };
        let lemmas = match &config.lemmas_path {
            Some(path) => LemmaTable::from_path(path)?,
            None => LemmaTable::french(),
        };
        debug!("Normalizer resources - stopwords={}, lemmas={}", stopwords.len(), lemmas.len());
        Self::new(Arc::new(stopwords), Arc::new(lemmas))
    }

    /// The lemma table, shared with the lexical classifier.
    pub fn lemmas(&self) -> Arc<LemmaTable> {
        Arc::clone(&self.lemmas)
    }

    pub fn normalize(&self, text: &str) -> String {
        let text: String = text.nfkc().collect();

        // 1. URLs, then @mentions and #hashtags
        let text = self.url_pattern.replace_all(&text, " ");
        let text = self.handle_pattern.replace_all(&text, " ");

        // 2. punctuation splits words, digits vanish
        let text = self.punctuation.replace_all(&text, " ");
        let text = self.digits.replace_all(&text, "");

        // 3. drop anything outside the alphabet
        let text: String = text
            .chars()
            .filter(|c| c.is_whitespace() || is_target_letter(*c))
            .collect();

        // 4..8
        text.to_lowercase()
            .split_whitespace()
            .filter(|word| !self.stopwords.contains(word))
            .map(|word| self.lemmas.lemma(word))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Fills `clean_text` for every record. Empty results stay in the corpus.
    pub fn normalize_corpus(&self, corpus: Corpus) -> (Corpus, NormalizationStats) {
        let mut stats = NormalizationStats::default();
        let records = corpus
            .into_iter()
            .map(|mut record| {
                record.clean_text = self.normalize(&record.raw_text);
                stats.normalized += 1;
                if record.clean_text.is_empty() {
                    stats.empty_after += 1;
                    debug!("Row {} is empty after normalization", record.ordinal);
                }
                record
            })
            .collect();

        info!(
            "Normalization complete - normalized={}, empty_after={}",
            stats.normalized, stats.empty_after
        );
        (records, stats)
    }
}
