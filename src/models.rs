use serde::{Deserialize, Serialize};
use std::fmt;

/// Ternary sentiment label shared by both classifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    pub const ALL: [Sentiment; 3] = [Sentiment::Positive, Sentiment::Neutral, Sentiment::Negative];

    pub fn label(self, language: DisplayLanguage) -> &'static str {
        match (language, self) {
            (DisplayLanguage::En, Sentiment::Positive) => "Positive",
            (DisplayLanguage::En, Sentiment::Neutral) => "Neutral",
            (DisplayLanguage::En, Sentiment::Negative) => "Negative",
            (DisplayLanguage::Fr, Sentiment::Positive) => "Positif",
            (DisplayLanguage::Fr, Sentiment::Neutral) => "Neutre",
            (DisplayLanguage::Fr, Sentiment::Negative) => "Négatif",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label(DisplayLanguage::En))
    }
}

/// Language used for the sentiment cells of the output table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DisplayLanguage {
    #[default]
    En,
    Fr,
}

/// Signed lexical polarity. Never clamped, never mixed with [`Confidence`].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize)]
pub struct Polarity(pub f64);

impl Polarity {
    pub fn value(self) -> f64 {
        self.0
    }
}

/// Unsigned model confidence in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize)]
pub struct Confidence(f64);

impl Confidence {
    pub const ZERO: Confidence = Confidence(0.0);

    pub fn new(value: f64) -> Option<Self> {
        (value.is_finite() && (0.0..=1.0).contains(&value)).then_some(Confidence(value))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LexicalVerdict {
    pub sentiment: Sentiment,
    pub polarity: Polarity,
}

impl LexicalVerdict {
    pub fn fallback() -> Self {
        Self {
            sentiment: Sentiment::Neutral,
            polarity: Polarity(0.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ContextualVerdict {
    pub sentiment: Sentiment,
    pub confidence: Confidence,
    /// Ordinal (1..=5) reported by the model; absent on fallback.
    pub ordinal: Option<u8>,
}

impl ContextualVerdict {
    pub fn fallback() -> Self {
        Self {
            sentiment: Sentiment::Neutral,
            confidence: Confidence::ZERO,
            ordinal: None,
        }
    }
}

/// One social-media item as it moves through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Zero-based data row index in the input table.
    pub ordinal: usize,
    /// Every input cell of the row, in header order.
    pub cells: Vec<String>,
    pub raw_text: String,
    pub clean_text: String,
    pub language: Option<String>,
}

impl Record {
    pub fn new(ordinal: usize, cells: Vec<String>, raw_text: impl Into<String>) -> Self {
        Self {
            ordinal,
            cells,
            raw_text: raw_text.into(),
            clean_text: String::new(),
            language: None,
        }
    }

    /// Shorthand used when only the text matters.
    pub fn from_text(ordinal: usize, text: &str) -> Self {
        Self::new(ordinal, vec![text.to_string()], text)
    }

    pub fn is_classifiable(&self) -> bool {
        !self.clean_text.is_empty()
    }
}

/// Which of a record's texts a stage reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextSource {
    /// `clean_text`, or `raw_text` when the clean form is empty.
    Clean,
    Raw,
}

impl TextSource {
    pub fn pick(self, record: &Record) -> &str {
        match self {
            TextSource::Clean if !record.clean_text.is_empty() => &record.clean_text,
            _ => &record.raw_text,
        }
    }
}

/// Ordered records of a single pipeline run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Corpus {
    records: Vec<Record>,
}

impl Corpus {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut [Record] {
        &mut self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

impl FromIterator<Record> for Corpus {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Corpus {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

/// A classified record with both verdicts and their agreement.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledRecord {
    pub record: Record,
    pub lexical: LexicalVerdict,
    pub contextual: ContextualVerdict,
    pub agreement: bool,
}

/// Final row of the output table.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub reconciled: ReconciledRecord,
    pub theme: String,
}

impl ScoredRecord {
    pub fn record(&self) -> &Record {
        &self.reconciled.record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_labels() {
        let en: Vec<_> = Sentiment::ALL.iter().map(|s| s.label(DisplayLanguage::En)).collect();
        let fr: Vec<_> = Sentiment::ALL.iter().map(|s| s.label(DisplayLanguage::Fr)).collect();
        assert_eq!(en, vec!["Positive", "Neutral", "Negative"]);
        assert_eq!(fr, vec!["Positif", "Neutre", "Négatif"]);
    }

    #[test]
    fn test_confidence_bounds() {
        assert!(Confidence::new(0.0).is_some());
        assert!(Confidence::new(1.0).is_some());
        assert!(Confidence::new(1.01).is_none());
        assert!(Confidence::new(-0.1).is_none());
        assert!(Confidence::new(f64::NAN).is_none());
    }

    #[test]
    fn test_text_source_falls_back_to_raw() {
        let mut record = Record::from_text(0, "Super réseau !");
        assert_eq!(TextSource::Clean.pick(&record), "Super réseau !");
        record.clean_text = "super réseau".to_string();
        assert_eq!(TextSource::Clean.pick(&record), "super réseau");
        assert_eq!(TextSource::Raw.pick(&record), "Super réseau !");
    }
}
