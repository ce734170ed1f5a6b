use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::models::{ContextualVerdict, LexicalVerdict, Record, ReconciledRecord, Sentiment};

/// Pairs both verdicts for a classified record. Records without clean text
/// never reach reconciliation.
pub fn reconcile(
    record: Record,
    lexical: LexicalVerdict,
    contextual: ContextualVerdict,
) -> Option<ReconciledRecord> {
    if !record.is_classifiable() {
        return None;
    }
    Some(ReconciledRecord {
        agreement: lexical.sentiment == contextual.sentiment,
        record,
        lexical,
        contextual,
    })
}

/// Share of classified records on which both classifiers agree.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", content = "percent", rename_all = "snake_case")]
pub enum AgreementRate {
    /// Nothing was classified.
    NoData,
    /// Percentage, rounded to two decimals.
    Percent(f64),
}

impl fmt::Display for AgreementRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgreementRate::NoData => f.write_str("no data"),
            AgreementRate::Percent(p) => write!(f, "{p:.2}%"),
        }
    }
}

pub fn agreement_rate<'a, I>(records: I) -> AgreementRate
where
    I: IntoIterator<Item = &'a ReconciledRecord>,
{
    let (agreeing, total) = records
        .into_iter()
        .fold((0usize, 0usize), |(agree, total), r| (agree + r.agreement as usize, total + 1));
    if total == 0 {
        return AgreementRate::NoData;
    }
    let percent = agreeing as f64 / total as f64 * 100.0;
    AgreementRate::Percent((percent * 100.0).round() / 100.0)
}

/// A record the two classifiers labelled differently.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Disagreement<'a> {
    pub ordinal: usize,
    pub text: &'a str,
    pub lexical: Sentiment,
    pub contextual: Sentiment,
}

/// Disagreeing records, in input order.
pub fn disagreements<'a, I>(records: I) -> Vec<Disagreement<'a>>
where
    I: IntoIterator<Item = &'a ReconciledRecord>,
{
    records
        .into_iter()
        .filter(|r| !r.agreement)
        .map(|r| Disagreement {
            ordinal: r.record.ordinal,
            text: &r.record.raw_text,
            lexical: r.lexical.sentiment,
            contextual: r.contextual.sentiment,
        })
        .collect()
}

/// Lexical label -> contextual label -> count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    pub counts: BTreeMap<Sentiment, BTreeMap<Sentiment, usize>>,
}

impl ConfusionMatrix {
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a ReconciledRecord>,
    {
        let mut matrix = Self::default();
        for r in records {
            *matrix
                .counts
                .entry(r.lexical.sentiment)
                .or_default()
                .entry(r.contextual.sentiment)
                .or_insert(0) += 1;
        }
        matrix
    }

    pub fn get(&self, lexical: Sentiment, contextual: Sentiment) -> usize {
        self.counts
            .get(&lexical)
            .and_then(|row| row.get(&contextual))
            .copied()
            .unwrap_or(0)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{Confidence, Polarity};

    pub(crate) fn reconciled(
        ordinal: usize,
        text: &str,
        a: Sentiment,
        b: Sentiment,
    ) -> ReconciledRecord {
        let mut record = Record::from_text(ordinal, text);
        record.clean_text = text.to_lowercase();
        reconcile(
            record,
            LexicalVerdict {
                sentiment: a,
                polarity: Polarity(0.5),
            },
            ContextualVerdict {
                sentiment: b,
                confidence: Confidence::new(0.8).unwrap(),
                ordinal: Some(4),
            },
        )
        .unwrap()
    }

    #[test]
    fn test_agreement_flag() {
        assert!(reconciled(0, "a", Sentiment::Positive, Sentiment::Positive).agreement);
        assert!(!reconciled(0, "a", Sentiment::Positive, Sentiment::Neutral).agreement);
    }

    #[test]
    fn test_unclassifiable_record_is_refused() {
        let record = Record::from_text(0, "!!!");
        let lexical = LexicalVerdict::fallback();
        assert!(reconcile(record, lexical, ContextualVerdict::fallback()).is_none());
    }

    #[test]
    fn test_agreement_rate_rounds() {
        let records = vec![
            reconciled(0, "a", Sentiment::Positive, Sentiment::Positive),
            reconciled(1, "b", Sentiment::Negative, Sentiment::Negative),
            reconciled(2, "c", Sentiment::Neutral, Sentiment::Positive),
        ];
        assert_eq!(agreement_rate(&records), AgreementRate::Percent(66.67));
        assert_eq!(agreement_rate(&records).to_string(), "66.67%");
    }

    #[test]
    fn test_agreement_rate_without_data() {
        let records: Vec<ReconciledRecord> = Vec::new();
        assert_eq!(agreement_rate(&records), AgreementRate::NoData);
        assert_eq!(
            serde_json::to_value(AgreementRate::NoData).unwrap(),
            serde_json::json!({"status": "no_data"})
        );
        assert_eq!(
            serde_json::to_value(AgreementRate::Percent(50.0)).unwrap(),
            serde_json::json!({"status": "percent", "percent": 50.0})
        );
    }

    #[test]
    fn test_disagreements_keep_order_and_raw_text() {
        let records = vec![
            reconciled(0, "Bof", Sentiment::Neutral, Sentiment::Negative),
            reconciled(1, "Top", Sentiment::Positive, Sentiment::Positive),
            reconciled(2, "Nul", Sentiment::Positive, Sentiment::Negative),
        ];
        let found = disagreements(&records);
        assert_eq!(found.len(), 2);
        assert_eq!((found[0].ordinal, found[0].text), (0, "Bof"));
        assert_eq!((found[1].ordinal, found[1].text), (2, "Nul"));
        assert_eq!(found[1].lexical, Sentiment::Positive);
        assert_eq!(found[1].contextual, Sentiment::Negative);
    }

    #[test]
    fn test_confusion_matrix() {
        let records = vec![
            reconciled(0, "a", Sentiment::Positive, Sentiment::Positive),
            reconciled(1, "b", Sentiment::Positive, Sentiment::Negative),
            reconciled(2, "c", Sentiment::Positive, Sentiment::Negative),
        ];
        let matrix = ConfusionMatrix::from_records(&records);
        assert_eq!(matrix.get(Sentiment::Positive, Sentiment::Negative), 2);
        assert_eq!(matrix.get(Sentiment::Positive, Sentiment::Positive), 1);
        assert_eq!(matrix.get(Sentiment::Negative, Sentiment::Negative), 0);
    }
}
