//! Run diagnostics and the aggregate summary written next to the output table.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::info;

use crate::classifiers::FailureCounts;
use crate::config::ReportConfig;
use crate::models::{DisplayLanguage, ReconciledRecord, ScoredRecord, Sentiment};
use crate::stages::{AgreementRate, ConfusionMatrix, DedupStats, LanguageStats};
use crate::utils::normalization::{fold_diacritics, NormalizationStats};

/// What each stage dropped or failed on during a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostics {
    pub input_rows: usize,
    pub dedup: DedupStats,
    /// Absent when language filtering is disabled.
    pub language: Option<LanguageStats>,
    pub normalization: NormalizationStats,
    pub lexical_failures: FailureCounts,
    pub contextual_failures: FailureCounts,
    pub classified: usize,
    pub agreement_rate: AgreementRate,
}

impl Diagnostics {
    pub fn log(&self) {
        info!("Input rows: {}", self.input_rows);
        info!(
            "  Dedup: kept={}, empty={}, duplicates={}",
            self.dedup.kept, self.dedup.empty_dropped, self.dedup.duplicates_dropped
        );
        match &self.language {
            Some(lang) => info!(
                "  Language: kept={}, mismatched={}, detection_failed={}",
                lang.kept, lang.mismatched, lang.detection_failed
            ),
            None => info!("  Language: filter disabled"),
        }
        info!("  Empty after normalization: {}", self.normalization.empty_after);
        info!(
            "Classifier failures: lexical={} {:?}, contextual={} {:?}",
            self.lexical_failures.total,
            self.lexical_failures.by_reason,
            self.contextual_failures.total,
            self.contextual_failures.by_reason
        );
        info!("Classified: {}", self.classified);
        info!("Agreement rate: {}", self.agreement_rate);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WordCount {
    pub word: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriggeredRecommendation {
    pub keyword: String,
    pub advice: String,
    pub mentions: usize,
}

/// Aggregates for one classifier. Means are taken within that classifier's
/// own score domain only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifierSummary {
    pub distribution: BTreeMap<String, usize>,
    pub positive_percent: Option<f64>,
    pub negative_percent: Option<f64>,
    pub mean_score: BTreeMap<String, f64>,
    pub top_negative_words: Vec<WordCount>,
    pub recommendations: Vec<TriggeredRecommendation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub generated_at: DateTime<Utc>,
    pub classified: usize,
    pub lexical: ClassifierSummary,
    pub contextual: ClassifierSummary,
    pub agreement_rate: AgreementRate,
    pub confusion: ConfusionMatrix,
    pub themes: BTreeMap<String, usize>,
    pub diagnostics: Diagnostics,
}

fn percent(part: usize, total: usize) -> Option<f64> {
    (total > 0).then(|| (part as f64 / total as f64 * 10_000.0).round() / 100.0)
}

/// Most frequent clean-text words, ties broken alphabetically.
pub fn top_words<'a, I>(texts: I, limit: usize) -> Vec<WordCount>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for text in texts {
        for word in text.split_whitespace() {
            *counts.entry(word).or_insert(0) += 1;
        }
    }
    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(limit)
        .map(|(word, count)| WordCount {
            word: word.to_string(),
            count,
        })
        .collect()
}

fn recommendations_for(words: &[WordCount], config: &ReportConfig) -> Vec<TriggeredRecommendation> {
    words
        .iter()
        .flat_map(|wc| {
            let folded = fold_diacritics(&wc.word);
            config
                .recommendations
                .iter()
                .filter(move |rec| fold_diacritics(&rec.keyword) == folded)
                .map(move |rec| TriggeredRecommendation {
                    keyword: rec.keyword.clone(),
                    advice: rec.advice.clone(),
                    mentions: wc.count,
                })
        })
        .collect()
}

fn summarize<F>(
    records: &[&ReconciledRecord],
    pick: F,
    config: &ReportConfig,
    language: DisplayLanguage,
) -> ClassifierSummary
where
    F: Fn(&ReconciledRecord) -> (Sentiment, f64),
{
    let mut counts: BTreeMap<Sentiment, usize> = Sentiment::ALL.iter().map(|s| (*s, 0)).collect();
    let mut sums: BTreeMap<Sentiment, f64> = BTreeMap::new();
    for r in records {
        let (sentiment, score) = pick(r);
        *counts.entry(sentiment).or_insert(0) += 1;
        *sums.entry(sentiment).or_insert(0.0) += score;
    }

    let total = records.len();
    let mean_score = sums
        .iter()
        .map(|(s, sum)| (s.label(language).to_string(), sum / counts[s] as f64))
        .collect();

    let negative_texts = records
        .iter()
        .filter(|r| pick(r).0 == Sentiment::Negative)
        .map(|r| r.record.clean_text.as_str());
    let top_negative_words = top_words(negative_texts, config.top_words);
    let recommendations = recommendations_for(&top_negative_words, config);

    ClassifierSummary {
        distribution: counts.iter().map(|(s, n)| (s.label(language).to_string(), *n)).collect(),
        positive_percent: percent(counts[&Sentiment::Positive], total),
        negative_percent: percent(counts[&Sentiment::Negative], total),
        mean_score,
        top_negative_words,
        recommendations,
    }
}

impl RunSummary {
    pub fn build(
        records: &[ScoredRecord],
        themes: BTreeMap<String, usize>,
        diagnostics: Diagnostics,
        config: &ReportConfig,
        language: DisplayLanguage,
    ) -> Self {
        let reconciled: Vec<&ReconciledRecord> = records.iter().map(|r| &r.reconciled).collect();
        Self {
            generated_at: Utc::now(),
            classified: reconciled.len(),
            lexical: summarize(
                &reconciled,
                |r| (r.lexical.sentiment, r.lexical.polarity.value()),
                config,
                language,
            ),
            contextual: summarize(
                &reconciled,
                |r| (r.contextual.sentiment, r.contextual.confidence.value()),
                config,
                language,
            ),
            agreement_rate: diagnostics.agreement_rate,
            confusion: ConfusionMatrix::from_records(reconciled.iter().copied()),
            themes,
            diagnostics,
        }
    }
}
