use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::classifiers::{ContextualClassifier, ContextualModel, FailureCounts, LexicalClassifier};
use crate::config::{ConfigError, PipelineConfig};
use crate::error::PipelineError;
use crate::models::{ContextualVerdict, Corpus, LexicalVerdict, Record, ScoredRecord, TextSource};
use crate::report::{Diagnostics, RunSummary};
use crate::stages::{
    agreement_rate, deduplicate, disagreements, reconcile, theme_counts, Disagreement,
    LanguageDetector, LanguageFilter, ThemeTagger,
};
use crate::utils::normalization::Normalizer;

/// Result of one run: the classified records, in input order, and what was dropped on the way.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub records: Vec<ScoredRecord>,
    pub diagnostics: Diagnostics,
}

impl PipelineOutput {
    pub fn disagreements(&self) -> Vec<Disagreement<'_>> {
        disagreements(self.records.iter().map(|r| &r.reconciled))
    }
}

/// Deduplicate, filter by language, normalize, classify twice, reconcile, tag.
pub struct Pipeline<M, D> {
    normalizer: Normalizer,
    language: Option<LanguageFilter<D>>,
    lexical: LexicalClassifier,
    lexical_input: TextSource,
    contextual: ContextualClassifier<M>,
    contextual_input: TextSource,
    tagger: ThemeTagger,
}

impl<M: ContextualModel, D: LanguageDetector> Pipeline<M, D> {
    /// Validates the configuration and loads every resource up front.
    pub fn new(config: &PipelineConfig, model: M, detector: D) -> Result<Self, ConfigError> {
        config.validate()?;
        let normalizer = Normalizer::from_config(&config.normalizer)?;
        let lexical = LexicalClassifier::from_config(&config.lexical, normalizer.lemmas());
        let language = config
            .language
            .enabled
            .then(|| LanguageFilter::new(detector, config.language.target.trim()));

        Ok(Self {
            language,
            lexical,
            lexical_input: config.lexical.input,
            contextual: ContextualClassifier::new(model, &config.contextual)?,
            contextual_input: config.contextual.input,
            tagger: ThemeTagger::from_config(&config.themes)?,
            normalizer,
        })
    }

    pub fn tagger(&self) -> &ThemeTagger {
        &self.tagger
    }

    pub async fn run(&self, corpus: Corpus) -> Result<PipelineOutput, PipelineError> {
        let input_rows = corpus.len();
        info!("Pipeline starting - rows={}", input_rows);

        let (corpus, dedup) = deduplicate(corpus)?;

        let (corpus, language) = match &self.language {
            Some(filter) => {
                let (corpus, stats) = filter.filter(corpus);
                (corpus, Some(stats))
            }
            None => (corpus, None),
        };

        let (corpus, normalization) = self.normalizer.normalize_corpus(corpus);
        let records: Vec<Record> = corpus.into_iter().filter(Record::is_classifiable).collect();

        let mut lexical_failures = FailureCounts::default();
        let lexical: Vec<LexicalVerdict> = records
            .iter()
            .map(|r| {
                self.lexical
                    .classify_detailed(self.lexical_input.pick(r))
                    .unwrap_or_else(|reason| {
                        debug!("Row {} lexical fallback: {}", r.ordinal, reason);
                        lexical_failures.record(&reason);
                        LexicalVerdict::fallback()
                    })
            })
            .collect();

        let texts: Vec<&str> = records.iter().map(|r| self.contextual_input.pick(r)).collect();
        let mut contextual_failures = FailureCounts::default();
        let contextual: Vec<ContextualVerdict> = self
            .contextual
            .classify_batch_detailed(&texts)
            .await
            .into_iter()
            .zip(&records)
            .map(|(result, r)| {
                result.unwrap_or_else(|reason| {
                    debug!("Row {} contextual fallback: {}", r.ordinal, reason);
                    contextual_failures.record(&reason);
                    ContextualVerdict::fallback()
                })
            })
            .collect();
        info!(
            "Classification complete - records={}, lexical_failures={}, contextual_failures={}",
            records.len(),
            lexical_failures.total,
            contextual_failures.total
        );

        let scored: Vec<ScoredRecord> = records
            .into_iter()
            .zip(lexical)
            .zip(contextual)
            .filter_map(|((record, a), b)| reconcile(record, a, b))
            .filter_map(|reconciled| {
                let theme = self.tagger.tag_record(&reconciled.record)?.to_string();
                Some(ScoredRecord { reconciled, theme })
            })
            .collect();

        let rate = agreement_rate(scored.iter().map(|s| &s.reconciled));
        info!("Reconciliation complete - classified={}, agreement={}", scored.len(), rate);

        Ok(PipelineOutput {
            diagnostics: Diagnostics {
                input_rows,
                dedup,
                language,
                normalization,
                lexical_failures,
                contextual_failures,
                classified: scored.len(),
                agreement_rate: rate,
            },
            records: scored,
        })
    }

    /// Aggregates for the summary document.
    pub fn summarize(&self, output: &PipelineOutput, config: &PipelineConfig) -> RunSummary {
        let themes: BTreeMap<String, usize> = theme_counts(&self.tagger, &output.records);
        RunSummary::build(
            &output.records,
            themes,
            output.diagnostics.clone(),
            &config.report,
            config.output.display_language,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifiers::contextual::tests::StubModel;
    use crate::models::{DisplayLanguage, Sentiment};
    use crate::stages::language::tests::StubDetector;
    use crate::stages::AgreementRate;
    use crate::table::{read_corpus, write_scored, OutputColumns};

    const INPUT: &str = "\
id,author,text
1,awa,\"Le réseau est excellent, merci !!\"
2,moussa,\"Service catastrophique, aucune réponse\"
3,awa,\"Le réseau est excellent, merci !!\"
4,fatou,EN: network is down again
5,ibou,!!! 123
6,khady,
7,modou,Mon forfait est moyen
";

    fn pipeline(config: &PipelineConfig) -> Pipeline<StubModel, StubDetector> {
        Pipeline::new(config, StubModel::default(), StubDetector).unwrap()
    }

    #[tokio::test]
    async fn test_end_to_end() {
        let config = PipelineConfig::default();
        let (schema, corpus) = read_corpus(INPUT.as_bytes(), &config.columns).unwrap();
        let pipeline = pipeline(&config);
        let output = pipeline.run(corpus).await.unwrap();

        let diag = &output.diagnostics;
        assert_eq!(diag.input_rows, 7);
        assert_eq!(diag.dedup.duplicates_dropped, 1);
        assert_eq!(diag.dedup.empty_dropped, 1);
        let language = diag.language.as_ref().unwrap();
        assert_eq!(language.mismatched, 1);
        assert_eq!(language.detection_failed, 1);
        assert_eq!(diag.classified, 3);

        let ordinals: Vec<_> = output.records.iter().map(|r| r.record().ordinal).collect();
        assert_eq!(ordinals, vec![0, 1, 6]);

        let first = &output.records[0].reconciled;
        assert_eq!(first.record.clean_text, "réseau excellent merci");
        assert_eq!(first.lexical.sentiment, Sentiment::Positive);
        assert_eq!(first.contextual.sentiment, Sentiment::Positive);
        assert!(first.agreement);
        assert_eq!(output.records[0].theme, "Réseau");

        let second = &output.records[1].reconciled;
        assert_eq!(second.lexical.sentiment, Sentiment::Negative);
        assert_eq!(second.contextual.sentiment, Sentiment::Negative);
        assert_eq!(output.records[1].theme, "Service client");

        // "moyen" is neutral for the lexicon but two stars for the model
        let third = &output.records[2].reconciled;
        assert_eq!(third.lexical.sentiment, Sentiment::Neutral);
        assert_eq!(third.contextual.sentiment, Sentiment::Negative);
        assert!(!third.agreement);
        assert_eq!(output.records[2].theme, "Offres");

        assert_eq!(diag.agreement_rate, AgreementRate::Percent(66.67));
        let disagreements = output.disagreements();
        assert_eq!(disagreements.len(), 1);
        assert_eq!(disagreements[0].text, "Mon forfait est moyen");

        let mut out = Vec::new();
        let columns = OutputColumns::from_config(&config.output);
        write_scored(&mut out, &schema, &columns, &output.records, DisplayLanguage::En).unwrap();
        let written = String::from_utf8(out).unwrap();
        assert_eq!(written.lines().count(), 4);
        assert!(written.lines().nth(1).unwrap().starts_with("1,awa,"));

        let summary = pipeline.summarize(&output, &config);
        assert_eq!(summary.themes["Réseau"], 1);
        assert_eq!(summary.themes["Boutique"], 0);
        assert_eq!(summary.classified, 3);
    }

    #[tokio::test]
    async fn test_clean_text_is_normalization_stable() {
        let config = PipelineConfig::default();
        let (_, corpus) = read_corpus(INPUT.as_bytes(), &config.columns).unwrap();
        let output = pipeline(&config).run(corpus).await.unwrap();
        let normalizer = Normalizer::french().unwrap();
        for scored in &output.records {
            let clean = &scored.record().clean_text;
            assert_eq!(&normalizer.normalize(clean), clean);
        }
    }

    #[tokio::test]
    async fn test_model_outage_degrades_to_neutral() {
        let config = PipelineConfig::default();
        let pipeline = Pipeline::new(&config, StubModel::failing(), StubDetector).unwrap();
        let corpus = Corpus::new(vec![Record::from_text(
            0,
            "Service catastrophique, aucune réponse",
        )]);
        let output = pipeline.run(corpus).await.unwrap();

        assert_eq!(output.records.len(), 1);
        assert_eq!(output.records[0].reconciled.contextual, ContextualVerdict::fallback());
        assert_eq!(output.diagnostics.contextual_failures.total, 1);
        assert_eq!(output.diagnostics.contextual_failures.by_reason["model_unavailable"], 1);
    }

    #[tokio::test]
    async fn test_nothing_classifiable_reports_no_data() {
        let mut config = PipelineConfig::default();
        config.language.enabled = false;
        let corpus = Corpus::new(vec![
            Record::from_text(0, "😀😀"),
            Record::from_text(1, "le la les"),
        ]);
        let output = pipeline(&config).run(corpus).await.unwrap();

        assert!(output.records.is_empty());
        assert!(output.diagnostics.language.is_none());
        assert_eq!(output.diagnostics.normalization.empty_after, 2);
        assert_eq!(output.diagnostics.agreement_rate, AgreementRate::NoData);
    }

    #[tokio::test]
    async fn test_all_blank_input_is_fatal() {
        let config = PipelineConfig::default();
        let corpus = Corpus::new(vec![Record::from_text(0, "  ")]);
        let err = pipeline(&config).run(corpus).await.unwrap_err();
        assert!(matches!(err, PipelineError::EmptyCorpus { .. }));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = PipelineConfig::default();
        config.contextual.batch_size = 0;
        assert!(Pipeline::new(&config, StubModel::default(), StubDetector).is_err());
    }
}
