use serde::Serialize;
use sha1::{Digest, Sha1};
use std::collections::HashSet;
use tracing::{debug, info};

use crate::error::PipelineError;
use crate::models::Corpus;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DedupStats {
    pub empty_dropped: usize,
    pub duplicates_dropped: usize,
    pub kept: usize,
}

fn content_hash(text: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Drops blank records and repeated texts, keeping the first occurrence.
///
/// An empty result is fatal: there is nothing left to classify.
pub fn deduplicate(corpus: Corpus) -> Result<(Corpus, DedupStats), PipelineError> {
    let input_rows = corpus.len();
    let mut stats = DedupStats::default();
    let mut seen_hashes: HashSet<String> = HashSet::with_capacity(input_rows);

    let kept: Corpus = corpus
        .into_iter()
        .filter(|record| {
            if record.raw_text.trim().is_empty() {
                stats.empty_dropped += 1;
                debug!("Row {} dropped: empty text", record.ordinal);
                return false;
            }
            if !seen_hashes.insert(content_hash(&record.raw_text)) {
                stats.duplicates_dropped += 1;
                debug!("Row {} dropped: duplicate text", record.ordinal);
                return false;
            }
            true
        })
        .collect();
    stats.kept = kept.len();

    info!(
        "Deduplication complete - kept={}, empty_dropped={}, duplicates_dropped={}",
        stats.kept, stats.empty_dropped, stats.duplicates_dropped
    );

    if kept.is_empty() {
        return Err(PipelineError::EmptyCorpus {
            input_rows,
            empty: stats.empty_dropped,
            duplicates: stats.duplicates_dropped,
        });
    }
    Ok((kept, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Record;

    fn corpus(texts: &[&str]) -> Corpus {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| Record::from_text(i, t))
            .collect()
    }

    #[test]
    fn test_keeps_first_duplicate() {
        let input = corpus(&["Super réseau", "Bof", "Super réseau", "Bof"]);
        let (kept, stats) = deduplicate(input).unwrap();
        let ordinals: Vec<_> = kept.iter().map(|r| r.ordinal).collect();
        assert_eq!(ordinals, vec![0, 1]);
        assert_eq!(
            stats,
            DedupStats {
                empty_dropped: 0,
                duplicates_dropped: 2,
                kept: 2
            }
        );
    }

    #[test]
    fn test_drops_blank_text() {
        let (kept, stats) = deduplicate(corpus(&["", "   \t", "Merci"])).unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept.records()[0].raw_text, "Merci");
        assert_eq!(stats.empty_dropped, 2);
    }

    #[test]
    fn test_near_duplicates_are_distinct() {
        let (kept, _) = deduplicate(corpus(&["Merci", "merci", "Merci "])).unwrap();
        assert_eq!(kept.len(), 3);
    }

    #[test]
    fn test_empty_result_is_an_error() {
        let err = deduplicate(corpus(&["", " "])).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::EmptyCorpus {
                input_rows: 2,
                empty: 2,
                duplicates: 0
            }
        ));
        assert!(matches!(deduplicate(Corpus::default()), Err(PipelineError::EmptyCorpus { .. })));
    }
}
