use crate::config::ConfigError;

/// Fatal conditions: the run stops and nothing is written.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("No text column found: expected one of {expected:?}, headers are {found:?}")]
    MissingTextColumn { expected: Vec<String>, found: Vec<String> },

    #[error(
        "Corpus is empty after deduplication \
         ({input_rows} rows read, {empty} empty, {duplicates} duplicates)"
    )]
    EmptyCorpus {
        input_rows: usize,
        empty: usize,
        duplicates: usize,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
