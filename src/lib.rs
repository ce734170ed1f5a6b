//! French social-media sentiment pipeline: deduplication, language filtering,
//! normalization, two independent classifiers, reconciliation and theme tagging.

pub mod classifiers;
pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod stages;
pub mod table;
pub mod utils;

pub use config::{ConfigError, PipelineConfig};
pub use error::PipelineError;
pub use pipeline::{Pipeline, PipelineOutput};
