use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use dual_sentiment::classifiers::HttpModel;
use dual_sentiment::models::DisplayLanguage;
use dual_sentiment::stages::WhatlangDetector;
use dual_sentiment::table::{read_corpus, write_disagreements, write_scored, OutputColumns};
use dual_sentiment::{Pipeline, PipelineConfig};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "dual-sentiment",
    about = "Classify French social-media comments with two sentiment models"
)]
struct Args {
    /// Input CSV with a header row
    #[arg(long)]
    input: PathBuf,

    /// Scored output CSV
    #[arg(long, default_value = "scored.csv")]
    output: PathBuf,

    /// TOML configuration; defaults apply when omitted
    #[arg(long, env = "DUAL_SENTIMENT_CONFIG")]
    config: Option<PathBuf>,

    /// Write diagnostics and aggregates as JSON
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Write records the two classifiers disagree on
    #[arg(long)]
    disagreements: Option<PathBuf>,

    /// Contextual model inference endpoint
    #[arg(long, env = "SENTIMENT_MODEL_URL")]
    model_url: Option<String>,

    #[arg(long, env = "SENTIMENT_MODEL_TOKEN", hide_env_values = true)]
    model_token: Option<String>,

    /// Texts per model request
    #[arg(long)]
    batch_size: Option<usize>,

    /// Model requests in flight
    #[arg(long)]
    concurrency: Option<usize>,

    #[arg(long, value_enum)]
    display_language: Option<DisplayLanguage>,

    /// Keep every record regardless of detected language
    #[arg(long, default_value_t = false)]
    no_language_filter: bool,
}

impl Args {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(url) = &self.model_url {
            config.contextual.endpoint = Some(url.clone());
        }
        if let Some(token) = &self.model_token {
            config.contextual.api_token = Some(token.clone());
        }
        if let Some(n) = self.batch_size {
            config.contextual.batch_size = n;
        }
        if let Some(n) = self.concurrency {
            config.contextual.concurrency = n;
        }
        if let Some(language) = self.display_language {
            config.output.display_language = language;
        }
        if self.no_language_filter {
            config.language.enabled = false;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();

    let mut config =
        PipelineConfig::load(args.config.as_deref()).context("failed to load configuration")?;
    args.apply(&mut config);
    config.validate().context("invalid configuration")?;
    if config.contextual.endpoint.is_none() {
        bail!(
            "no contextual model endpoint: set --model-url, SENTIMENT_MODEL_URL \
             or contextual.endpoint"
        );
    }

    info!("Input: {}", args.input.display());
    info!("Output: {}", args.output.display());
    if let Some(endpoint) = &config.contextual.endpoint {
        info!("Model: {}", endpoint);
    }
    info!(
        "Batch size: {}, concurrency: {}",
        config.contextual.batch_size, config.contextual.concurrency
    );
    if !config.language.enabled {
        warn!("Language filter disabled - every record is kept");
    }

    let model = HttpModel::new(&config.contextual)?;
    let detector = WhatlangDetector::new(config.language.min_confidence);
    let pipeline = Pipeline::new(&config, model, detector)?;

    let start = Instant::now();
    let input = File::open(&args.input)
        .with_context(|| format!("failed to open input {}", args.input.display()))?;
    let (schema, corpus) = read_corpus(BufReader::new(input), &config.columns)?;

    let output = pipeline.run(corpus).await?;

    let language = config.output.display_language;
    let columns = OutputColumns::from_config(&config.output);
    let out_file = File::create(&args.output)
        .with_context(|| format!("failed to create output {}", args.output.display()))?;
    write_scored(BufWriter::new(out_file), &schema, &columns, &output.records, language)?;

    if let Some(path) = &args.disagreements {
        let file = File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        write_disagreements(BufWriter::new(file), &columns, &output.disagreements(), language)?;
    }

    if let Some(path) = &args.summary {
        let summary = pipeline.summarize(&output, &config);
        let file = File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &summary)
            .with_context(|| format!("failed to write summary {}", path.display()))?;
    }

    let elapsed = start.elapsed();
    info!("=== Run complete ===");
    output.diagnostics.log();
    info!(
        "Duration: {:.2}s ({:.0} records/sec)",
        elapsed.as_secs_f64(),
        output.diagnostics.input_rows as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
    );
    info!("Output files:");
    info!("  {}", args.output.display());
    for path in [&args.disagreements, &args.summary].into_iter().flatten() {
        info!("  {}", path.display());
    }

    Ok(())
}
