use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::{DisplayLanguage, Sentiment, TextSource};

/// Everything a run needs, resolved once before the first record is read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub columns: ColumnsConfig,
    pub language: LanguageConfig,
    pub normalizer: NormalizerConfig,
    pub lexical: LexicalConfig,
    pub contextual: ContextualConfig,
    pub themes: ThemesConfig,
    pub output: OutputConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnsConfig {
    /// Explicit text column; when unset the aliases are tried in order.
    pub text_column: Option<String>,
    pub text_aliases: Vec<String>,
}

impl Default for ColumnsConfig {
    fn default() -> Self {
        Self {
            text_column: None,
            text_aliases: vec!["text".into(), "clean_text".into(), "comment".into()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageConfig {
    pub enabled: bool,
    /// ISO 639-1 code of the language to keep.
    pub target: String,
    /// Detections below this confidence count as detection failures.
    pub min_confidence: f64,
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            target: "fr".into(),
            min_confidence: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// One stopword per line; replaces the built-in French list.
    pub stopwords_path: Option<PathBuf>,
    /// `form<TAB>lemma` per line; replaces the built-in French table.
    pub lemmas_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LexicalConfig {
    pub positive_threshold: f64,
    pub negative_threshold: f64,
    pub negation_window: usize,
    pub input: TextSource,
}

impl Default for LexicalConfig {
    fn default() -> Self {
        Self {
            positive_threshold: 0.1,
            negative_threshold: -0.1,
            negation_window: 3,
            input: TextSource::Clean,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LabelOrdinal {
    pub label: String,
    pub ordinal: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrdinalRule {
    pub ordinal: u8,
    pub sentiment: Sentiment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextualConfig {
    /// Text-classification inference endpoint.
    pub endpoint: Option<String>,
    pub api_token: Option<String>,
    pub max_chars: usize,
    pub batch_size: usize,
    pub concurrency: usize,
    pub max_retries: usize,
    /// humantime duration, e.g. "30s".
    pub timeout: String,
    /// humantime duration, e.g. "500ms".
    pub initial_backoff: String,
    pub input: TextSource,
    /// Model label -> ordinal on the five-point scale.
    pub labels: Vec<LabelOrdinal>,
    /// Ordinal -> ternary sentiment.
    pub ordinal_map: Vec<OrdinalRule>,
}

impl Default for ContextualConfig {
    fn default() -> Self {
        let labels = ["1 star", "2 stars", "3 stars", "4 stars", "5 stars"]
            .iter()
            .zip(1u8..)
            .map(|(label, ordinal)| LabelOrdinal {
                label: label.to_string(),
                ordinal,
            })
            .collect();
        let ordinal_map = [
            (1, Sentiment::Negative),
            (2, Sentiment::Negative),
            (3, Sentiment::Neutral),
            (4, Sentiment::Positive),
            (5, Sentiment::Positive),
        ]
        .into_iter()
        .map(|(ordinal, sentiment)| OrdinalRule { ordinal, sentiment })
        .collect();

        Self {
            endpoint: None,
            api_token: None,
            max_chars: 512,
            batch_size: 16,
            concurrency: 1,
            max_retries: 3,
            timeout: "30s".into(),
            initial_backoff: "500ms".into(),
            input: TextSource::Raw,
            labels,
            ordinal_map,
        }
    }
}

impl ContextualConfig {
    pub fn timeout(&self) -> Result<Duration, ConfigError> {
        parse_duration("contextual.timeout", &self.timeout)
    }

    pub fn initial_backoff(&self) -> Result<Duration, ConfigError> {
        parse_duration("contextual.initial_backoff", &self.initial_backoff)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ThemeRule {
    pub name: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemesConfig {
    pub fallback: String,
    pub source: TextSource,
    /// Declaration order is precedence order.
    pub rules: Vec<ThemeRule>,
}

impl Default for ThemesConfig {
    fn default() -> Self {
        let rule = |name: &str, keywords: &[&str]| ThemeRule {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        };
        Self {
            fallback: "Other".into(),
            source: TextSource::Raw,
            rules: vec![
                rule(
                    "Réseau",
                    &["reseau", "connexion", "internet", "couverture", "signal", "débit"],
                ),
                rule(
                    "Service client",
                    &["service", "client", "réponse", "appel", "support", "aide", "conseiller"],
                ),
                rule("Offres", &["forfait", "offre", "prix", "promo", "tarif", "abonnement"]),
                rule("Boutique", &["boutique", "agence", "point de vente", "guichet"]),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub display_language: DisplayLanguage,
    pub lexical_suffix: String,
    pub contextual_suffix: String,
    pub clean_text_column: String,
    pub agreement_column: String,
    pub theme_column: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            display_language: DisplayLanguage::En,
            lexical_suffix: "lexical".into(),
            contextual_suffix: "contextual".into(),
            clean_text_column: "clean_text".into(),
            agreement_column: "models_agree".into(),
            theme_column: "theme".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Recommendation {
    pub keyword: String,
    pub advice: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// How many frequent words of negative records to keep.
    pub top_words: usize,
    pub recommendations: Vec<Recommendation>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        let rec = |keyword: &str, advice: &str| Recommendation {
            keyword: keyword.to_string(),
            advice: advice.to_string(),
        };
        Self {
            top_words: 10,
            recommendations: vec![
                rec("reseau", "Improve network quality and stability."),
                rec("connexion", "Strengthen coverage and connection speed."),
                rec("service", "Optimise customer service responsiveness."),
                rec("forfait", "Offer plans better suited to customer needs."),
                rec("internet", "Increase internet speed and reliability."),
                rec("appel", "Improve call quality and availability."),
                rec("client", "Listen more closely to customers and their satisfaction."),
            ],
        }
    }
}

impl PipelineConfig {
    /// Reads a TOML file, or returns the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(path.display().to_string(), e.to_string()))?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.columns.text_column.as_deref().is_some_and(|c| c.trim().is_empty()) {
            return Err(ConfigError::Invalid("columns.text_column", "cannot be empty".into()));
        }
        if self.columns.text_column.is_none() && self.columns.text_aliases.is_empty() {
            return Err(ConfigError::Invalid(
                "columns.text_aliases",
                "needs at least one alias when no text_column is set".into(),
            ));
        }

        if self.language.enabled {
            let target = self.language.target.trim();
            if target.len() != 2 || !target.chars().all(|c| c.is_ascii_lowercase()) {
                return Err(ConfigError::Invalid(
                    "language.target",
                    format!("expected an ISO 639-1 code, got '{}'", self.language.target),
                ));
            }
            if !(0.0..=1.0).contains(&self.language.min_confidence) {
                return Err(ConfigError::Invalid(
                    "language.min_confidence",
                    "must be within [0, 1]".into(),
                ));
            }
        }

        let lex = &self.lexical;
        if !lex.positive_threshold.is_finite() || !lex.negative_threshold.is_finite() {
            return Err(ConfigError::Invalid("lexical", "thresholds must be finite".into()));
        }
        if lex.negative_threshold > lex.positive_threshold {
            return Err(ConfigError::Invalid(
                "lexical",
                format!(
                    "negative_threshold ({}) is above positive_threshold ({})",
                    lex.negative_threshold, lex.positive_threshold
                ),
            ));
        }

        let ctx = &self.contextual;
        if ctx.max_chars == 0 {
            return Err(ConfigError::Invalid("contextual.max_chars", "must be positive".into()));
        }
        if ctx.batch_size == 0 {
            return Err(ConfigError::Invalid("contextual.batch_size", "must be positive".into()));
        }
        if ctx.concurrency == 0 {
            return Err(ConfigError::Invalid("contextual.concurrency", "must be positive".into()));
        }
        ctx.timeout()?;
        ctx.initial_backoff()?;
        validate_ordinal_tables(&ctx.labels, &ctx.ordinal_map)?;

        validate_theme_rules(&self.themes)?;

        let out = &self.output;
        if out.lexical_suffix.trim().is_empty() || out.contextual_suffix.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "output",
                "classifier suffixes cannot be empty".into(),
            ));
        }
        if out.lexical_suffix == out.contextual_suffix {
            return Err(ConfigError::Invalid(
                "output",
                "classifier suffixes must differ so both results stay selectable".into(),
            ));
        }
        let names = [
            out.clean_text_column.as_str(),
            out.agreement_column.as_str(),
            out.theme_column.as_str(),
        ];
        if names.iter().any(|n| n.trim().is_empty()) {
            return Err(ConfigError::Invalid("output", "column names cannot be empty".into()));
        }

        Ok(())
    }
}

/// Both tables must cover the ordinals 1..=5 exactly once each.
fn validate_ordinal_tables(
    labels: &[LabelOrdinal],
    ordinal_map: &[OrdinalRule],
) -> Result<(), ConfigError> {
    let expected: BTreeSet<u8> = (1..=5).collect();

    let mut seen_labels = HashSet::new();
    for entry in labels {
        if !expected.contains(&entry.ordinal) {
            return Err(ConfigError::Invalid(
                "contextual.labels",
                format!("label '{}' has ordinal {} outside 1..=5", entry.label, entry.ordinal),
            ));
        }
        if !seen_labels.insert(entry.label.trim().to_lowercase()) {
            return Err(ConfigError::Invalid(
                "contextual.labels",
                format!("label '{}' is declared twice", entry.label),
            ));
        }
    }
    let label_ordinals: BTreeSet<u8> = labels.iter().map(|l| l.ordinal).collect();
    if label_ordinals != expected {
        return Err(ConfigError::Invalid(
            "contextual.labels",
            format!("labels cover ordinals {label_ordinals:?}, expected 1..=5"),
        ));
    }

    let mut mapped = BTreeSet::new();
    for rule in ordinal_map {
        if !expected.contains(&rule.ordinal) || !mapped.insert(rule.ordinal) {
            return Err(ConfigError::Invalid(
                "contextual.ordinal_map",
                format!("ordinal {} is out of range or mapped twice", rule.ordinal),
            ));
        }
    }
    if mapped != expected {
        return Err(ConfigError::Invalid(
            "contextual.ordinal_map",
            format!("maps ordinals {mapped:?}, expected 1..=5"),
        ));
    }
    Ok(())
}

fn validate_theme_rules(themes: &ThemesConfig) -> Result<(), ConfigError> {
    if themes.fallback.trim().is_empty() {
        return Err(ConfigError::Invalid("themes.fallback", "cannot be empty".into()));
    }
    let mut names = HashSet::new();
    for rule in &themes.rules {
        if rule.name.trim().is_empty() {
            return Err(ConfigError::Invalid("themes.rules", "theme names cannot be empty".into()));
        }
        if rule.name == themes.fallback {
            return Err(ConfigError::Invalid(
                "themes.rules",
                format!("theme '{}' collides with the fallback label", rule.name),
            ));
        }
        if !names.insert(rule.name.as_str()) {
            return Err(ConfigError::Invalid(
                "themes.rules",
                format!("theme '{}' is declared twice", rule.name),
            ));
        }
        if rule.keywords.iter().all(|k| k.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "themes.rules",
                format!("theme '{}' has no keywords", rule.name),
            ));
        }
    }
    Ok(())
}

fn parse_duration(field: &'static str, value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value).map_err(|e| ConfigError::Invalid(field, e.to_string()))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    Read(String, String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid configuration {0}: {1}")]
    Invalid(&'static str, String),

    #[error("Invalid resource {0}: {1}")]
    Resource(String, String),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}
