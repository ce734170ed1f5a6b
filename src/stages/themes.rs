use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};
use std::collections::BTreeMap;
use tracing::info;

use crate::config::{ConfigError, ThemesConfig};
use crate::models::{Record, ScoredRecord, TextSource};
use crate::utils::normalization::fold_diacritics;

/// Assigns exactly one theme per record: the first declared theme with a
/// keyword inside the text, or the fallback.
#[derive(Debug, Clone)]
pub struct ThemeTagger {
    themes: Vec<String>,
    fallback: String,
    source: TextSource,
    automaton: AhoCorasick,
    // pattern index -> theme index
    pattern_theme: Vec<usize>,
}

impl ThemeTagger {
    pub fn from_config(config: &ThemesConfig) -> Result<Self, ConfigError> {
        let mut patterns = Vec::new();
        let mut pattern_theme = Vec::new();
        for (theme_idx, rule) in config.rules.iter().enumerate() {
            for keyword in &rule.keywords {
                let folded = fold_diacritics(keyword.trim());
                if folded.is_empty() {
                    continue;
                }
                patterns.push(folded);
                pattern_theme.push(theme_idx);
            }
        }

        // Overlapping search needs the standard match semantics.
        let automaton = AhoCorasickBuilder::new()
            .match_kind(MatchKind::Standard)
            .build(&patterns)
            .map_err(|e| ConfigError::Invalid("themes.rules", e.to_string()))?;

        Ok(Self {
            themes: config.rules.iter().map(|r| r.name.clone()).collect(),
            fallback: config.fallback.clone(),
            source: config.source,
            automaton,
            pattern_theme,
        })
    }

    pub fn themes(&self) -> &[String] {
        &self.themes
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    pub fn tag(&self, text: &str) -> &str {
        let folded = fold_diacritics(text);
        self.automaton
            .find_overlapping_iter(&folded)
            .map(|m| self.pattern_theme[m.pattern().as_usize()])
            .min()
            .map(|idx| self.themes[idx].as_str())
            .unwrap_or(&self.fallback)
    }

    /// `None` for records excluded from classification.
    pub fn tag_record(&self, record: &Record) -> Option<&str> {
        record.is_classifiable().then(|| self.tag(self.source.pick(record)))
    }
}

/// Theme -> record count, every configured theme and the fallback included.
pub fn theme_counts(tagger: &ThemeTagger, records: &[ScoredRecord]) -> BTreeMap<String, usize> {
    let mut counts: BTreeMap<String, usize> = tagger
        .themes()
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(tagger.fallback()))
        .map(|name| (name.to_string(), 0))
        .collect();
    for record in records {
        *counts.entry(record.theme.clone()).or_insert(0) += 1;
    }
    info!("Theme distribution: {:?}", counts);
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ThemeRule;

    fn tagger() -> ThemeTagger {
        ThemeTagger::from_config(&ThemesConfig::default()).unwrap()
    }

    #[test]
    fn test_single_keyword() {
        assert_eq!(tagger().tag("forfait"), "Offres");
        assert_eq!(tagger().tag("Le FORFAIT est trop cher"), "Offres");
    }

    #[test]
    fn test_declaration_order_wins() {
        let t = tagger();
        // "service" (Service client) appears before "réseau" (Réseau) in the text
        assert_eq!(t.tag("Le service client parle du réseau"), "Réseau");
        assert_eq!(t.tag("appel et connexion"), "Réseau");
    }

    #[test]
    fn test_accent_insensitive() {
        let t = tagger();
        assert_eq!(t.tag("Le réseau est excellent"), "Réseau");
        assert_eq!(t.tag("le reseau"), "Réseau");
        assert_eq!(t.tag("DÉBIT trop faible"), "Réseau");
        assert_eq!(t.tag("une réponse rapide"), "Service client");
    }

    #[test]
    fn test_fallback() {
        let t = tagger();
        assert_eq!(t.tag("Bonne année à tous"), "Other");
        assert_eq!(t.tag(""), "Other");
    }

    #[test]
    fn test_overlapping_keywords_pick_earliest_theme() {
        let config = ThemesConfig {
            rules: vec![
                ThemeRule {
                    name: "Data".into(),
                    keywords: vec!["internet".into()],
                },
                ThemeRule {
                    name: "Prix".into(),
                    keywords: vec!["inter".into()],
                },
            ],
            ..ThemesConfig::default()
        };
        let t = ThemeTagger::from_config(&config).unwrap();
        assert_eq!(t.tag("internet"), "Data");
        assert_eq!(t.tag("interdit"), "Prix");
    }

    #[test]
    fn test_tag_record_skips_unclassifiable() {
        let t = tagger();
        let mut record = Record::from_text(0, "Mon forfait !!");
        assert_eq!(t.tag_record(&record), None);
        record.clean_text = "forfait".into();
        assert_eq!(t.tag_record(&record), Some("Offres"));
    }
}
