use std::collections::{HashMap, HashSet};

/// Word-level polarity source for the lexical classifier.
pub trait SentimentLexicon {
    /// Polarity of a lemma, roughly within [-1, 1].
    fn score(&self, word: &str) -> Option<f64>;

    /// Multiplier applied to the next polar word.
    fn intensifier(&self, word: &str) -> Option<f64>;

    fn is_negation(&self, word: &str) -> bool;
}

/// French polarity lexicon keyed by lemma, tuned for telecom customer comments.
#[derive(Debug, Clone)]
pub struct FrenchLexicon {
    polarity: HashMap<&'static str, f64>,
    intensifiers: HashMap<&'static str, f64>,
    negations: HashSet<&'static str>,
}

impl FrenchLexicon {
    pub fn new() -> Self {
        let positive = [
            ("excellent", 0.9),
            ("parfait", 0.9),
            ("merveilleux", 0.9),
            ("génial", 0.8),
            ("adorer", 0.8),
            ("formidable", 0.8),
            ("magnifique", 0.8),
            ("félicitations", 0.8),
            ("super", 0.7),
            ("bravo", 0.7),
            ("heureux", 0.7),
            ("top", 0.6),
            ("bon", 0.6),
            ("satisfait", 0.6),
            ("content", 0.6),
            ("meilleur", 0.6),
            ("efficace", 0.6),
            ("agréable", 0.6),
            ("incroyable", 0.6),
            ("merci", 0.5),
            ("remercier", 0.5),
            ("bien", 0.5),
            ("aimer", 0.5),
            ("recommander", 0.5),
            ("fiable", 0.5),
            ("sympa", 0.5),
            ("réactif", 0.5),
            ("rapide", 0.4),
            ("facile", 0.4),
            ("utile", 0.4),
            ("cool", 0.4),
            ("professionnel", 0.4),
            ("stable", 0.3),
            ("gratuit", 0.3),
            ("fonctionner", 0.3),
            ("marcher", 0.3),
        ];
        let negative = [
            ("catastrophique", -0.9),
            ("horrible", -0.9),
            ("pire", -0.9),
            ("arnaque", -0.9),
            ("nul", -0.8),
            ("catastrophe", -0.8),
            ("inadmissible", -0.8),
            ("inacceptable", -0.8),
            ("voleur", -0.8),
            ("détester", -0.8),
            ("insupportable", -0.8),
            ("scandale", -0.8),
            ("scandaleux", -0.8),
            ("lamentable", -0.8),
            ("mauvais", -0.7),
            ("honteux", -0.7),
            ("honte", -0.7),
            ("incompétent", -0.7),
            ("décevant", -0.6),
            ("déçu", -0.6),
            ("panne", -0.6),
            ("coupure", -0.6),
            ("fâché", -0.6),
            ("médiocre", -0.6),
            ("ridicule", -0.6),
            ("marre", -0.6),
            ("lent", -0.5),
            ("lenteur", -0.5),
            ("instable", -0.5),
            ("pénible", -0.5),
            ("triste", -0.5),
            ("cher", -0.4),
            ("problème", -0.4),
            ("couper", -0.4),
            ("plainte", -0.4),
            ("bug", -0.4),
            ("impossible", -0.4),
            ("difficile", -0.3),
        ];
        let intensifiers = [
            ("extrêmement", 1.5),
            ("hyper", 1.4),
            ("complètement", 1.4),
            ("totalement", 1.4),
            ("très", 1.3),
            ("vraiment", 1.3),
            ("trop", 1.3),
            ("tellement", 1.3),
            ("vachement", 1.3),
            ("plutôt", 0.9),
            ("assez", 0.8),
            ("peu", 0.5),
        ];
        let negations = [
            "ne", "n", "pas", "jamais", "aucun", "aucune", "rien", "sans", "guère", "nullement",
        ];

        Self {
            polarity: positive.into_iter().chain(negative).collect(),
            intensifiers: intensifiers.into_iter().collect(),
            negations: negations.into_iter().collect(),
        }
    }
}

impl Default for FrenchLexicon {
    fn default() -> Self {
        Self::new()
    }
}

impl SentimentLexicon for FrenchLexicon {
    fn score(&self, word: &str) -> Option<f64> {
        self.polarity.get(word).copied()
    }

    fn intensifier(&self, word: &str) -> Option<f64> {
        self.intensifiers.get(word).copied()
    }

    fn is_negation(&self, word: &str) -> bool {
        self.negations.contains(word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::lemmas::LemmaTable;
    use crate::utils::stopwords::StopwordSet;

    #[test]
    fn test_lookup() {
        let lexicon = FrenchLexicon::new();
        assert!(lexicon.score("excellent").unwrap() > 0.0);
        assert!(lexicon.score("catastrophique").unwrap() < 0.0);
        assert_eq!(lexicon.score("réseau"), None);
        assert_eq!(lexicon.intensifier("très"), Some(1.3));
        assert!(lexicon.is_negation("pas"));
    }

    #[test]
    fn test_entries_survive_normalization() {
        // Every entry must be reachable from clean text: not a stopword, already a lemma.
        let lexicon = FrenchLexicon::new();
        let stopwords = StopwordSet::french();
        let lemmas = LemmaTable::french();
        let words = lexicon
            .polarity
            .keys()
            .chain(lexicon.intensifiers.keys())
            .chain(lexicon.negations.iter());
        for word in words {
            assert!(!stopwords.contains(word), "{word} is a stopword");
            assert_eq!(lemmas.lemma(word), *word, "{word} is not a lemma");
        }
    }
}
