use std::collections::HashMap;
use std::path::Path;

use crate::config::ConfigError;
use crate::utils::normalization::is_target_letter;
use crate::utils::stopwords::StopwordSet;

// Inflected form -> dictionary lemma. Lemmas are never keys and never stopwords.
const FRENCH: &[(&str, &str)] = &[
    // nouns
    ("réseaux", "réseau"),
    ("connexions", "connexion"),
    ("offres", "offre"),
    ("forfaits", "forfait"),
    ("clients", "client"),
    ("cliente", "client"),
    ("clientes", "client"),
    ("services", "service"),
    ("appels", "appel"),
    ("agences", "agence"),
    ("boutiques", "boutique"),
    ("tarifs", "tarif"),
    ("promos", "promo"),
    ("abonnements", "abonnement"),
    ("problèmes", "problème"),
    ("coupures", "coupure"),
    ("réponses", "réponse"),
    ("conseillers", "conseiller"),
    ("conseillère", "conseiller"),
    ("conseillères", "conseiller"),
    ("messages", "message"),
    ("jours", "jour"),
    ("heures", "heure"),
    ("minutes", "minute"),
    ("semaines", "semaine"),
    ("crédits", "crédit"),
    ("données", "donnée"),
    ("pannes", "panne"),
    ("bugs", "bug"),
    ("lenteurs", "lenteur"),
    ("plaintes", "plainte"),
    ("recharges", "recharge"),
    ("cartes", "carte"),
    ("numéros", "numéro"),
    ("puces", "puce"),
    ("arnaques", "arnaque"),
    ("voleurs", "voleur"),
    ("mercis", "merci"),
    ("félicitation", "félicitations"),
    // adjectives
    ("excellente", "excellent"),
    ("excellents", "excellent"),
    ("excellentes", "excellent"),
    ("bonne", "bon"),
    ("bons", "bon"),
    ("bonnes", "bon"),
    ("mauvaise", "mauvais"),
    ("mauvaises", "mauvais"),
    ("lente", "lent"),
    ("lents", "lent"),
    ("lentes", "lent"),
    ("rapides", "rapide"),
    ("chère", "cher"),
    ("chers", "cher"),
    ("chères", "cher"),
    ("nulle", "nul"),
    ("nuls", "nul"),
    ("nulles", "nul"),
    ("géniale", "génial"),
    ("géniaux", "génial"),
    ("géniales", "génial"),
    ("parfaite", "parfait"),
    ("parfaits", "parfait"),
    ("parfaites", "parfait"),
    ("satisfaite", "satisfait"),
    ("satisfaits", "satisfait"),
    ("satisfaites", "satisfait"),
    ("déçue", "déçu"),
    ("déçus", "déçu"),
    ("déçues", "déçu"),
    ("horribles", "horrible"),
    ("catastrophiques", "catastrophique"),
    ("inadmissibles", "inadmissible"),
    ("inacceptables", "inacceptable"),
    ("contente", "content"),
    ("contents", "content"),
    ("contentes", "content"),
    ("heureuse", "heureux"),
    ("heureuses", "heureux"),
    ("fâchée", "fâché"),
    ("fâchés", "fâché"),
    ("fâchées", "fâché"),
    ("merveilleuse", "merveilleux"),
    ("merveilleuses", "merveilleux"),
    ("incroyables", "incroyable"),
    ("instables", "instable"),
    ("fiables", "fiable"),
    ("honteuse", "honteux"),
    ("honteuses", "honteux"),
    ("pires", "pire"),
    ("meilleure", "meilleur"),
    ("meilleurs", "meilleur"),
    ("meilleures", "meilleur"),
    ("gratuite", "gratuit"),
    ("gratuits", "gratuit"),
    ("gratuites", "gratuit"),
    ("efficaces", "efficace"),
    ("décevante", "décevant"),
    ("décevants", "décevant"),
    ("décevantes", "décevant"),
    ("scandaleuse", "scandaleux"),
    ("incompétente", "incompétent"),
    ("incompétents", "incompétent"),
    ("réactive", "réactif"),
    ("réactifs", "réactif"),
    ("professionnelle", "professionnel"),
    ("professionnels", "professionnel"),
    // verbs
    ("marche", "marcher"),
    ("marchent", "marcher"),
    ("fonctionne", "fonctionner"),
    ("fonctionnent", "fonctionner"),
    ("coupe", "couper"),
    ("coupé", "couper"),
    ("coupée", "couper"),
    ("coupent", "couper"),
    ("aime", "aimer"),
    ("aimons", "aimer"),
    ("adore", "adorer"),
    ("adorons", "adorer"),
    ("déteste", "détester"),
    ("remercie", "remercier"),
    ("remercions", "remercier"),
    ("recommande", "recommander"),
    ("répond", "répondre"),
    ("répondent", "répondre"),
    ("payé", "payer"),
    ("paye", "payer"),
    ("paie", "payer"),
    ("rembourse", "rembourser"),
    ("remboursé", "rembourser"),
];

/// Fixed form -> lemma table. Unknown words are their own lemma.
#[derive(Debug, Clone, Default)]
pub struct LemmaTable {
    forms: HashMap<String, String>,
}

impl LemmaTable {
    pub fn french() -> Self {
        Self {
            forms: FRENCH
                .iter()
                .map(|(form, lemma)| (form.to_string(), lemma.to_string()))
                .collect(),
        }
    }

    /// Parses `form<TAB>lemma` lines; blank lines and `#` comments are skipped.
    pub fn from_tsv(content: &str) -> Result<Self, ConfigError> {
        let mut forms = HashMap::new();
        for (idx, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (form, lemma) = line.split_once('\t').ok_or_else(|| {
                ConfigError::Resource(
                    "lemmas".into(),
                    format!("line {}: expected form<TAB>lemma", idx + 1),
                )
            })?;
            forms.insert(form.trim().to_lowercase(), lemma.trim().to_lowercase());
        }
        Ok(Self { forms })
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Resource(path.display().to_string(), e.to_string()))?;
        Self::from_tsv(&content)
    }

    pub fn lemma<'a>(&'a self, word: &'a str) -> &'a str {
        self.forms.get(word).map(String::as_str).unwrap_or(word)
    }

    pub fn len(&self) -> usize {
        self.forms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forms.is_empty()
    }

    /// Checks the properties normalization idempotence depends on: every lemma is a
    /// single lowercase target-alphabet word, maps to itself, and is not a stopword.
    pub fn validate(&self, stopwords: &StopwordSet) -> Result<(), ConfigError> {
        for (form, lemma) in &self.forms {
            let well_formed = !lemma.is_empty()
                && lemma.chars().all(|c| is_target_letter(c) && !c.is_uppercase());
            if !well_formed {
                return Err(ConfigError::Resource(
                    "lemmas".into(),
                    format!("lemma '{lemma}' of '{form}' is not a lowercase target-alphabet word"),
                ));
            }
            if stopwords.contains(lemma) {
                return Err(ConfigError::Resource(
                    "lemmas".into(),
                    format!("lemma '{lemma}' of '{form}' is a stopword"),
                ));
            }
            if self.lemma(lemma) != lemma {
                return Err(ConfigError::Resource(
                    "lemmas".into(),
                    format!("lemma '{lemma}' of '{form}' maps further to '{}'", self.lemma(lemma)),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_table_is_closed() {
        let table = LemmaTable::french();
        assert!(table.validate(&StopwordSet::french()).is_ok());
    }

    #[test]
    fn test_lookup() {
        let table = LemmaTable::french();
        assert_eq!(table.lemma("réseaux"), "réseau");
        assert_eq!(table.lemma("excellente"), "excellent");
        assert_eq!(table.lemma("réseau"), "réseau");
        assert_eq!(table.lemma("inconnu"), "inconnu");
    }

    #[test]
    fn test_chained_lemmas_rejected() {
        let table = LemmaTable::from_tsv("chats\tchat\nchat\tfélin\n").unwrap();
        assert!(table.validate(&StopwordSet::french()).is_err());
    }

    #[test]
    fn test_stopword_lemma_rejected() {
        let table = LemmaTable::from_tsv("les\tle\n").unwrap();
        assert!(table.validate(&StopwordSet::french()).is_err());
    }

    #[test]
    fn test_malformed_line_rejected() {
        assert!(LemmaTable::from_tsv("chats chat\n").is_err());
    }
}
