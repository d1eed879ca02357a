use std::collections::HashMap;

use unicode_normalization::UnicodeNormalization;

use crate::types::Card;

/// Normalize a surface form for lookup: NFC, lowercase, no punctuation
pub fn form_key(surface: &str) -> String {
    let stripped: String = surface
        .nfc()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Surface form → translation lookup for the interactive reading view
///
/// Derived from a card set and rebuilt wholesale whenever the cards change.
/// A hit is context-insensitive: the first translation seen for a form is
/// returned for every sentence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormIndex {
    entries: Vec<(String, String)>,
    lookup: HashMap<String, usize>,
}

impl FormIndex {
    /// Build the index in card × context × form order, first occurrence wins
    pub fn build(cards: &[Card]) -> Self {
        let mut index = Self::default();

        let forms = cards
            .iter()
            .flat_map(|card| card.contexts.iter())
            .flat_map(|context| context.forms.iter());

        for form in forms {
            index.insert(&form.surface_form, &form.form_translation);
        }

        index
    }

    /// Restore an index from exported entries, keeping first occurrences
    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut index = Self::default();
        for (form, translation) in entries {
            index.insert(form.as_ref(), translation.as_ref());
        }
        index
    }

    fn insert(&mut self, surface: &str, translation: &str) {
        let key = form_key(surface);
        let translation = translation.trim();
        if key.is_empty() || translation.is_empty() || self.lookup.contains_key(&key) {
            return;
        }

        self.lookup.insert(key.clone(), self.entries.len());
        self.entries.push((key, translation.to_string()));
    }

    pub fn get(&self, surface: &str) -> Option<&str> {
        self.lookup
            .get(&form_key(surface))
            .map(|&idx| self.entries[idx].1.as_str())
    }

    /// Entries in insertion order, as written to session exports
    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Build the plain map form of the index
pub fn build_index(cards: &[Card]) -> HashMap<String, String> {
    FormIndex::build(cards).entries.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Context, FormEntry};

    fn card(base: &str, sentence: &str, forms: &[(&str, &str)]) -> Card {
        Card::new(base, "").with_context(Context {
            sentence_text: sentence.to_string(),
            sentence_translation: format!("{sentence} (ru)"),
            forms: forms
                .iter()
                .map(|(s, t)| FormEntry {
                    surface_form: s.to_string(),
                    form_translation: t.to_string(),
                })
                .collect(),
        })
    }

    #[test]
    fn keys_are_case_folded_and_unpunctuated() {
        assert_eq!(form_key("  Pamostas, "), "pamostas");
        assert_eq!(form_key("«Ļoti»!"), "ļoti");
        assert_eq!(form_key("labs\n rīts."), "labs rīts");
    }

    #[test]
    fn first_occurrence_wins() {
        let cards = vec![
            card("būt", "Es esmu šeit.", &[("esmu", "есть"), ("Esmu", "являюсь")]),
            card("būt", "Viņš ir mājās.", &[("esmu", "нахожусь")]),
        ];

        let index = FormIndex::build(&cards);

        assert_eq!(index.len(), 1);
        assert_eq!(index.get("ESMU!"), Some("есть"));
        assert_eq!(index.get("ir"), None);
    }

    #[test]
    fn map_form_matches_index() {
        let cards = vec![card("iet", "Es eju.", &[("eju", "иду")])];
        let map = build_index(&cards);
        assert_eq!(map.get("eju").map(String::as_str), Some("иду"));
    }
}
