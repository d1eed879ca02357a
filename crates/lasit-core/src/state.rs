use crate::index::{FormIndex, form_key};
use crate::merge::merge;
use crate::types::Card;

/// Canonical card set with its derived form index
///
/// Every mutation re-merges where needed and rebuilds the index, so the two
/// never drift apart. Cards are addressed by base form.
#[derive(Debug, Clone, Default)]
pub struct CardSet {
    cards: Vec<Card>,
    index: FormIndex,
}

impl CardSet {
    pub fn from_cards(cards: Vec<Card>) -> Self {
        let cards = merge(cards);
        let index = FormIndex::build(&cards);
        Self { cards, index }
    }

    pub(crate) fn from_parts(cards: Vec<Card>, index: FormIndex) -> Self {
        Self { cards, index }
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn index(&self) -> &FormIndex {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn get(&self, base_form: &str) -> Option<&Card> {
        let base_form = base_form.trim();
        self.cards.iter().find(|card| card.base_form == base_form)
    }

    fn position(&self, base_form: &str) -> Option<usize> {
        let base_form = base_form.trim();
        self.cards.iter().position(|card| card.base_form == base_form)
    }

    fn reindex(&mut self) {
        self.index = FormIndex::build(&self.cards);
    }

    /// Merge newly normalized cards into the set
    pub fn add(&mut self, incoming: Vec<Card>) {
        let existing = std::mem::take(&mut self.cards);
        self.cards = merge(existing.into_iter().chain(incoming));
        self.reindex();
    }

    /// Insert an error placeholder for a chunk that could not be processed
    pub fn add_placeholder(&mut self, chunk_text: &str, user_message: &str) {
        self.add(vec![Card::error_placeholder(chunk_text, user_message)]);
    }

    /// Drop the placeholder of a chunk once it has been reprocessed
    pub fn remove_placeholder(&mut self, chunk_text: &str) -> bool {
        match self.position(chunk_text) {
            Some(idx) if self.cards[idx].needs_reprocessing => {
                self.cards.remove(idx);
                self.reindex();
                true
            }
            _ => false,
        }
    }

    /// Rename a card; renaming onto an existing base form merges the two
    pub fn edit_base_form(&mut self, base_form: &str, new_base_form: &str) -> bool {
        let new_base_form = new_base_form.trim();
        if new_base_form.is_empty() {
            return false;
        }

        let Some(idx) = self.position(base_form) else {
            return false;
        };

        self.cards[idx].base_form = new_base_form.to_string();
        self.cards = merge(std::mem::take(&mut self.cards));
        self.reindex();
        true
    }

    pub fn edit_base_translation(&mut self, base_form: &str, translation: &str) -> bool {
        let Some(idx) = self.position(base_form) else {
            return false;
        };

        self.cards[idx].base_translation = translation.trim().to_string();
        true
    }

    /// Flip visibility, returning the new state
    pub fn toggle_visibility(&mut self, base_form: &str) -> Option<bool> {
        let idx = self.position(base_form)?;
        let card = &mut self.cards[idx];
        card.visible = !card.visible;
        Some(card.visible)
    }

    pub fn remove(&mut self, base_form: &str) -> Option<Card> {
        let idx = self.position(base_form)?;
        let card = self.cards.remove(idx);
        self.reindex();
        Some(card)
    }

    pub fn clear(&mut self) {
        self.cards.clear();
        self.index = FormIndex::default();
    }

    pub fn visible(&self) -> impl Iterator<Item = &Card> {
        self.cards.iter().filter(|card| card.visible)
    }

    pub fn needing_reprocessing(&self) -> impl Iterator<Item = &Card> {
        self.cards.iter().filter(|card| card.needs_reprocessing)
    }

    /// Translation for a surface form: index hit first, then a base form match
    pub fn lookup_translation(&self, surface: &str) -> Option<&str> {
        if let Some(translation) = self.index.get(surface) {
            return Some(translation);
        }

        let key = form_key(surface);
        self.cards
            .iter()
            .find(|card| form_key(&card.base_form) == key && !card.base_translation.is_empty())
            .map(|card| card.base_translation.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Context, FormEntry};

    fn card(base: &str, translation: &str, surface: &str, form_translation: &str) -> Card {
        Card::new(base, translation).with_context(Context {
            sentence_text: format!("{surface} teikumā."),
            sentence_translation: format!("{form_translation} в предложении."),
            forms: vec![FormEntry {
                surface_form: surface.to_string(),
                form_translation: form_translation.to_string(),
            }],
        })
    }

    #[test]
    fn renaming_onto_existing_card_merges() {
        let mut set = CardSet::from_cards(vec![
            card("skriet", "бежать", "skrien", "бежит"),
            card("skrit", "", "skrēja", "бежал"),
        ]);

        assert!(set.edit_base_form("skrit", "skriet"));

        assert_eq!(set.len(), 1);
        assert_eq!(set.cards()[0].contexts.len(), 2);
        assert_eq!(set.index().get("skrēja"), Some("бежал"));
    }

    #[test]
    fn placeholder_lifecycle() {
        let mut set = CardSet::default();
        set.add_placeholder("Anna pamostas agri.", "Network error");
        assert_eq!(set.needing_reprocessing().count(), 1);

        set.add(vec![card(
            "pamosties",
            "просыпаться",
            "pamostas",
            "просыпается",
        )]);
        assert!(set.remove_placeholder("Anna pamostas agri."));
        assert!(!set.remove_placeholder("pamosties"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn lookup_falls_back_to_base_translation() {
        let mut set = CardSet::from_cards(vec![card("iet", "идти", "eju", "иду")]);

        assert_eq!(set.lookup_translation("Eju"), Some("иду"));
        assert_eq!(set.lookup_translation("iet"), Some("идти"));
        assert_eq!(set.lookup_translation("nav"), None);

        assert_eq!(set.toggle_visibility("iet"), Some(false));
        assert_eq!(set.visible().count(), 0);
        assert!(set.remove("iet").is_some());
        assert!(set.index().is_empty());
    }
}
