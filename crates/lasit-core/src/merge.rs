use std::collections::HashMap;

use crate::types::{Card, Context};

/// Accumulates the contributors of one base form
struct MergeGroup {
    card: Card,
    any_visible: bool,
    seen_contexts: HashMap<(String, String), usize>,
}

impl MergeGroup {
    fn new(base_form: String, first: &Card) -> Self {
        Self {
            card: Card {
                unit: first.unit,
                base_form,
                base_translation: String::new(),
                contexts: Vec::new(),
                visible: true,
                needs_reprocessing: false,
            },
            any_visible: false,
            seen_contexts: HashMap::new(),
        }
    }

    fn absorb(&mut self, card: Card) {
        if self.card.base_translation.is_empty() {
            let translation = card.base_translation.trim();
            if !translation.is_empty() {
                self.card.base_translation = translation.to_string();
            }
        }

        self.any_visible |= card.visible;
        self.card.needs_reprocessing |= card.needs_reprocessing;

        for context in card.contexts {
            self.absorb_context(context);
        }
    }

    fn absorb_context(&mut self, context: Context) {
        let (sentence, translation) = context.sentence_key();
        let key = (sentence.to_string(), translation.to_string());

        match self.seen_contexts.get(&key) {
            Some(&idx) => {
                // same sentence from an overlapping chunk: keep one context, union the forms
                let existing = &mut self.card.contexts[idx];
                for form in context.forms {
                    if !existing.forms.contains(&form) {
                        existing.forms.push(form);
                    }
                }
            }
            None => {
                self.seen_contexts.insert(key, self.card.contexts.len());
                self.card.contexts.push(context);
            }
        }
    }

    fn finish(mut self) -> Card {
        self.card.visible = self.any_visible;
        self.card
    }
}

/// Merge cards sharing a base form into one card per base form
///
/// Groups keep the order in which their base form first appeared. Within a
/// group the first non-empty translation wins, contexts are deduplicated by
/// sentence pair, the card is hidden only when every contributor is hidden,
/// and `needs_reprocessing` is set when any contributor sets it.
pub fn merge(cards: impl IntoIterator<Item = Card>) -> Vec<Card> {
    let mut groups: Vec<MergeGroup> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for card in cards {
        let base_form = card.base_form.trim().to_string();
        if base_form.is_empty() {
            tracing::warn!("Skipping card with empty base form during merge");
            continue;
        }

        let idx = match index.get(&base_form) {
            Some(&idx) => idx,
            None => {
                let idx = groups.len();
                groups.push(MergeGroup::new(base_form.clone(), &card));
                index.insert(base_form, idx);
                idx
            }
        };

        groups[idx].absorb(card);
    }

    groups.into_iter().map(MergeGroup::finish).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FormEntry, Unit};

    fn ctx(sentence: &str, translation: &str, forms: &[(&str, &str)]) -> Context {
        Context {
            sentence_text: sentence.to_string(),
            sentence_translation: translation.to_string(),
            forms: forms
                .iter()
                .map(|(surface, translation)| FormEntry {
                    surface_form: surface.to_string(),
                    form_translation: translation.to_string(),
                })
                .collect(),
        }
    }

    fn sample() -> Vec<Card> {
        vec![
            Card::new("skriet", "бежать").with_context(ctx(
                "Viņš skrien.",
                "Он бежит.",
                &[("skrien", "бежит")],
            )),
            Card::new("māja", "").with_context(ctx("Tā ir māja.", "Это дом.", &[])),
            Card::new(" skriet ", "бегать").with_context(ctx(
                "Mēs skrējām.",
                "Мы бежали.",
                &[("skrējām", "бежали")],
            )),
            Card::new("māja", "дом"),
        ]
    }

    #[test]
    fn identical_contexts_collapse_to_one() {
        let a = ctx("Viņš skrien.", "Он бежит.", &[("skrien", "бежит")]);
        let cards = vec![
            Card::new("skriet", "бежать").with_context(a.clone()),
            Card::new("skriet", "бежать").with_context(a),
        ];

        let merged = merge(cards);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].contexts.len(), 1);
        assert_eq!(merged[0].contexts[0].forms.len(), 1);
    }

    #[test]
    fn groups_by_trimmed_base_form_in_first_seen_order() {
        let merged = merge(sample());

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].base_form, "skriet");
        assert_eq!(merged[0].base_translation, "бежать");
        assert_eq!(merged[0].contexts.len(), 2);
        assert_eq!(merged[1].base_form, "māja");
        // first non-empty translation, even when it arrives later
        assert_eq!(merged[1].base_translation, "дом");
        assert_eq!(merged[1].unit, Unit::Word);
    }

    #[test]
    fn merge_is_idempotent() {
        let once = merge(sample());
        let twice = merge(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn merge_is_idempotent_with_mixed_flags_and_duplicates() {
        let shared = ctx("Es lasu.", "Я читаю.", &[("lasu", "читаю")]);

        let mut hidden = Card::new("lasīt", "читать").with_context(shared.clone());
        hidden.visible = false;
        let mut flagged = Card::new("lasīt", "").with_context(ctx(
            "Es lasu.",
            "Я читаю.",
            &[("Es lasu", "я читаю")],
        ));
        flagged.needs_reprocessing = true;
        let mut all_hidden = Card::new("rakstīt", "писать");
        all_hidden.visible = false;

        let cards = vec![
            hidden,
            Card::new("lasīt", "читать").with_context(shared),
            flagged,
            all_hidden.clone(),
            all_hidden,
        ];

        let once = merge(cards);
        let twice = merge(once.clone());

        assert_eq!(once, twice);
        assert_eq!(once.len(), 2);
        assert!(once[0].visible);
        assert!(once[0].needs_reprocessing);
        assert_eq!(once[0].base_translation, "читать");
        assert_eq!(once[0].contexts.len(), 1);
        assert_eq!(once[0].contexts[0].forms.len(), 2);
        assert!(!once[1].visible);
        assert!(!once[1].needs_reprocessing);
    }

    #[test]
    fn reprocessing_flag_is_sticky_in_any_order() {
        let mut flagged = Card::new("ēst", "Upstream unavailable");
        flagged.needs_reprocessing = true;
        let ok = Card::new("ēst", "есть");

        let forward = merge(vec![flagged.clone(), ok.clone()]);
        let backward = merge(vec![ok, flagged]);

        assert!(forward[0].needs_reprocessing);
        assert!(backward[0].needs_reprocessing);
    }

    #[test]
    fn hidden_only_when_all_contributors_hidden() {
        let mut hidden = Card::new("iet", "идти");
        hidden.visible = false;
        let shown = Card::new("iet", "идти");

        assert!(merge(vec![hidden.clone(), shown])[0].visible);
        assert!(!merge(vec![hidden.clone(), hidden])[0].visible);
    }

    #[test]
    fn overlapping_contexts_union_their_forms() {
        let cards = vec![
            Card::new("lasīt", "читать").with_context(ctx(
                "Es lasu.",
                "Я читаю.",
                &[("lasu", "читаю")],
            )),
            Card::new("lasīt", "читать").with_context(ctx(
                "Es lasu.",
                "Я читаю.",
                &[("lasu", "читаю"), ("Es lasu", "я читаю")],
            )),
        ];

        let merged = merge(cards);

        assert_eq!(merged[0].contexts.len(), 1);
        assert_eq!(merged[0].contexts[0].forms.len(), 2);
    }
}
