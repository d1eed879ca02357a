use serde::{Deserialize, Serialize};

fn default_visible() -> bool {
    true
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Whether a card holds a single word or a multi-word expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Word,
    Phrase,
}

impl Unit {
    /// Infer the unit from the base form: anything with whitespace is a phrase
    pub fn infer(base_form: &str) -> Self {
        if base_form.trim().contains(char::is_whitespace) {
            Unit::Phrase
        } else {
            Unit::Word
        }
    }

    /// Parse the model's `unit` field, `None` for anything unrecognized
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "word" => Some(Unit::Word),
            "phrase" => Some(Unit::Phrase),
            _ => None,
        }
    }
}

/// A surface form as it appeared in a sentence, with its translation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormEntry {
    pub surface_form: String,
    pub form_translation: String,
}

/// One attested usage of a base form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Context {
    pub sentence_text: String,
    pub sentence_translation: String,
    #[serde(default)]
    pub forms: Vec<FormEntry>,
}

impl Context {
    /// Key used to deduplicate contexts during merge
    pub fn sentence_key(&self) -> (&str, &str) {
        (&self.sentence_text, &self.sentence_translation)
    }
}

/// Canonical flashcard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub unit: Unit,
    pub base_form: String,
    pub base_translation: String,
    #[serde(default)]
    pub contexts: Vec<Context>,
    #[serde(default = "default_visible")]
    pub visible: bool,
    /// Marks an error placeholder or an entry that should be verified
    #[serde(default, skip_serializing_if = "is_false")]
    pub needs_reprocessing: bool,
}

impl Card {
    pub fn new(base_form: impl Into<String>, base_translation: impl Into<String>) -> Self {
        let base_form = base_form.into();
        Self {
            unit: Unit::infer(&base_form),
            base_form,
            base_translation: base_translation.into(),
            contexts: Vec::new(),
            visible: true,
            needs_reprocessing: false,
        }
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.contexts.push(context);
        self
    }

    /// Placeholder shown in place of a chunk whose request ultimately failed
    pub fn error_placeholder(chunk_text: &str, user_message: &str) -> Self {
        let mut card = Card::new(chunk_text.trim(), user_message);
        card.unit = Unit::Phrase;
        card.needs_reprocessing = true;
        card
    }
}
