//! Conversion of untrusted model output into canonical cards.
//!
//! The model answers in one of three shapes:
//! - nested: `{unit, base_form, base_translation, contexts}`, each context
//!   `{latvian, russian, forms: [{form, translation}]}`
//! - flat: `{front, back, base_form, original_phrase, phrase_translation}` plus
//!   `text_forms` and `word_form_translation(s)`
//! - minimal: `{base_form, original_phrase, phrase_translation}`
//!
//! Each shape has its own extraction path and all of them produce [`Card`] and
//! [`Context`] values. Nothing downstream ever sees the raw shapes.

use serde_json::{Map, Value};

use crate::error::{NormalizeError, ParseError};
use crate::types::{Card, Context, FormEntry, Unit};

const SENTENCE_KEYS: &[&str] = &["latvian", "sentence_text", "sentenceText", "original_phrase"];
const SENTENCE_TRANSLATION_KEYS: &[&str] = &[
    "russian",
    "sentence_translation",
    "sentenceTranslation",
    "phrase_translation",
];
const NESTED_KEYS: &[&str] = &[
    "contexts",
    "base_form",
    "baseForm",
    "base_translation",
    "baseTranslation",
    "unit",
];
const FORM_KEYS: &[&str] = &["form", "surface_form", "surfaceForm"];
const FORM_TRANSLATION_KEYS: &[&str] = &["translation", "form_translation", "formTranslation"];

/// Schema variant detected on a raw card
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawShape {
    Nested,
    Flat,
    Minimal,
}

/// Cards recovered from one model response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelOutput {
    pub cards: Vec<Card>,
    /// Full translation of the chunk, when the model supplied one
    pub translation: Option<String>,
}

/// Trim and collapse all whitespace runs (newlines included) into single spaces
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Pick the first key holding a string that is non-empty after cleaning
fn text_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| obj.get(*key).and_then(Value::as_str))
        .map(clean_text)
        .find(|text| !text.is_empty())
}

fn bool_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<bool> {
    keys.iter().find_map(|key| obj.get(*key).and_then(Value::as_bool))
}

fn form_entry(surface: &str, translation: &str) -> Option<FormEntry> {
    let surface_form = clean_text(surface);
    let form_translation = clean_text(translation);

    if surface_form.is_empty() || form_translation.is_empty() {
        return None;
    }

    Some(FormEntry {
        surface_form,
        form_translation,
    })
}

fn context(
    sentence: Option<String>,
    translation: Option<String>,
    forms: Vec<FormEntry>,
) -> Option<Context> {
    match (sentence, translation) {
        (Some(sentence_text), Some(sentence_translation)) => Some(Context {
            sentence_text,
            sentence_translation,
            forms,
        }),
        (sentence, translation) => {
            tracing::debug!(
                "Dropping context: sentence={:?} translation={:?}",
                sentence,
                translation
            );
            None
        }
    }
}

/// Inspect a raw card and decide which extraction path applies
pub fn detect_shape(raw: &Map<String, Value>) -> Option<RawShape> {
    if raw.get("contexts").is_some_and(Value::is_array) {
        return Some(RawShape::Nested);
    }

    if ["front", "back", "text_forms"].iter().any(|key| raw.contains_key(*key)) {
        return Some(RawShape::Flat);
    }

    if raw.contains_key("original_phrase") || raw.contains_key("phrase_translation") {
        return Some(RawShape::Minimal);
    }

    // new-schema card whose contexts are missing or null
    if NESTED_KEYS.iter().any(|key| raw.contains_key(*key)) {
        return Some(RawShape::Nested);
    }

    None
}

fn nested_contexts(raw: &Map<String, Value>, fallback_sentence: Option<&str>) -> Vec<Context> {
    let Some(contexts) = raw.get("contexts").and_then(Value::as_array) else {
        return Vec::new();
    };

    contexts
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|ctx| {
            let sentence = text_field(ctx, SENTENCE_KEYS)
                .or_else(|| fallback_sentence.map(clean_text).filter(|s| !s.is_empty()));
            let translation = text_field(ctx, SENTENCE_TRANSLATION_KEYS);

            let forms = ctx
                .get("forms")
                .and_then(Value::as_array)
                .map(|forms| {
                    forms
                        .iter()
                        .filter_map(Value::as_object)
                        .filter_map(|form| {
                            form_entry(
                                &text_field(form, FORM_KEYS).unwrap_or_default(),
                                &text_field(form, FORM_TRANSLATION_KEYS).unwrap_or_default(),
                            )
                        })
                        .collect()
                })
                .unwrap_or_default();

            context(sentence, translation, forms)
        })
        .collect()
}

/// Surface forms of a legacy card paired with their translations
fn flat_forms(raw: &Map<String, Value>) -> Vec<FormEntry> {
    let shared_translation = text_field(raw, &["word_form_translation", "back"]);
    let per_form: Vec<String> = raw
        .get("word_form_translations")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| item.as_str().map(clean_text).unwrap_or_default())
                .collect()
        })
        .unwrap_or_default();

    let surfaces: Vec<String> = match raw.get("text_forms").and_then(Value::as_array) {
        Some(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(clean_text)
            .collect(),
        None => text_field(raw, &["front"]).into_iter().collect(),
    };

    surfaces
        .iter()
        .enumerate()
        .filter_map(|(i, surface)| {
            let translation = per_form
                .get(i)
                .filter(|t| !t.is_empty())
                .or(shared_translation.as_ref())?;
            form_entry(surface, translation)
        })
        .collect()
}

fn flat_contexts(
    raw: &Map<String, Value>,
    fallback_sentence: Option<&str>,
    with_forms: bool,
) -> Vec<Context> {
    let sentence = text_field(raw, &["original_phrase"])
        .or_else(|| fallback_sentence.map(clean_text).filter(|s| !s.is_empty()));
    let translation = text_field(raw, &["phrase_translation"]);
    let forms = if with_forms { flat_forms(raw) } else { Vec::new() };

    context(sentence, translation, forms).into_iter().collect()
}

/// Extract the validated contexts of one raw card
pub fn normalize_contexts(raw: &Value, fallback_sentence: Option<&str>) -> Vec<Context> {
    let Some(obj) = raw.as_object() else {
        return Vec::new();
    };

    match detect_shape(obj) {
        Some(RawShape::Nested) => nested_contexts(obj, fallback_sentence),
        Some(RawShape::Flat) => flat_contexts(obj, fallback_sentence, true),
        Some(RawShape::Minimal) => {
            // text_forms without front/back still count as forms here
            let with_forms = obj.contains_key("text_forms");
            flat_contexts(obj, fallback_sentence, with_forms)
        }
        None => Vec::new(),
    }
}

/// Convert one raw card into a canonical card
pub fn normalize_card(
    raw: &Value,
    fallback_sentence: Option<&str>,
) -> Result<Card, NormalizeError> {
    let obj = raw.as_object().ok_or(NormalizeError::NotAnObject)?;
    let shape = detect_shape(obj).ok_or(NormalizeError::UnrecognizedShape)?;

    let base_form = match shape {
        RawShape::Flat => text_field(obj, &["base_form", "baseForm", "front"]),
        RawShape::Nested | RawShape::Minimal => text_field(obj, &["base_form", "baseForm"]),
    }
    .ok_or(NormalizeError::MissingBaseForm)?;

    let base_translation = text_field(
        obj,
        &["base_translation", "baseTranslation", "back", "word_form_translation"],
    )
    .unwrap_or_default();

    let contexts = normalize_contexts(raw, fallback_sentence);
    if contexts.is_empty() && base_translation.is_empty() {
        return Err(NormalizeError::Empty(base_form));
    }

    let unit = obj
        .get("unit")
        .and_then(Value::as_str)
        .and_then(Unit::parse)
        .unwrap_or_else(|| Unit::infer(&base_form));

    Ok(Card {
        unit,
        base_form,
        base_translation,
        contexts,
        visible: bool_field(obj, &["visible"]).unwrap_or(true),
        needs_reprocessing: bool_field(obj, &["needsReprocessing", "needs_reprocessing"])
            .unwrap_or(false),
    })
}

/// Normalize a list of raw cards, dropping the unusable ones with a warning
pub fn normalize_cards(raw_cards: &[Value], fallback_sentence: Option<&str>) -> Vec<Card> {
    raw_cards
        .iter()
        .enumerate()
        .filter_map(|(i, raw)| match normalize_card(raw, fallback_sentence) {
            Ok(card) => Some(card),
            Err(e) => {
                tracing::warn!("Dropping raw card #{}: {}", i, e);
                None
            }
        })
        .collect()
}

/// Parse JSON that a model wrapped in prose or markdown fences
pub fn parse_embedded_json(text: &str) -> Result<Value, ParseError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ParseError::EmptyResponse);
    }

    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|rest| rest.trim_end().trim_end_matches("```").trim())
        .unwrap_or(trimmed);

    match serde_json::from_str(unfenced) {
        Ok(value) => Ok(value),
        Err(e) => {
            let start = unfenced.find(['{', '[']);
            let end = unfenced.rfind(['}', ']']);
            match (start, end) {
                (Some(start), Some(end)) if end > start => {
                    serde_json::from_str(&unfenced[start..=end]).map_err(ParseError::from)
                }
                _ => Err(ParseError::Json(e)),
            }
        }
    }
}

/// Locate the card payload inside an upstream message envelope
///
/// Prefers a `tool_use` block's `input`, then the first `text` block parsed as
/// JSON. Values without a `content` array are treated as the payload itself.
pub fn extract_payload(value: &Value) -> Result<Value, ParseError> {
    let Some(blocks) = value.get("content").and_then(Value::as_array) else {
        return Ok(value.clone());
    };

    if let Some(input) = blocks
        .iter()
        .find(|block| block.get("type").and_then(Value::as_str) == Some("tool_use"))
        .and_then(|block| block.get("input"))
    {
        return Ok(input.clone());
    }

    let text = blocks
        .iter()
        .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
        .find_map(|block| block.get("text").and_then(Value::as_str))
        .ok_or(ParseError::MissingCards)?;

    parse_embedded_json(text)
}

/// Parse an already-decoded model response
pub fn parse_model_value(
    value: &Value,
    fallback_sentence: Option<&str>,
) -> Result<ModelOutput, ParseError> {
    let payload = extract_payload(value)?;

    let (raw_cards, translation) = match &payload {
        Value::Array(items) => (items, None),
        Value::Object(obj) => {
            let items = ["flashcards", "cards"]
                .iter()
                .find_map(|key| obj.get(*key).and_then(Value::as_array))
                .ok_or(ParseError::MissingCards)?;
            (items, text_field(obj, &["translation"]))
        }
        _ => return Err(ParseError::MissingCards),
    };

    let cards = normalize_cards(raw_cards, fallback_sentence);
    tracing::debug!(
        "Normalized {} of {} raw cards",
        cards.len(),
        raw_cards.len()
    );

    Ok(ModelOutput { cards, translation })
}

/// Parse a raw response body
pub fn try_parse_model_output(
    raw: &str,
    fallback_sentence: Option<&str>,
) -> Result<ModelOutput, ParseError> {
    if raw.trim().is_empty() {
        return Err(ParseError::EmptyResponse);
    }

    let value: Value = serde_json::from_str(raw)?;
    parse_model_value(&value, fallback_sentence)
}

/// Lossy variant of [`try_parse_model_output`]
///
/// Any failure yields an empty list; callers must treat an empty result as an
/// error rather than as a response with no vocabulary.
pub fn parse_model_output(raw: &str) -> Vec<Card> {
    match try_parse_model_output(raw, None) {
        Ok(output) => output.cards,
        Err(e) => {
            tracing::warn!("Failed to parse model output: {}", e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn nested_schema_yields_one_card_one_context_one_form() {
        let raw = json!({
            "flashcards": [{
                "unit": "word",
                "base_form": "pamosties",
                "base_translation": "вставать",
                "contexts": [{
                    "latvian": "Anna pamostas agri.",
                    "russian": "Анна встает рано.",
                    "forms": [{"form": "pamostas", "translation": "встает"}]
                }]
            }]
        });

        let cards = parse_model_output(&raw.to_string());

        assert_eq!(cards.len(), 1);
        let card = &cards[0];
        assert_eq!(card.base_form, "pamosties");
        assert_eq!(card.base_translation, "вставать");
        assert_eq!(card.unit, Unit::Word);
        assert!(card.visible);
        assert_eq!(card.contexts.len(), 1);
        assert_eq!(card.contexts[0].sentence_text, "Anna pamostas agri.");
        assert_eq!(card.contexts[0].forms.len(), 1);
        assert_eq!(card.contexts[0].forms[0].surface_form, "pamostas");
        assert_eq!(card.contexts[0].forms[0].form_translation, "встает");
    }

    #[test]
    fn flat_schema_pairs_forms_with_translations() {
        let raw = json!({
            "front": "skrien",
            "back": "бежать",
            "base_form": "skriet",
            "original_phrase": "Viņš skrien\nuz mājām.",
            "phrase_translation": "Он бежит домой.",
            "text_forms": ["skrien", "skrēja"],
            "word_form_translations": ["бежит", ""]
        });

        let card = normalize_card(&raw, None).unwrap();

        assert_eq!(card.base_form, "skriet");
        assert_eq!(card.base_translation, "бежать");
        assert_eq!(card.contexts.len(), 1);
        assert_eq!(card.contexts[0].sentence_text, "Viņš skrien uz mājām.");
        let forms = &card.contexts[0].forms;
        assert_eq!(forms.len(), 2);
        assert_eq!(forms[0].form_translation, "бежит");
        // empty per-form translation falls back to the card translation
        assert_eq!(forms[1].form_translation, "бежать");
    }

    #[test]
    fn minimal_schema_uses_fallback_sentence() {
        let raw = json!({
            "base_form": "labdien",
            "base_translation": "добрый день",
            "phrase_translation": "Добрый день!"
        });

        assert_eq!(detect_shape(raw.as_object().unwrap()), Some(RawShape::Minimal));

        let contexts = normalize_contexts(&raw, Some("  Labdien! "));
        assert_eq!(contexts.len(), 1);
        assert_eq!(contexts[0].sentence_text, "Labdien!");
        assert!(contexts[0].forms.is_empty());
    }

    #[test]
    fn drops_blank_contexts_and_forms() {
        let raw = json!({
            "base_form": "māja",
            "base_translation": "дом",
            "contexts": [
                {"latvian": "   ", "russian": "Дом.", "forms": []},
                {"latvian": "Tā ir māja.", "russian": "Это дом.", "forms": [
                    {"form": "māja", "translation": "  "},
                    {"form": "māja", "translation": "дом"}
                ]}
            ]
        });

        let card = normalize_card(&raw, None).unwrap();

        assert_eq!(card.contexts.len(), 1);
        assert_eq!(card.contexts[0].forms.len(), 1);
    }

    #[test]
    fn card_without_base_form_is_dropped() {
        let raws = vec![
            json!({"base_translation": "нет", "contexts": []}),
            json!({"base_form": "jā", "base_translation": "да", "contexts": []}),
        ];

        let cards = normalize_cards(&raws, None);

        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].base_form, "jā");
        assert_eq!(
            normalize_card(&raws[0], None),
            Err(NormalizeError::MissingBaseForm)
        );
    }

    #[test]
    fn unit_inferred_from_whitespace() {
        let raw = json!({
            "base_form": "labs rīts",
            "base_translation": "доброе утро",
            "contexts": []
        });
        assert_eq!(normalize_card(&raw, None).unwrap().unit, Unit::Phrase);

        let raw = json!({"base_form": "rīts", "base_translation": "утро", "contexts": []});
        assert_eq!(normalize_card(&raw, None).unwrap().unit, Unit::Word);
    }

    #[test]
    fn nested_card_without_contexts_keeps_its_translation() {
        let raws = vec![
            json!({"unit": "word", "base_form": "suns", "base_translation": "собака"}),
            json!({
                "unit": "word",
                "base_form": "kaķis",
                "base_translation": "кошка",
                "contexts": null
            }),
        ];

        assert_eq!(detect_shape(raws[1].as_object().unwrap()), Some(RawShape::Nested));

        let cards = normalize_cards(&raws, Some("Suns un kaķis."));
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].base_translation, "собака");
        assert!(cards[0].contexts.is_empty());
        assert_eq!(cards[1].base_form, "kaķis");
    }

    #[test]
    fn object_without_card_keys_is_unrecognized() {
        let raw = json!({"word": "suns"});
        assert_eq!(normalize_card(&raw, None), Err(NormalizeError::UnrecognizedShape));
    }

    #[test]
    fn malformed_json_yields_empty_list() {
        assert!(parse_model_output("{\"flashcards\": [").is_empty());
        assert!(parse_model_output("").is_empty());
        assert!(matches!(
            try_parse_model_output("   ", None),
            Err(ParseError::EmptyResponse)
        ));
    }

    #[test]
    fn reads_tool_use_and_fenced_text_envelopes() {
        let tool_use = json!({
            "type": "message",
            "content": [{
                "type": "tool_use",
                "name": "create_flashcards",
                "input": {"flashcards": [
                    {"base_form": "suns", "base_translation": "собака", "contexts": []}
                ]}
            }]
        });
        let cards = parse_model_value(&tool_use, None).unwrap().cards;
        assert_eq!(cards[0].base_form, "suns");

        let inner = json!({
            "flashcards": [{"base_form": "kaķis", "base_translation": "кошка", "contexts": []}],
            "translation": "Кошка."
        });
        let text = json!({
            "content": [{"type": "text", "text": format!("```json\n{inner}\n```")}]
        });
        let output = parse_model_value(&text, None).unwrap();
        assert_eq!(output.cards[0].base_form, "kaķis");
        assert_eq!(output.translation.as_deref(), Some("Кошка."));
    }

    #[test]
    fn text_envelope_without_json_is_an_error() {
        let text = json!({"content": [{"type": "text", "text": "Sorry, I cannot help."}]});
        assert!(parse_model_value(&text, None).is_err());
    }
}
