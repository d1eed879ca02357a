use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::index::FormIndex;
use crate::state::CardSet;
use crate::types::Card;

pub const SESSION_VERSION: &str = "2.0";

/// Saved state of a full session: input, cards, translation and form index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionExport {
    pub input_text: String,
    pub cards: Vec<Card>,
    #[serde(default)]
    pub translation_text: String,
    #[serde(default)]
    pub form_translation_entries: Vec<(String, String)>,
    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
    pub version: String,
}

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

impl SessionExport {
    pub fn new(input_text: &str, cards: &CardSet, translation_text: &str) -> Self {
        Self {
            input_text: input_text.to_string(),
            cards: cards.cards().to_vec(),
            translation_text: translation_text.to_string(),
            form_translation_entries: cards.index().entries().to_vec(),
            timestamp: now_millis(),
            version: SESSION_VERSION.to_string(),
        }
    }

    /// Restore the card set; the form index is rebuilt from the saved entries
    pub fn card_set(&self) -> CardSet {
        let index = if self.form_translation_entries.is_empty() {
            FormIndex::build(&self.cards)
        } else {
            FormIndex::from_entries(self.form_translation_entries.iter().cloned())
        };
        CardSet::from_parts(self.cards.clone(), index)
    }

    pub fn save(&self, path: &Path) -> Result<(), SessionError> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        tracing::info!("Saved session with {} cards to {}", self.cards.len(), path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, SessionError> {
        let data = fs::read_to_string(path)?;
        let session: SessionExport = serde_json::from_str(&data)?;

        // 1.x files share the card layout, anything else is refused
        if !session.version.starts_with("1.") && !session.version.starts_with("2.") {
            return Err(SessionError::UnsupportedVersion(session.version));
        }

        tracing::info!("Loaded session with {} cards from {}", session.cards.len(), path.display());
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Context, FormEntry};

    #[test]
    fn cards_survive_json_round_trip() {
        let mut hidden = Card::new("labs rīts", "доброе утро").with_context(Context {
            sentence_text: "Labs rīts, Anna!".to_string(),
            sentence_translation: "Доброе утро, Анна!".to_string(),
            forms: vec![FormEntry {
                surface_form: "Labs rīts".to_string(),
                form_translation: "Доброе утро".to_string(),
            }],
        });
        hidden.visible = false;
        let placeholder = Card::error_placeholder("Kaut kas.", "Proxy unavailable");

        let set = CardSet::from_cards(vec![hidden, placeholder]);
        let export = SessionExport::new("Labs rīts, Anna! Kaut kas.", &set, "");

        let json = serde_json::to_string(&export).unwrap();
        assert!(json.contains("\"formTranslationEntries\""));
        assert!(json.contains("\"needsReprocessing\":true"));

        let restored: SessionExport = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, export);
        assert_eq!(restored.card_set().cards(), set.cards());
    }

    #[test]
    fn rejects_unknown_versions() {
        let dir = std::env::temp_dir().join(format!("lasit-session-{}", now_millis()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("session.json");

        let mut export = SessionExport::new("", &CardSet::default(), "");
        export.version = "9.0".to_string();
        export.save(&path).unwrap();

        assert!(matches!(
            SessionExport::load(&path),
            Err(SessionError::UnsupportedVersion(_))
        ));
        fs::remove_dir_all(dir).ok();
    }
}
