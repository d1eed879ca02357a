use std::io::Read;
use std::path::Path;

use anyhow::Context;
use lasit_core::session::SessionExport;

use crate::state::AppState;

/// Session export written by `process` and updated by `queue process`
pub const DEFAULT_SESSION_FILE: &str = "lasit_session.json";

/// Read the text to study from a file, or stdin when the path is `-`
pub fn read_input(path: &Path) -> anyhow::Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read stdin")?;
        return Ok(text);
    }

    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

pub async fn save_session(state: &AppState, path: &Path) -> anyhow::Result<()> {
    let session = state.session.read().await;
    let export = SessionExport::new(
        &session.input_text,
        &session.cards,
        &session.translation_text(),
    );
    export
        .save(path)
        .with_context(|| format!("Failed to write session {}", path.display()))
}

/// Replace the current session with an exported one
pub async fn load_session(state: &AppState, path: &Path) -> anyhow::Result<()> {
    let export = SessionExport::load(path)
        .with_context(|| format!("Failed to load session {}", path.display()))?;

    let mut session = state.session.write().await;
    session.cards = export.card_set();
    session.translations = if export.translation_text.is_empty() {
        Vec::new()
    } else {
        vec![export.translation_text]
    };
    session.input_text = export.input_text;

    tracing::info!("Loaded {} card(s) from {}", session.cards.len(), path.display());
    Ok(())
}
