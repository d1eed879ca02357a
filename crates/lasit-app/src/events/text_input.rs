use std::sync::Arc;
use std::time::Duration;

use lasit_core::normalize::try_parse_model_output;
use lasit_core::preprocess::chunk_text;
use lasit_lang_latvian::ModelRequest;
use lasit_translator::ErrorInfo;

use crate::state::AppState;

#[derive(Debug, Clone, Default)]
pub struct ProcessSummary {
    pub chunks: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Set when an authentication or quota failure stopped the run early
    pub aborted: Option<ErrorInfo>,
}

/// Normalize a response body and merge its cards into the session
pub async fn apply_response(
    state: &AppState,
    chunk_text: &str,
    body: &str,
) -> Result<usize, ErrorInfo> {
    let fallback = Some(chunk_text).filter(|text| !text.trim().is_empty());
    let output = try_parse_model_output(body, fallback)
        .map_err(|e| ErrorInfo::invalid_response(&e.to_string()))?;

    if output.cards.is_empty() {
        return Err(ErrorInfo::invalid_response("no usable cards"));
    }

    let count = output.cards.len();
    let mut session = state.session.write().await;
    session.cards.add(output.cards);
    if let Some(translation) = output.translation {
        session.translations.push(translation);
    }
    Ok(count)
}

async fn process_chunk(
    state: &AppState,
    chunk_text: &str,
    payload: &str,
) -> Result<usize, ErrorInfo> {
    // the chunk text travels as the request context and becomes the queue tag
    let body = state.client.send(payload, Some(chunk_text)).await?;

    apply_response(state, chunk_text, &body).await.inspect_err(|info| {
        state.queue.enqueue(payload, info.clone(), Some(chunk_text));
    })
}

/// Chunk the text and run every chunk through the model, one at a time
///
/// Replaces the current session. A chunk that fails leaves a placeholder card
/// in its place; authentication and quota failures stop the remaining chunks.
pub async fn handle_text_input(
    state: Arc<AppState>,
    text: String,
) -> anyhow::Result<ProcessSummary> {
    let (per_chunk, overlap, delay) = {
        let config = state.config.read().await;
        (
            config.chunking.sentences_per_chunk,
            config.chunking.overlap,
            Duration::from_millis(config.chunking.delay_ms),
        )
    };
    let options = state.request_options().await;

    let chunks = chunk_text(&text, per_chunk, overlap);
    tracing::info!("Processing {} chars in {} chunk(s)", text.len(), chunks.len());

    {
        let mut session = state.session.write().await;
        session.input_text = text;
        session.cards.clear();
        session.translations.clear();
    }

    let mut summary = ProcessSummary {
        chunks: chunks.len(),
        ..ProcessSummary::default()
    };

    for (i, chunk) in chunks.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(delay).await;
        }

        tracing::info!("Chunk {}/{}", i + 1, chunks.len());
        let payload = ModelRequest::flashcards(&chunk.text, &options).to_payload()?;

        match process_chunk(&state, &chunk.text, &payload).await {
            Ok(count) => {
                tracing::debug!("Chunk {} produced {} card(s)", i + 1, count);
                summary.succeeded += 1;
            }
            Err(info) => {
                tracing::warn!("Chunk {} failed: {}", i + 1, info.user_message);
                summary.failed += 1;
                state
                    .session
                    .write()
                    .await
                    .cards
                    .add_placeholder(&chunk.text, &info.user_message);

                if !info.kind.is_retryable() {
                    tracing::error!("Stopping: {}", info.recommendation);
                    summary.aborted = Some(info);
                    break;
                }
            }
        }
    }

    Ok(summary)
}
