use std::sync::Arc;

use lasit_core::normalize::try_parse_model_output;
use lasit_queue::{ProcessReport, QueueItem};
use lasit_translator::ErrorInfo;

use crate::events::text_input::apply_response;
use crate::state::AppState;

/// Accept a recovered response only if it yields cards
fn check_response(item: &QueueItem, response: &str) -> Result<(), ErrorInfo> {
    let fallback = item.tag.as_deref().filter(|tag| !tag.trim().is_empty());
    match try_parse_model_output(response, fallback) {
        Ok(output) if !output.cards.is_empty() => Ok(()),
        Ok(_) => Err(ErrorInfo::invalid_response("no usable cards")),
        Err(e) => Err(ErrorInfo::invalid_response(&e.to_string())),
    }
}

/// Resend everything in the retry queue and fold recovered cards back in
///
/// A recovered response replaces the placeholder card of the chunk it was
/// sent for. A response that cannot be normalized leaves its item in the
/// queue as a failed attempt.
pub async fn handle_queue_reprocess(state: Arc<AppState>) -> anyhow::Result<ProcessReport> {
    if state.queue.is_empty() {
        tracing::info!("[QUEUE] Nothing to reprocess");
        return Ok(ProcessReport::default());
    }

    let report = state
        .queue
        .process_all_checked(state.client.as_ref(), check_response, |progress| {
            tracing::info!(
                "[QUEUE] {}/{} {} {}",
                progress.done,
                progress.total,
                progress.item.id,
                if progress.succeeded { "recovered" } else { "still failing" }
            );
        })
        .await;

    for recovered in &report.recovered {
        let chunk_text = recovered.tag.as_deref().unwrap_or_default();

        match apply_response(&state, chunk_text, &recovered.response).await {
            Ok(count) => {
                tracing::info!("Recovered {} card(s) from {}", count, recovered.id);
                if !chunk_text.is_empty() {
                    state.session.write().await.cards.remove_placeholder(chunk_text);
                }
            }
            Err(info) => {
                tracing::warn!(
                    "Recovered response for {} is unusable: {}",
                    recovered.id,
                    info.user_message
                );
            }
        }
    }

    tracing::info!(
        "[QUEUE] {} processed, {} successful, {} failed, {} left",
        report.processed,
        report.successful,
        report.failed,
        state.queue.len()
    );

    Ok(report)
}
