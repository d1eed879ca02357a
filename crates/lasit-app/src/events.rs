use std::sync::Arc;

use kanal::AsyncReceiver;
use lasit_translator::RequestEvent;
use tokio_util::sync::CancellationToken;

use crate::state::AppState;

pub mod reprocess_queue;
pub mod text_input;

/// Observer of request lifecycle events
///
/// Keeps the request status current and moves queue-worthy terminal failures
/// into the retry queue. On cancellation, events already emitted are handled
/// before the loop exits.
pub async fn event_loop(
    state: Arc<AppState>,
    request_rx: AsyncReceiver<RequestEvent>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    tracing::info!("[EVENT_LOOP] Starting, waiting for request events");
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                while let Ok(Some(event)) = request_rx.try_recv() {
                    handle_event(&state, event).await;
                }
                tracing::info!("[EVENT_LOOP] Stopping");
                return Ok(());
            }
            event = request_rx.recv() => {
                handle_event(&state, event?).await;
            }
        }
    }
}

pub async fn handle_event(state: &AppState, event: RequestEvent) {
    tracing::debug!(
        "[EVENT_LOOP] {} (request {})",
        event.name(),
        event.request_id()
    );
    state.status.requests.write().await.apply(&event);

    match &event {
        RequestEvent::RateLimited { retry_after_ms, .. } => {
            tracing::info!("Rate limited upstream, retry after {:?} ms", retry_after_ms);
        }
        RequestEvent::Overloaded { attempt, .. } => {
            tracing::info!("Upstream overloaded on attempt {}", attempt);
        }
        RequestEvent::Failed {
            info,
            payload,
            context,
            ..
        } => {
            if event.should_enqueue() {
                let id = state.queue.enqueue(payload, info.clone(), context.as_deref());
                tracing::info!("Moved failed request to retry queue as {}", id);
            } else {
                tracing::warn!(
                    "Not queueing {:?} failure: {}",
                    info.kind,
                    info.recommendation
                );
            }
        }
        RequestEvent::Start { .. } | RequestEvent::Success { .. } | RequestEvent::Error { .. } => {}
    }
}
