use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use kanal::{AsyncReceiver, AsyncSender};

use crate::Translator;
use crate::classify::{ErrorInfo, ErrorKind, classify};
use crate::events::RequestEvent;

pub const DEFAULT_MAX_RETRIES: u32 = 5;

#[derive(Debug, Default)]
struct RequestStats {
    requests: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    retries: AtomicU64,
    rate_limited: AtomicU64,
    overloaded: AtomicU64,
}

/// Point-in-time copy of the client counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub requests: u64,
    pub successes: u64,
    pub failures: u64,
    pub retries: u64,
    pub rate_limited: u64,
    pub overloaded: u64,
}

/// Sends requests upstream with bounded, classified retries
///
/// Each `send` runs its attempts sequentially. Concurrent calls share nothing
/// but the atomic counters and the subscriber list.
pub struct RequestClient {
    backend: Arc<dyn Translator>,
    max_retries: u32,
    subscribers: Mutex<Vec<AsyncSender<RequestEvent>>>,
    stats: RequestStats,
    next_id: AtomicU64,
}

impl RequestClient {
    pub fn new(backend: Arc<dyn Translator>) -> Self {
        Self {
            backend,
            max_retries: DEFAULT_MAX_RETRIES,
            subscribers: Mutex::new(Vec::new()),
            stats: RequestStats::default(),
            next_id: AtomicU64::new(0),
        }
    }

    /// Attempts per call, the first one included
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Receive every lifecycle event emitted from now on
    pub fn subscribe(&self) -> AsyncReceiver<RequestEvent> {
        let (tx, rx) = kanal::unbounded_async();
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tx);
        rx
    }

    fn emit(&self, event: RequestEvent) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!("Dropping closed request event subscriber: {}", e);
                false
            }
        });
    }

    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            requests: self.stats.requests.load(Ordering::Relaxed),
            successes: self.stats.successes.load(Ordering::Relaxed),
            failures: self.stats.failures.load(Ordering::Relaxed),
            retries: self.stats.retries.load(Ordering::Relaxed),
            rate_limited: self.stats.rate_limited.load(Ordering::Relaxed),
            overloaded: self.stats.overloaded.load(Ordering::Relaxed),
        }
    }

    /// Send a payload with the configured retry budget
    pub async fn send(&self, payload: &str, context: Option<&str>) -> Result<String, ErrorInfo> {
        self.send_with_attempts(payload, context, self.max_retries)
            .await
    }

    /// Send a payload, giving up after `max_attempts` attempts
    pub async fn send_with_attempts(
        &self,
        payload: &str,
        context: Option<&str>,
        max_attempts: u32,
    ) -> Result<String, ErrorInfo> {
        let request_id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let max_attempts = max_attempts.max(1);
        self.stats.requests.fetch_add(1, Ordering::Relaxed);

        let mut attempt = 0;
        loop {
            attempt += 1;
            tracing::debug!(
                "[REQUEST {}] attempt {}/{} {}",
                request_id,
                attempt,
                max_attempts,
                context.unwrap_or_default()
            );
            self.emit(RequestEvent::Start {
                request_id,
                attempt,
                context: context.map(str::to_string),
            });

            let started = Instant::now();
            let error = match self.backend.complete(payload).await {
                Ok(body) => {
                    self.stats.successes.fetch_add(1, Ordering::Relaxed);
                    self.emit(RequestEvent::Success {
                        request_id,
                        attempt,
                        elapsed: started.elapsed(),
                    });
                    return Ok(body);
                }
                Err(e) => e,
            };

            let info = classify(&error);
            let will_retry = info.retryable && attempt < max_attempts;

            self.emit(RequestEvent::Error {
                request_id,
                attempt,
                info: info.clone(),
                will_retry,
            });

            match info.kind {
                ErrorKind::RateLimited => {
                    self.stats.rate_limited.fetch_add(1, Ordering::Relaxed);
                    self.emit(RequestEvent::RateLimited {
                        request_id,
                        retry_after_ms: info.retry_after_ms,
                    });
                }
                ErrorKind::ApiOverloaded => {
                    self.stats.overloaded.fetch_add(1, Ordering::Relaxed);
                    self.emit(RequestEvent::Overloaded {
                        request_id,
                        attempt,
                    });
                }
                _ => {}
            }

            if !will_retry {
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    "[REQUEST {}] failed after {} attempt(s): {}",
                    request_id,
                    attempt,
                    error
                );
                self.emit(RequestEvent::Failed {
                    request_id,
                    attempts: attempt,
                    info: info.clone(),
                    exhausted: info.retryable,
                    payload: payload.to_string(),
                    context: context.map(str::to_string),
                });
                return Err(info);
            }

            self.stats.retries.fetch_add(1, Ordering::Relaxed);
            let delay = info.retry_delay(attempt);
            tracing::warn!(
                "[REQUEST {}] {:?} on attempt {}, retrying in {:?}",
                request_id,
                info.kind,
                attempt,
                delay
            );
            tokio::time::sleep(delay).await;
        }
    }
}
