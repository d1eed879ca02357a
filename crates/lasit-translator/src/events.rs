use std::time::Duration;

use crate::classify::ErrorInfo;

/// Lifecycle of one `RequestClient::send` call, in emission order
#[derive(Debug, Clone)]
pub enum RequestEvent {
    Start {
        request_id: u64,
        attempt: u32,
        context: Option<String>,
    },
    Success {
        request_id: u64,
        attempt: u32,
        elapsed: Duration,
    },
    Error {
        request_id: u64,
        attempt: u32,
        info: ErrorInfo,
        will_retry: bool,
    },
    RateLimited {
        request_id: u64,
        retry_after_ms: Option<u64>,
    },
    Overloaded {
        request_id: u64,
        attempt: u32,
    },
    /// Terminal failure; carries the payload so observers can queue it
    Failed {
        request_id: u64,
        attempts: u32,
        info: ErrorInfo,
        /// The automatic retry budget ran out on a retryable error
        exhausted: bool,
        payload: String,
        context: Option<String>,
    },
}

impl RequestEvent {
    pub fn request_id(&self) -> u64 {
        match self {
            RequestEvent::Start { request_id, .. }
            | RequestEvent::Success { request_id, .. }
            | RequestEvent::Error { request_id, .. }
            | RequestEvent::RateLimited { request_id, .. }
            | RequestEvent::Overloaded { request_id, .. }
            | RequestEvent::Failed { request_id, .. } => *request_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RequestEvent::Start { .. } => "start",
            RequestEvent::Success { .. } => "success",
            RequestEvent::Error { .. } => "error",
            RequestEvent::RateLimited { .. } => "rate_limited",
            RequestEvent::Overloaded { .. } => "overloaded",
            RequestEvent::Failed { .. } => "failed",
        }
    }

    /// Whether an observer should move this failure into the retry queue
    pub fn should_enqueue(&self) -> bool {
        match self {
            RequestEvent::Failed {
                info, exhausted, ..
            } => info.should_enqueue(*exhausted),
            _ => false,
        }
    }
}
