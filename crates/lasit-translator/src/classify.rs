use std::error::Error as _;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::TranslateError;

/// Longest automatic backoff between attempts
pub const MAX_RETRY_DELAY_MS: u64 = 60_000;

const REFUSED_PATTERNS: &[&str] = &["econnrefused", "connection refused"];
const NETWORK_PATTERNS: &[&str] = &[
    "enotfound",
    "eai_again",
    "dns",
    "econnreset",
    "connection reset",
    "etimedout",
    "timed out",
    "timeout",
    "network",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    ProxyUnavailable,
    NetworkError,
    ApiOverloaded,
    RateLimited,
    Authentication,
    InsufficientQuota,
    Unknown,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 7] = [
        ErrorKind::ProxyUnavailable,
        ErrorKind::NetworkError,
        ErrorKind::ApiOverloaded,
        ErrorKind::RateLimited,
        ErrorKind::Authentication,
        ErrorKind::InsufficientQuota,
        ErrorKind::Unknown,
    ];

    pub fn is_retryable(self) -> bool {
        !matches!(self, ErrorKind::Authentication | ErrorKind::InsufficientQuota)
    }

    /// Failures of the path to the proxy rather than of the model API
    pub fn is_connectivity(self) -> bool {
        matches!(self, ErrorKind::ProxyUnavailable | ErrorKind::NetworkError)
    }

    pub fn severity(self) -> Severity {
        match self {
            ErrorKind::RateLimited => Severity::Low,
            ErrorKind::NetworkError | ErrorKind::ApiOverloaded | ErrorKind::Unknown => {
                Severity::Medium
            }
            ErrorKind::ProxyUnavailable => Severity::High,
            ErrorKind::Authentication | ErrorKind::InsufficientQuota => Severity::Critical,
        }
    }

    fn messages(self) -> (&'static str, &'static str) {
        match self {
            ErrorKind::ProxyUnavailable => (
                "The translation proxy is not reachable.",
                "Make sure the proxy server is running, then reprocess the queue.",
            ),
            ErrorKind::NetworkError => (
                "Network connection problem.",
                "Check the internet connection; failed chunks stay in the retry queue.",
            ),
            ErrorKind::ApiOverloaded => (
                "The model API is overloaded right now.",
                "Wait a few minutes and reprocess the queue.",
            ),
            ErrorKind::RateLimited => (
                "Too many requests to the model API.",
                "Wait for the rate limit to reset; requests are retried automatically.",
            ),
            ErrorKind::Authentication => (
                "The API key was rejected.",
                "Check the API key configured on the proxy.",
            ),
            ErrorKind::InsufficientQuota => (
                "The API account has run out of credit.",
                "Top up the account balance before retrying.",
            ),
            ErrorKind::Unknown => (
                "Unexpected error while processing the text.",
                "Retry later; if the problem persists, check the logs.",
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Classified failure, as shown to the user and stored in the retry queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    pub retryable: bool,
    pub user_message: String,
    pub recommendation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
    pub severity: Severity,
}

impl ErrorInfo {
    pub fn new(kind: ErrorKind, http_status: Option<u16>) -> Self {
        let (user_message, recommendation) = kind.messages();
        Self {
            kind,
            http_status,
            retryable: kind.is_retryable(),
            user_message: user_message.to_string(),
            recommendation: recommendation.to_string(),
            retry_after_ms: None,
            severity: kind.severity(),
        }
    }

    /// An unusable model response (bad JSON, no cards)
    pub fn invalid_response(detail: &str) -> Self {
        let mut info = ErrorInfo::new(ErrorKind::Unknown, None);
        info.user_message = format!("The model returned an unusable response: {detail}");
        info
    }

    /// Whether a terminal failure belongs in the retry queue
    pub fn should_enqueue(&self, exhausted: bool) -> bool {
        self.kind.is_connectivity() || (self.retryable && exhausted)
    }

    /// Delay before the given attempt is retried
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        retry_delay(self.kind, attempt, self.retry_after_ms)
    }
}

pub fn is_retryable(kind: ErrorKind) -> bool {
    kind.is_retryable()
}

/// Parse a `Retry-After` header given in seconds
pub fn parse_retry_after(value: &str) -> Option<u64> {
    match value.trim().parse::<f64>() {
        Ok(seconds) if seconds.is_finite() && seconds >= 0.0 => {
            Some((seconds * 1000.0).round() as u64)
        }
        _ => {
            tracing::debug!("Ignoring unsupported Retry-After value: {}", value);
            None
        }
    }
}

/// Classify a response status
pub fn classify_status(status: u16, retry_after: Option<&str>) -> ErrorInfo {
    let kind = match status {
        429 => ErrorKind::RateLimited,
        500 | 502 | 503 | 504 | 529 => ErrorKind::ApiOverloaded,
        401 | 403 => ErrorKind::Authentication,
        402 => ErrorKind::InsufficientQuota,
        _ => ErrorKind::Unknown,
    };

    let mut info = ErrorInfo::new(kind, Some(status));
    match kind {
        ErrorKind::RateLimited => info.retry_after_ms = retry_after.and_then(parse_retry_after),
        ErrorKind::Unknown => info.retryable = status >= 500,
        _ => {}
    }
    info
}

/// Classify a failure that never produced a status, by code and message
pub fn classify_network(code: Option<&str>, message: &str) -> ErrorKind {
    let haystack = format!("{} {}", code.unwrap_or_default(), message).to_lowercase();

    if REFUSED_PATTERNS.iter().any(|p| haystack.contains(p)) {
        ErrorKind::ProxyUnavailable
    } else if NETWORK_PATTERNS.iter().any(|p| haystack.contains(p)) {
        ErrorKind::NetworkError
    } else {
        ErrorKind::Unknown
    }
}

/// Full message of a reqwest error including its sources
fn error_chain(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}

/// Map a raw failure to its classified form
pub fn classify(error: &TranslateError) -> ErrorInfo {
    let info = match error {
        TranslateError::Http {
            status,
            retry_after,
            ..
        } => classify_status(*status, retry_after.as_deref()),
        TranslateError::NetworkError(e) => {
            if let Some(status) = e.status() {
                classify_status(status.as_u16(), None)
            } else {
                let mut kind = classify_network(None, &error_chain(e));
                if kind == ErrorKind::Unknown && (e.is_timeout() || e.is_connect()) {
                    kind = ErrorKind::NetworkError;
                }
                ErrorInfo::new(kind, None)
            }
        }
        TranslateError::Transport { code, message } => {
            ErrorInfo::new(classify_network(code.as_deref(), message), None)
        }
        TranslateError::InvalidResponse(detail) => ErrorInfo::invalid_response(detail),
    };

    tracing::debug!(
        "Classified '{}' as {:?} (retryable: {})",
        error,
        info.kind,
        info.retryable
    );
    info
}

/// Exponential backoff parameters for one error kind
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub base_ms: u64,
    pub multiplier: f64,
}

pub fn backoff_policy(kind: ErrorKind) -> BackoffPolicy {
    let (base_ms, multiplier) = match kind {
        // overload outlasts a network blip
        ErrorKind::ApiOverloaded => (10_000, 1.5),
        ErrorKind::RateLimited => (5_000, 2.0),
        ErrorKind::ProxyUnavailable => (2_000, 2.0),
        ErrorKind::NetworkError | ErrorKind::Unknown => (1_000, 2.0),
        ErrorKind::Authentication | ErrorKind::InsufficientQuota => (0, 1.0),
    };
    BackoffPolicy { base_ms, multiplier }
}

/// Delay before retrying after `attempt` (1-based) failed
///
/// A server-supplied `retry_after_ms` is used verbatim; otherwise the kind's
/// exponential backoff applies, capped at [`MAX_RETRY_DELAY_MS`].
pub fn retry_delay(kind: ErrorKind, attempt: u32, retry_after_ms: Option<u64>) -> Duration {
    if let Some(ms) = retry_after_ms {
        return Duration::from_millis(ms);
    }

    let policy = backoff_policy(kind);
    let exponent = attempt.saturating_sub(1).min(64) as i32;
    let delay = policy.base_ms as f64 * policy.multiplier.powi(exponent);
    Duration::from_millis(delay.min(MAX_RETRY_DELAY_MS as f64) as u64)
}
