pub mod classify;
pub mod client;
pub mod events;

pub use classify::{ErrorInfo, ErrorKind, Severity, classify, is_retryable, retry_delay};
pub use client::{DEFAULT_MAX_RETRIES, RequestClient, StatsSnapshot};
pub use events::RequestEvent;

/// Upstream model provider interface
#[async_trait::async_trait]
pub trait Translator: Send + Sync {
    /// Send one request body upstream and return the raw response body
    async fn complete(&self, payload: &str) -> Result<String, TranslateError>;

    /// Provider metadata
    fn metadata(&self) -> ProviderMetadata;
}

#[derive(Debug, Clone)]
pub struct ProviderMetadata {
    pub name: String,
    pub endpoint: String,
}

/// Raw failure of one upstream call, before classification
#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    #[error("HTTP {status}: {body}")]
    Http {
        status: u16,
        /// Raw `Retry-After` header value
        retry_after: Option<String>,
        body: String,
    },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Transport error ({code:?}): {message}")]
    Transport {
        code: Option<String>,
        message: String,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl TranslateError {
    pub fn http(status: u16, body: impl Into<String>) -> Self {
        TranslateError::Http {
            status,
            retry_after: None,
            body: body.into(),
        }
    }

    pub fn transport(code: Option<&str>, message: impl Into<String>) -> Self {
        TranslateError::Transport {
            code: code.map(str::to_string),
            message: message.into(),
        }
    }
}
