use std::time::Duration;

use async_trait::async_trait;
use lasit_translator::{ProviderMetadata, TranslateError, Translator};
use reqwest::header::{CONTENT_TYPE, RETRY_AFTER};

/// Turn a non-2xx response into `TranslateError::Http`
pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, TranslateError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let body = response.text().await.unwrap_or_default();

    Err(TranslateError::Http {
        status: status.as_u16(),
        retry_after,
        body,
    })
}

pub(crate) fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!("Failed to build HTTP client with timeout: {}", e);
            reqwest::Client::new()
        })
}

/// Backend posting request bodies to the pass-through proxy
#[derive(Clone)]
pub struct ProxyTranslator {
    client: reqwest::Client,
    proxy_url: String,
}

impl ProxyTranslator {
    pub fn new(proxy_url: String, timeout: Duration) -> Self {
        Self {
            client: build_client(timeout),
            proxy_url,
        }
    }
}

#[async_trait]
impl Translator for ProxyTranslator {
    async fn complete(&self, payload: &str) -> Result<String, TranslateError> {
        let response = self
            .client
            .post(&self.proxy_url)
            .header(CONTENT_TYPE, "application/json")
            .body(payload.to_string())
            .send()
            .await?;

        let response = check_status(response).await?;
        let body = response.text().await?;

        if body.trim().is_empty() {
            return Err(TranslateError::InvalidResponse("empty body".to_string()));
        }

        Ok(body)
    }

    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            name: "proxy".to_string(),
            endpoint: self.proxy_url.clone(),
        }
    }
}
