use std::time::Duration;

use lasit_core::normalize::{ModelOutput, parse_model_value};
use lasit_core::preprocess::Chunk;
use lasit_translator::TranslateError;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::prompt::{ModelRequest, RequestOptions};
use crate::translator::{build_client, check_status};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub custom_id: String,
    pub params: ModelRequest,
}

impl BatchRequest {
    /// One request per chunk, identified as `chunk-<index>`
    pub fn for_chunks(chunks: &[Chunk], options: &RequestOptions) -> Vec<Self> {
        chunks
            .iter()
            .map(|chunk| BatchRequest {
                custom_id: format!("chunk-{}", chunk.index),
                params: ModelRequest::flashcards(&chunk.text, options),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchStatus {
    pub id: String,
    pub processing_status: String,
    #[serde(default)]
    pub request_counts: Option<Value>,
    #[serde(default)]
    pub results_url: Option<String>,
}

impl BatchStatus {
    pub fn is_ended(&self) -> bool {
        self.processing_status == "ended"
    }

    /// Where the results of this batch can be fetched
    ///
    /// Prefers the URL reported by the proxy, falling back to
    /// `<batch_url>/<id>/results`.
    pub fn results_location(&self, batch_url: &str) -> String {
        match self.results_url.as_deref().filter(|url| !url.trim().is_empty()) {
            Some(url) => url.to_string(),
            None => format!("{}/{}/results", batch_url, self.id),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    Succeeded(ModelOutput),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult {
    pub custom_id: String,
    pub outcome: BatchOutcome,
}

/// Parse the NDJSON results of a finished batch
///
/// Succeeded lines go through the same normalizer as single responses.
/// Unparseable lines are skipped with a warning.
pub fn parse_results(ndjson: &str) -> Vec<BatchResult> {
    ndjson
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(i, line)| {
            let value: Value = match serde_json::from_str(line) {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!("Skipping malformed batch result line {}: {}", i + 1, e);
                    return None;
                }
            };

            let custom_id = value
                .get("custom_id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let result = &value["result"];

            let outcome = match result.get("type").and_then(Value::as_str) {
                Some("succeeded") => match parse_model_value(&result["message"], None) {
                    Ok(output) if !output.cards.is_empty() => BatchOutcome::Succeeded(output),
                    Ok(_) => BatchOutcome::Failed("no usable cards".to_string()),
                    Err(e) => BatchOutcome::Failed(e.to_string()),
                },
                Some(other) => {
                    let detail = result["error"]["message"]
                        .as_str()
                        .or_else(|| result["error"]["error"]["message"].as_str())
                        .unwrap_or_default();
                    BatchOutcome::Failed(format!("{other} {detail}").trim().to_string())
                }
                None => BatchOutcome::Failed("missing result type".to_string()),
            };

            Some(BatchResult { custom_id, outcome })
        })
        .collect()
}

/// Client for the create / poll / fetch batch endpoints
#[derive(Clone)]
pub struct BatchClient {
    client: reqwest::Client,
    batch_url: String,
}

impl BatchClient {
    pub fn new(batch_url: String, timeout: Duration) -> Self {
        Self {
            client: build_client(timeout),
            batch_url: batch_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn create(&self, requests: &[BatchRequest]) -> Result<BatchStatus, TranslateError> {
        tracing::info!("Submitting batch of {} request(s)", requests.len());
        let response = self
            .client
            .post(&self.batch_url)
            .json(&json!({ "requests": requests }))
            .send()
            .await?;

        Ok(check_status(response).await?.json().await?)
    }

    pub async fn status(&self, batch_id: &str) -> Result<BatchStatus, TranslateError> {
        let response = self
            .client
            .get(format!("{}/{}", self.batch_url, batch_id))
            .send()
            .await?;

        Ok(check_status(response).await?.json().await?)
    }

    pub async fn results(&self, status: &BatchStatus) -> Result<Vec<BatchResult>, TranslateError> {
        let response = self
            .client
            .get(status.results_location(&self.batch_url))
            .send()
            .await?;

        let body = check_status(response).await?.text().await?;
        let results = parse_results(&body);
        tracing::info!("Fetched {} batch result(s) for {}", results.len(), status.id);
        Ok(results)
    }
}
