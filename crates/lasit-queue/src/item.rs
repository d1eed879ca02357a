use std::time::{SystemTime, UNIX_EPOCH};

use lasit_translator::ErrorInfo;
use serde::{Deserialize, Serialize};

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// A failed request waiting to be sent again
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    pub id: String,
    /// Request body, also the deduplication key
    pub payload: String,
    pub error_info: ErrorInfo,
    /// Reprocessing passes that failed for this item
    pub attempts: u32,
    /// Milliseconds since the Unix epoch
    pub enqueued_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_attempt_at: Option<u64>,
    /// Caller label, e.g. the chunk text the payload was built from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl QueueItem {
    pub fn new(payload: &str, error_info: ErrorInfo, tag: Option<&str>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            payload: payload.to_string(),
            error_info,
            attempts: 0,
            enqueued_at: now_millis(),
            last_attempt_at: None,
            tag: tag.map(str::to_string),
        }
    }
}
