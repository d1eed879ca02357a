use std::env;

use serde::{Deserialize, Serialize};

fn default_path() -> String {
    env::var("LASIT_QUEUE_PATH").unwrap_or_else(|_| "lasit_retry_queue.json".to_string())
}

fn default_max_size() -> usize {
    100
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct QueueConfig {
    /// File backing the retry queue
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default = "default_max_size")]
    pub max_size: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            max_size: default_max_size(),
        }
    }
}
