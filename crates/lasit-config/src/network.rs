use std::env;

use serde::{Deserialize, Serialize};

fn default_proxy_url() -> String {
    env::var("LASIT_PROXY_URL").unwrap_or_else(|_| "http://localhost:3000/api/claude".to_string())
}

fn default_batch_url() -> String {
    env::var("LASIT_BATCH_URL")
        .unwrap_or_else(|_| "http://localhost:3000/api/claude/batches".to_string())
}

fn default_timeout_seconds() -> u64 {
    env::var("LASIT_TIMEOUT_SECONDS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(120)
}

fn default_max_retries() -> u32 {
    env::var("LASIT_MAX_RETRIES")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(5)
}

/// Where requests go and how hard to retry them
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct NetworkConfig {
    /// Pass-through proxy endpoint for single requests
    #[serde(default = "default_proxy_url")]
    pub proxy_url: String,
    /// Base URL of the batch endpoints
    #[serde(default = "default_batch_url")]
    pub batch_url: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Attempts per request, the first one included
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            proxy_url: default_proxy_url(),
            batch_url: default_batch_url(),
            timeout_seconds: default_timeout_seconds(),
            max_retries: default_max_retries(),
        }
    }
}
