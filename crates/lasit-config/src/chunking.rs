use std::env;

use serde::{Deserialize, Serialize};

fn default_sentences_per_chunk() -> usize {
    3
}

fn default_overlap() -> usize {
    1
}

fn default_delay_ms() -> u64 {
    env::var("LASIT_CHUNK_DELAY_MS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(1000)
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ChunkingConfig {
    #[serde(default = "default_sentences_per_chunk")]
    pub sentences_per_chunk: usize,
    /// Sentences shared by neighbouring chunks
    #[serde(default = "default_overlap")]
    pub overlap: usize,
    /// Pause between sequential chunk requests
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            sentences_per_chunk: default_sentences_per_chunk(),
            overlap: default_overlap(),
            delay_ms: default_delay_ms(),
        }
    }
}
