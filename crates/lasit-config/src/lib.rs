use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};

use self::chunking::ChunkingConfig;
use self::network::NetworkConfig;
use self::queue::QueueConfig;
use self::translator::TranslatorConfig;

pub mod chunking;
pub mod network;
pub mod queue;
pub mod translator;

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub network: NetworkConfig,
    pub translator: TranslatorConfig,
    pub queue: QueueConfig,
    pub chunking: ChunkingConfig,
}

impl Config {
    /// Environment-driven defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a JSON config file; missing fields fall back to the defaults
    pub fn load(path: &Path) -> io::Result<Self> {
        tracing::info!("Loading config from {}", path.display());
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let config = serde_json::from_reader(reader)?;
        Ok(config)
    }
}
