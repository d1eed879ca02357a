use std::path::{Path, PathBuf};

use anyhow::Context;
use lasit_config::Config;

/// Config file picked up from the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "lasit.json";

/// Resolve the config to run with
///
/// An explicit path must exist. Otherwise `lasit.json` in the working
/// directory is used when present, then the environment-driven defaults.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    if let Some(path) = path {
        return Config::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()));
    }

    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    if local.exists() {
        return Config::load(&local)
            .with_context(|| format!("Failed to load config {}", local.display()));
    }

    tracing::info!("No config file found, using defaults");
    Ok(Config::new())
}
