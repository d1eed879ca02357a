use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::item::QueueItem;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Durable side-store for the retry queue
///
/// Calls are synchronous and may block on file I/O. The queue writes through
/// on every mutation, so implementations should stay small and local; async
/// callers that need to avoid stalling a runtime worker can wrap queue
/// operations in `tokio::task::spawn_blocking`.
pub trait QueueStore: Send + Sync {
    /// Load persisted items; corrupt or missing state yields an empty list
    fn load(&self) -> Vec<QueueItem>;

    fn save(&self, items: &[QueueItem]) -> Result<(), StoreError>;

    fn clear(&self) -> Result<(), StoreError>;
}

fn decode(raw: &str, source: &str) -> Vec<QueueItem> {
    match serde_json::from_str::<Vec<QueueItem>>(raw) {
        Ok(items) => items,
        Err(e) => {
            tracing::warn!("Discarding corrupt retry queue state in {}: {}", source, e);
            Vec::new()
        }
    }
}

/// Queue persisted as a JSON array in a single file
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl QueueStore for JsonFileStore {
    fn load(&self) -> Vec<QueueItem> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => decode(&raw, &self.path.display().to_string()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                tracing::warn!("Failed to read retry queue {}: {}", self.path.display(), e);
                Vec::new()
            }
        }
    }

    fn save(&self, items: &[QueueItem]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        // replace atomically
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(items)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory store holding the serialized form, for tests and ephemeral runs
#[derive(Default)]
pub struct MemoryStore {
    raw: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from arbitrary persisted text, valid or not
    pub fn with_raw(raw: &str) -> Self {
        Self {
            raw: Mutex::new(Some(raw.to_string())),
        }
    }

    pub fn raw(&self) -> Option<String> {
        self.raw.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl QueueStore for MemoryStore {
    fn load(&self) -> Vec<QueueItem> {
        match self.raw() {
            Some(raw) => decode(&raw, "memory"),
            None => Vec::new(),
        }
    }

    fn save(&self, items: &[QueueItem]) -> Result<(), StoreError> {
        let raw = serde_json::to_string(items)?;
        *self.raw.lock().unwrap_or_else(|e| e.into_inner()) = Some(raw);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.raw.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}
