use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use lasit_config::Config;
use lasit_core::CardSet;
use lasit_lang_latvian::{ProxyTranslator, RequestOptions};
use lasit_queue::{JsonFileStore, QueueStore, RetryQueue};
use lasit_translator::{RequestClient, Translator};
use tokio::sync::RwLock;

use crate::status::AppStatus;

/// Working session: the text being studied and what came back for it
#[derive(Default)]
pub struct Session {
    pub input_text: String,
    pub cards: CardSet,
    /// Full translation of each processed chunk, in chunk order
    pub translations: Vec<String>,
}

impl Session {
    pub fn translation_text(&self) -> String {
        self.translations.join("\n")
    }
}

pub struct AppState {
    pub config: Arc<RwLock<Config>>,
    pub session: RwLock<Session>,
    pub client: Arc<RequestClient>,
    pub queue: Arc<RetryQueue>,
    pub status: AppStatus,
}

impl AppState {
    /// State backed by the HTTP proxy and the on-disk queue
    pub fn new(config: Config) -> Self {
        let backend = ProxyTranslator::new(
            config.network.proxy_url.clone(),
            Duration::from_secs(config.network.timeout_seconds),
        );
        let store = JsonFileStore::new(Path::new(&config.queue.path));
        tracing::debug!("Retry queue persisted at {}", store.path().display());

        Self::with_parts(config, Arc::new(backend), Box::new(store))
    }

    pub fn with_parts(
        config: Config,
        backend: Arc<dyn Translator>,
        store: Box<dyn QueueStore>,
    ) -> Self {
        let metadata = backend.metadata();
        tracing::info!("Using {} backend at {}", metadata.name, metadata.endpoint);

        let client = RequestClient::new(backend).with_max_retries(config.network.max_retries);
        let queue = RetryQueue::new(store, config.queue.max_size);

        Self {
            config: Arc::new(RwLock::new(config)),
            session: RwLock::new(Session::default()),
            client: Arc::new(client),
            queue: Arc::new(queue),
            status: AppStatus::new(),
        }
    }

    pub async fn request_options(&self) -> RequestOptions {
        let config = self.config.read().await;
        RequestOptions {
            model: config.translator.model.clone(),
            max_tokens: config.translator.max_tokens,
            temperature: config.translator.temperature,
        }
    }
}
