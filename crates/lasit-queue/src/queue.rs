use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use lasit_translator::{ErrorInfo, RequestClient};

use crate::item::{QueueItem, now_millis};
use crate::store::{QueueStore, StoreError};

pub const DEFAULT_MAX_SIZE: usize = 100;

/// Something that can send a queued payload again
#[async_trait::async_trait]
pub trait Resend: Send + Sync {
    async fn resend(&self, payload: &str, tag: Option<&str>) -> Result<String, ErrorInfo>;
}

#[async_trait::async_trait]
impl Resend for RequestClient {
    async fn resend(&self, payload: &str, tag: Option<&str>) -> Result<String, ErrorInfo> {
        self.send(payload, tag).await
    }
}

/// Reported after each item of a processing pass
#[derive(Debug)]
pub struct Progress<'a> {
    /// Items handled so far in this pass, this one included
    pub done: usize,
    pub total: usize,
    pub item: &'a QueueItem,
    pub succeeded: bool,
}

/// An item that went through on reprocessing, with the upstream response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recovered {
    pub id: String,
    pub payload: String,
    pub tag: Option<String>,
    pub response: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessReport {
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub recovered: Vec<Recovered>,
}

/// Clears the processing flag when a pass ends, however it ends
struct ProcessingGuard<'a>(&'a AtomicBool);

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Durable holding area for failed requests
///
/// Items are unique by payload and kept in enqueue order; once `max_size` is
/// exceeded the oldest items are evicted. Every mutation is written through to
/// the store.
pub struct RetryQueue {
    store: Box<dyn QueueStore>,
    items: Mutex<VecDeque<QueueItem>>,
    max_size: usize,
    processing: AtomicBool,
}

impl RetryQueue {
    pub fn new(store: Box<dyn QueueStore>, max_size: usize) -> Self {
        let max_size = max_size.max(1);
        let mut items: VecDeque<QueueItem> = store.load().into();
        while items.len() > max_size {
            items.pop_front();
        }
        tracing::info!("Retry queue loaded with {} item(s)", items.len());

        Self {
            store,
            items: Mutex::new(items),
            max_size,
            processing: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<QueueItem>> {
        self.items.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn persist(&self, items: &VecDeque<QueueItem>) {
        let items: Vec<QueueItem> = items.iter().cloned().collect();
        if let Err(e) = self.store.save(&items) {
            tracing::warn!("Failed to persist retry queue: {}", e);
        }
    }

    /// Add a failed payload, or refresh the entry already holding it
    ///
    /// Returns the id of the stored item.
    pub fn enqueue(&self, payload: &str, error_info: ErrorInfo, tag: Option<&str>) -> String {
        let mut items = self.lock();

        let id = match items.iter_mut().find(|item| item.payload == payload) {
            Some(existing) => {
                tracing::debug!("Refreshing queued item {}", existing.id);
                existing.error_info = error_info;
                existing.last_attempt_at = Some(now_millis());
                if let Some(tag) = tag {
                    existing.tag = Some(tag.to_string());
                }
                existing.id.clone()
            }
            None => {
                let item = QueueItem::new(payload, error_info, tag);
                let id = item.id.clone();
                tracing::info!("Queued item {} ({:?})", id, item.error_info.kind);
                items.push_back(item);

                while items.len() > self.max_size {
                    if let Some(evicted) = items.pop_front() {
                        tracing::warn!("Retry queue full, evicting oldest item {}", evicted.id);
                    }
                }
                id
            }
        };

        self.persist(&items);
        id
    }

    pub fn remove(&self, id: &str) -> bool {
        let mut items = self.lock();
        let before = items.len();
        items.retain(|item| item.id != id);
        let removed = items.len() != before;

        if removed {
            self.persist(&items);
        }
        removed
    }

    /// Empty the queue and its store
    pub fn clear(&self) -> Result<(), StoreError> {
        self.lock().clear();
        tracing::info!("Retry queue cleared");
        self.store.clear()
    }

    pub fn items(&self) -> Vec<QueueItem> {
        self.lock().iter().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<QueueItem> {
        self.lock().iter().find(|item| item.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    /// Send every queued item once, sequentially
    ///
    /// Works on a snapshot taken at the start; items queued meanwhile wait for
    /// the next pass. Successes leave the queue, failures stay with their
    /// attempt count bumped and the newest error. A call made while another
    /// pass is running returns an empty report immediately.
    pub async fn process_all<F>(&self, sender: &dyn Resend, on_progress: F) -> ProcessReport
    where
        F: FnMut(Progress<'_>) + Send,
    {
        self.process_all_checked(sender, |_, _| Ok(()), on_progress).await
    }

    /// Like `process_all`, but a response only counts once `check` accepts it
    ///
    /// A rejected response is handled as a failed attempt: the item stays
    /// queued with its id and position, `attempts` bumped and the error
    /// returned by `check` recorded.
    pub async fn process_all_checked<C, F>(
        &self,
        sender: &dyn Resend,
        check: C,
        mut on_progress: F,
    ) -> ProcessReport
    where
        C: Fn(&QueueItem, &str) -> Result<(), ErrorInfo> + Send,
        F: FnMut(Progress<'_>) + Send,
    {
        if self
            .processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!("Retry queue is already being processed");
            return ProcessReport::default();
        }
        let _guard = ProcessingGuard(&self.processing);

        let snapshot = self.items();
        let total = snapshot.len();
        let mut report = ProcessReport::default();
        tracing::info!("Reprocessing {} queued item(s)", total);

        for item in &snapshot {
            let result = sender
                .resend(&item.payload, item.tag.as_deref())
                .await
                .and_then(|response| check(item, &response).map(|()| response));
            report.processed += 1;

            let succeeded = result.is_ok();
            {
                let mut items = self.lock();
                match result {
                    Ok(response) => {
                        report.successful += 1;
                        items.retain(|queued| queued.id != item.id);
                        report.recovered.push(Recovered {
                            id: item.id.clone(),
                            payload: item.payload.clone(),
                            tag: item.tag.clone(),
                            response,
                        });
                    }
                    Err(info) => {
                        report.failed += 1;
                        tracing::warn!("Queued item {} failed again: {:?}", item.id, info.kind);
                        if let Some(queued) = items.iter_mut().find(|queued| queued.id == item.id) {
                            queued.attempts += 1;
                            queued.error_info = info;
                            queued.last_attempt_at = Some(now_millis());
                        }
                    }
                }
                self.persist(&items);
            }

            on_progress(Progress {
                done: report.processed,
                total,
                item,
                succeeded,
            });
        }

        tracing::info!(
            "Queue pass done: {} processed, {} successful, {} failed",
            report.processed,
            report.successful,
            report.failed
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use lasit_translator::ErrorKind;
    use tokio::sync::Notify;

    use super::*;
    use crate::store::{JsonFileStore, MemoryStore};

    /// Succeeds for payloads starting with "ok", fails for the rest
    struct PrefixSender;

    #[async_trait::async_trait]
    impl Resend for PrefixSender {
        async fn resend(&self, payload: &str, _tag: Option<&str>) -> Result<String, ErrorInfo> {
            if payload.starts_with("ok") {
                Ok(format!("response to {payload}"))
            } else {
                Err(ErrorInfo::new(ErrorKind::ApiOverloaded, Some(529)))
            }
        }
    }

    struct GatedSender(Arc<Notify>);

    #[async_trait::async_trait]
    impl Resend for GatedSender {
        async fn resend(&self, _payload: &str, _tag: Option<&str>) -> Result<String, ErrorInfo> {
            self.0.notified().await;
            Ok(String::new())
        }
    }

    fn memory_queue(max_size: usize) -> RetryQueue {
        RetryQueue::new(Box::new(MemoryStore::new()), max_size)
    }

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir()
            .join(format!("lasit-queue-{}-{}", name, uuid::Uuid::new_v4()))
            .join("queue.json")
    }

    #[test]
    fn same_payload_updates_in_place() {
        let queue = memory_queue(DEFAULT_MAX_SIZE);

        let first = queue.enqueue("payload", ErrorInfo::new(ErrorKind::NetworkError, None), None);
        let second = queue.enqueue(
            "payload",
            ErrorInfo::new(ErrorKind::RateLimited, Some(429)),
            Some("chunk"),
        );

        assert_eq!(first, second);
        assert_eq!(queue.len(), 1);
        let item = queue.get(&first).unwrap();
        assert_eq!(item.error_info.kind, ErrorKind::RateLimited);
        assert_eq!(item.tag.as_deref(), Some("chunk"));
        assert!(item.last_attempt_at.is_some());
    }

    #[test]
    fn oldest_items_are_evicted() {
        let queue = memory_queue(2);
        let info = ErrorInfo::new(ErrorKind::NetworkError, None);

        queue.enqueue("a", info.clone(), None);
        queue.enqueue("b", info.clone(), None);
        queue.enqueue("c", info, None);

        let payloads: Vec<String> = queue.items().into_iter().map(|i| i.payload).collect();
        assert_eq!(payloads, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn process_all_keeps_only_failures() {
        let queue = memory_queue(DEFAULT_MAX_SIZE);
        let info = ErrorInfo::new(ErrorKind::ProxyUnavailable, None);
        queue.enqueue("ok-1", info.clone(), Some("first"));
        let failing = queue.enqueue("bad-2", info, None);

        let mut seen = Vec::new();
        let report = queue
            .process_all(&PrefixSender, |progress| {
                seen.push((progress.done, progress.total, progress.succeeded))
            })
            .await;

        assert_eq!((report.processed, report.successful, report.failed), (2, 1, 1));
        assert_eq!(seen, vec![(1, 2, true), (2, 2, false)]);
        assert_eq!(report.recovered[0].tag.as_deref(), Some("first"));
        assert_eq!(report.recovered[0].response, "response to ok-1");

        let remaining = queue.items();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, failing);
        assert_eq!(remaining[0].attempts, 1);
        assert_eq!(remaining[0].error_info.kind, ErrorKind::ApiOverloaded);
    }

    #[tokio::test]
    async fn second_pass_while_processing_is_a_no_op() {
        let queue = Arc::new(memory_queue(DEFAULT_MAX_SIZE));
        queue.enqueue("ok", ErrorInfo::new(ErrorKind::NetworkError, None), None);
        let gate = Arc::new(Notify::new());

        let running = {
            let queue = queue.clone();
            let sender = GatedSender(gate.clone());
            tokio::spawn(async move { queue.process_all(&sender, |_| {}).await })
        };
        while !queue.is_processing() {
            tokio::task::yield_now().await;
        }

        let skipped = queue.process_all(&PrefixSender, |_| {}).await;
        assert_eq!(skipped, ProcessReport::default());

        gate.notify_one();
        let report = running.await.unwrap();
        assert_eq!(report.successful, 1);
        assert!(!queue.is_processing());
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn items_queued_during_a_pass_wait_for_the_next() {
        let queue = Arc::new(memory_queue(DEFAULT_MAX_SIZE));
        queue.enqueue("first", ErrorInfo::new(ErrorKind::NetworkError, None), None);
        let gate = Arc::new(Notify::new());

        let running = {
            let queue = queue.clone();
            let sender = GatedSender(gate.clone());
            tokio::spawn(async move { queue.process_all(&sender, |_| {}).await })
        };
        while !queue.is_processing() {
            tokio::task::yield_now().await;
        }

        let late = queue.enqueue("late", ErrorInfo::new(ErrorKind::NetworkError, None), None);
        gate.notify_one();
        let report = running.await.unwrap();

        assert_eq!(report.processed, 1);
        let remaining = queue.items();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, late);
        assert_eq!(remaining[0].attempts, 0);
    }

    #[tokio::test]
    async fn rejected_response_keeps_the_original_item() {
        let queue = memory_queue(DEFAULT_MAX_SIZE);
        let info = ErrorInfo::new(ErrorKind::ProxyUnavailable, None);
        let kept = queue.enqueue("ok-garbled", info.clone(), Some("chunk"));
        queue.enqueue("ok-2", info, None);
        let enqueued_at = queue.get(&kept).unwrap().enqueued_at;

        let report = queue
            .process_all_checked(
                &PrefixSender,
                |item, _response| {
                    if item.payload == "ok-garbled" {
                        Err(ErrorInfo::invalid_response("no usable cards"))
                    } else {
                        Ok(())
                    }
                },
                |_| {},
            )
            .await;

        assert_eq!((report.processed, report.successful, report.failed), (2, 1, 1));
        assert_eq!(report.recovered.len(), 1);
        assert_eq!(report.recovered[0].payload, "ok-2");

        let item = queue.get(&kept).unwrap();
        assert_eq!(item.attempts, 1);
        assert_eq!(item.enqueued_at, enqueued_at);
        assert_eq!(item.error_info.kind, ErrorKind::Unknown);
        assert_eq!(item.tag.as_deref(), Some("chunk"));
    }

    #[test]
    fn survives_restart_and_clear_removes_file() {
        let path = temp_path("restart");
        let info = ErrorInfo::new(ErrorKind::NetworkError, None);

        let id = {
            let queue = RetryQueue::new(Box::new(JsonFileStore::new(&path)), DEFAULT_MAX_SIZE);
            queue.enqueue("payload", info, Some("tag"))
        };

        let reloaded = RetryQueue::new(Box::new(JsonFileStore::new(&path)), DEFAULT_MAX_SIZE);
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.items()[0].id, id);

        reloaded.clear().unwrap();
        assert!(reloaded.is_empty());
        assert!(!path.exists());

        if let Some(dir) = path.parent() {
            std::fs::remove_dir_all(dir).ok();
        }
    }

    #[test]
    fn corrupt_state_falls_back_to_empty() {
        let queue = RetryQueue::new(Box::new(MemoryStore::with_raw("{not json")), DEFAULT_MAX_SIZE);
        assert!(queue.is_empty());

        queue.enqueue("payload", ErrorInfo::new(ErrorKind::Unknown, None), None);
        assert!(queue.remove(&queue.items()[0].id));
        assert!(!queue.remove("missing"));
    }
}
