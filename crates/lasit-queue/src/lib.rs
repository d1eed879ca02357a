mod item;
mod queue;
mod store;

pub use item::QueueItem;
pub use queue::{ProcessReport, Progress, Recovered, Resend, RetryQueue, DEFAULT_MAX_SIZE};
pub use store::{JsonFileStore, MemoryStore, QueueStore, StoreError};
