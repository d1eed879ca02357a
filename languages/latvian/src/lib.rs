pub mod batch;
pub mod prompt;
pub mod translator;

pub use batch::{BatchClient, BatchOutcome, BatchRequest, BatchResult, BatchStatus};
pub use prompt::{ModelRequest, RequestOptions};
pub use translator::ProxyTranslator;
