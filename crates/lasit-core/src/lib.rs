pub mod error;
pub mod index;
pub mod merge;
pub mod normalize;
pub mod preprocess;
pub mod session;
pub mod state;
pub mod types;

pub use index::FormIndex;
pub use merge::merge;
pub use normalize::{ModelOutput, parse_model_output, try_parse_model_output};
pub use state::CardSet;
pub use types::{Card, Context, FormEntry, Unit};
