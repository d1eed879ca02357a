/// Why a single raw card was rejected by the normalizer
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("Raw card is not a JSON object")]
    NotAnObject,

    #[error("Raw card has no usable base form")]
    MissingBaseForm,

    #[error("Raw card matches no known schema")]
    UnrecognizedShape,

    #[error("Card '{0}' has neither a translation nor a valid context")]
    Empty(String),
}

/// Why a whole model response could not be turned into cards
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Empty model response")]
    EmptyResponse,

    #[error("No card list found in model response")]
    MissingCards,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid session file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported session version: {0}")]
    UnsupportedVersion(String),
}
