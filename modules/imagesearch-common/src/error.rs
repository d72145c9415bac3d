use thiserror::Error;

/// Result type alias for record-model and merge operations.
pub type Result<T> = std::result::Result<T, IndexError>;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Invalid archive timestamp: {0:?}")]
    InvalidTimestamp(String),

    #[error("Record codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("Malformed frame: {0}")]
    Frame(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
