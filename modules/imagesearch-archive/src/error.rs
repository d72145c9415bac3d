/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, ArchiveError>;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("Malformed record at offset {offset} in {archive}: {reason}")]
    MalformedRecord {
        archive: String,
        offset: u64,
        reason: String,
    },

    #[error("Unsupported archive format: {0}")]
    UnsupportedFormat(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
