// src/error.rs

/// Fatal ingestion failures. Row-level noise never ends up here; it is
/// dropped or defaulted where it is found.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("failed to parse PDF: {0}")]
    Pdf(String),
    #[error("malformed spreadsheet container: {0}")]
    MalformedContainer(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, IngestError>;
