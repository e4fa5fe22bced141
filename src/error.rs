use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error types for the intake pipeline
///
/// Per-item failures are turned into log entries by the pipeline, so most of
/// these never reach the caller directly. Only run-level setup errors
/// (configuration, destination root) are returned as `Err`.
#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("PDF parsing failed for {item}: {reason}")]
    ParseError { item: String, reason: String },

    #[error("Page {page} out of range for slot {label} (document has {page_count} pages)")]
    PageRangeError {
        label: String,
        page: u32,
        page_count: u32,
    },

    #[error("Slot {0} lists no pages")]
    EmptySlot(String),

    #[error("IO error at {path:?}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize PDF {item}: {reason}")]
    SerializeError { item: String, reason: String },

    #[error("Invalid folder or file name: {0:?}")]
    InvalidName(String),

    #[error("Destination already exists: {}", .0.display())]
    DestinationExists(PathBuf),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Configuration JSON is invalid: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProcessingError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        ProcessingError::IoError {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn parse(item: impl Into<String>, reason: impl ToString) -> Self {
        ProcessingError::ParseError {
            item: item.into(),
            reason: reason.to_string(),
        }
    }
}
