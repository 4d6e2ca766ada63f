//! Error types for scanrelay operations

use std::path::Path;

use thiserror::Error;

/// Main error type for scanrelay operations
#[derive(Error, Debug)]
pub enum ScanRelayError {
    #[error("Connection failure for scanner '{scanner}': {message}")]
    ConnectionFailure { scanner: String, message: String },

    #[error("Scanner '{name}' is already registered")]
    DuplicateScanner { name: String },

    #[error("Malformed record data: {message}")]
    MalformedRecordData { message: String },

    #[error("Storage failure at {path}: {source}")]
    StorageIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid registry file {path}: {message}")]
    InvalidRegistry { path: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScanRelayError {
    /// Wrap an IO error with the storage path it occurred on.
    pub fn storage(path: &Path, source: std::io::Error) -> Self {
        Self::StorageIo {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Result type alias for scanrelay operations
pub type Result<T> = std::result::Result<T, ScanRelayError>;
