//! Error types for import and export.

use std::path::PathBuf;

use thiserror::Error;

use crate::store::StoreError;

/// Errors from the transfer pipeline.
#[derive(Debug, Error)]
pub enum TransferError {
    /// A file could not be read or written.
    #[error("cannot access {path}: {message}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error text.
        message: String,
    },

    /// A document or mapping file is not valid JSON for its purpose.
    #[error("invalid JSON in {path}: {message}")]
    Json {
        /// File involved.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// The mapping cannot be applied.
    #[error(
        "invalid field mapping: {0}\n  Suggestion: Each field is a JSON pointer such as \"/name\"; see 'pricewatch import --help'"
    )]
    Mapping(String),

    /// Reading or writing the catalog failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl TransferError {
    pub(crate) fn io(path: &std::path::Path, error: &std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            message: error.to_string(),
        }
    }

    pub(crate) fn json(path: &std::path::Path, error: &serde_json::Error) -> Self {
        Self::Json {
            path: path.to_path_buf(),
            message: error.to_string(),
        }
    }
}
