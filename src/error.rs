//! Error taxonomy for registry operations.
//!
//! Every failure surfaced by the library is one of a small set of kinds so
//! callers can turn it into a status line without inspecting internals.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    /// A required argument was empty or missing.
    #[error("invalid input: {0}")]
    Input(String),

    /// A referenced face or video does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Extractor output did not follow the `{frame}_{suffix}.jpg` naming schema.
    #[error("parse error: {0}")]
    Parse(String),

    #[error("cannot access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The external extractor failed or timed out.
    #[error("extraction failed: {0}")]
    Extraction(String),

    /// Transaction-layer failure. Any open transaction has been rolled back.
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),
}

impl RegistryError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RegistryError::Io {
            path: path.into(),
            source,
        }
    }

    /// Short name of the taxonomy kind, used in status lines.
    pub fn kind(&self) -> &'static str {
        match self {
            RegistryError::Input(_) => "InputError",
            RegistryError::NotFound(_) => "NotFoundError",
            RegistryError::Parse(_) => "ParseError",
            RegistryError::Io { .. } => "IOError",
            RegistryError::Extraction(_) => "ExtractionError",
            RegistryError::Store(_) => "StoreError",
        }
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;
