//! Error types for mapping registration, resolution, and storage.

use std::path::PathBuf;

/// Errors returned by the mapper and the stores behind it.
#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    #[error("mapping {method} {path} already exists")]
    Duplicate { method: String, path: String },

    #[error("no mapping found for {method} {path}")]
    NotFound { method: String, path: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl MappingError {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, MappingError::Duplicate { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, MappingError::NotFound { .. })
    }
}

/// Failures of the durable store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to open mapping store {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("mapping store error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to encode or decode stored mapping: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("stored key has {0} bytes, expected 8")]
    CorruptKey(usize),
}
