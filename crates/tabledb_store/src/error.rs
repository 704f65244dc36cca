//! Error types for the store adapter.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store adapter operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Error surfaced by the LMDB engine (environment, transaction,
    /// cursor, or capacity failure).
    #[error("lmdb error: {0}")]
    Lmdb(#[from] heed::Error),

    /// A key that was required to exist was not found.
    #[error("key not found: {key}")]
    KeyNotFound {
        /// The key that was looked up.
        key: String,
    },

    /// The environment file already exists where a new one was requested.
    #[error("store file already exists: {path}")]
    AlreadyExists {
        /// Path of the existing file.
        path: String,
    },
}

impl StoreError {
    /// Creates a key-not-found error.
    pub fn key_not_found(key: impl Into<String>) -> Self {
        Self::KeyNotFound { key: key.into() }
    }

    /// Returns `true` if this error means the memory map is full.
    ///
    /// The map size is fixed at environment creation; a full map is a
    /// fatal capacity error for the write that hit it, never retried here.
    #[must_use]
    pub fn is_map_full(&self) -> bool {
        matches!(self, Self::Lmdb(heed::Error::Mdb(heed::MdbError::MapFull)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_full_detection() {
        let full = StoreError::from(heed::Error::Mdb(heed::MdbError::MapFull));
        assert!(full.is_map_full());

        assert!(!StoreError::key_not_found("k").is_map_full());
        let other = StoreError::from(heed::Error::Mdb(heed::MdbError::NotFound));
        assert!(!other.is_map_full());
    }
}
