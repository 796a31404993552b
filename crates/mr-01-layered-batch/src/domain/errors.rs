//! # Domain Errors
//!
//! Store failures are reported by the adapter as [`KVStoreError`]; batch
//! misuse and store failures surface to callers as [`BatchError`].

use shared_types::Status;
use thiserror::Error;

/// Errors from the underlying key-value store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KVStoreError {
    /// Storage I/O failed.
    #[error("Storage I/O error: {message}")]
    IOError {
        /// Adapter message.
        message: String,
    },

    /// Stored data failed an integrity check.
    #[error("Storage corruption: {message}")]
    CorruptionError {
        /// Adapter message.
        message: String,
    },

    /// Key not present where one was required.
    #[error("Key not found")]
    NotFound,
}

/// Errors from batch operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    /// Write attempted through a read-only batch.
    #[error("Batch {0} is read-only")]
    ReadOnly(u64),

    /// Root batch committed while trie updates were still buffered.
    #[error("Root batch has {0} state-tree updates that were never folded into the trie")]
    UnfoldedStateUpdates(usize),

    /// The store rejected a read or the commit.
    #[error("Store failure: {0}")]
    Store(#[from] KVStoreError),
}

impl BatchError {
    /// Status category of this error.
    pub fn status(&self) -> Status {
        match self {
            BatchError::ReadOnly(_) | BatchError::UnfoldedStateUpdates(_) => Status::InternalError,
            BatchError::Store(_) => Status::FatalError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_are_fatal() {
        let err: BatchError = KVStoreError::IOError {
            message: "disk gone".into(),
        }
        .into();
        assert_eq!(err.status(), Status::FatalError);
        assert!(err.to_string().contains("disk gone"));
        assert_eq!(BatchError::ReadOnly(3).status(), Status::InternalError);
    }
}
