//! # Database Errors

use mr_01_layered_batch::BatchError;
use mr_02_merkle_chain::ChainError;
use shared_types::{EncodingError, Hash, Status, Url};
use thiserror::Error;

/// Errors from ledger database operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DatabaseError {
    /// Account does not exist.
    #[error("Account {0} not found")]
    AccountNotFound(Url),

    /// Transaction is unknown.
    #[error("Transaction {} not found", hex::encode(.0))]
    TransactionNotFound(Hash),

    /// Write attempted through a read-only view.
    #[error("Cannot write through a read-only view")]
    ReadOnly,

    /// Snapshot section out of order or missing.
    #[error("Snapshot section {found} found where {expected} was expected")]
    SnapshotSection {
        /// Section type expected next.
        expected: u16,
        /// Section type found, or zero at end of input.
        found: u16,
    },

    /// Snapshot ended inside a section.
    #[error("Snapshot is truncated")]
    SnapshotTruncated,

    /// Unsupported snapshot version.
    #[error("Unsupported snapshot version {0}")]
    SnapshotVersion(u32),

    /// Restore target is not empty.
    #[error("Cannot restore a snapshot into a non-empty database")]
    NotEmpty,

    /// Restored state does not hash to the snapshot's root.
    #[error("State root mismatch after restore: expected {}, got {}", hex::encode(.expected), hex::encode(.actual))]
    RootMismatch {
        /// Root recorded in the snapshot.
        expected: Hash,
        /// Root after restoring.
        actual: Hash,
    },

    /// A stored record or key could not be interpreted.
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    /// Batch failure.
    #[error(transparent)]
    Batch(#[from] BatchError),

    /// Chain failure.
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// Record encoding failure.
    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

impl DatabaseError {
    /// Status category of this error.
    pub fn status(&self) -> Status {
        match self {
            DatabaseError::AccountNotFound(_) | DatabaseError::TransactionNotFound(_) => {
                Status::NotFound
            }
            DatabaseError::ReadOnly => Status::InternalError,
            DatabaseError::SnapshotSection { .. }
            | DatabaseError::SnapshotTruncated
            | DatabaseError::SnapshotVersion(_) => Status::BadRequest,
            DatabaseError::NotEmpty => Status::Conflict,
            DatabaseError::RootMismatch { .. } | DatabaseError::CorruptRecord(_) => {
                Status::FatalError
            }
            DatabaseError::Batch(e) => e.status(),
            DatabaseError::Chain(e) => e.status(),
            DatabaseError::Encoding(e) => e.status(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_passthrough() {
        let err: DatabaseError = ChainError::Storage("gone".into()).into();
        assert_eq!(err.status(), Status::FatalError);
        let url = Url::parse("acc://alice").unwrap();
        assert_eq!(DatabaseError::AccountNotFound(url).status(), Status::NotFound);
        assert_eq!(DatabaseError::SnapshotTruncated.status(), Status::BadRequest);
    }
}
