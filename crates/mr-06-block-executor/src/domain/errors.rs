//! # Executor Errors
//!
//! Handler and pipeline failures are recorded on the transaction status;
//! only errors whose status is fatal abort the block.

use mr_04_ledger_database::DatabaseError;
use mr_05_signature_validation::ValidationError;
use shared_types::{Hash, PartitionId, ReceiptError, Status, TransactionType, Url};
use thiserror::Error;

/// Errors from executing blocks and transactions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutorError {
    /// No block is open.
    #[error("No block is in progress")]
    NoBlock,

    /// A block is already open.
    #[error("Block {0} is already in progress")]
    BlockInProgress(u64),

    /// Block index does not follow the last committed block.
    #[error("Block {index} does not follow block {last}")]
    BlockOutOfOrder {
        /// Requested index.
        index: u64,
        /// Last committed index.
        last: u64,
    },

    /// Transaction type cannot be submitted.
    #[error("Transaction type {0} is not supported here")]
    Unsupported(TransactionType),

    /// Internal transaction submitted from outside.
    #[error("{0} can only be produced internally")]
    InternalOnly(TransactionType),

    /// No handler registered for the type.
    #[error("No handler for transaction type {0}")]
    MissingHandler(TransactionType),

    /// Principal does not exist.
    #[error("Principal {0} not found")]
    PrincipalNotFound(Url),

    /// Referenced transaction is unknown.
    #[error("Transaction {} not found", hex::encode(.0))]
    TransactionNotFound(Hash),

    /// Principal has the wrong account type.
    #[error("Principal {principal} is not a {expected}")]
    WrongPrincipal {
        /// Principal URL.
        principal: Url,
        /// Expected account kind.
        expected: &'static str,
    },

    /// Account already exists.
    #[error("Account {0} already exists")]
    AlreadyExists(Url),

    /// Malformed body.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Token balance too low.
    #[error("Insufficient balance in {account}: have {balance}, need {amount}")]
    InsufficientBalance {
        /// Account debited.
        account: Url,
        /// Balance.
        balance: u128,
        /// Amount requested.
        amount: u128,
    },

    /// Signer cannot pay the fee.
    #[error("Insufficient credits on {signer}: have {balance}, need {fee}")]
    InsufficientCredits {
        /// Signer charged.
        signer: Url,
        /// Credit balance.
        balance: u64,
        /// Fee.
        fee: u64,
    },

    /// A system account the executor relies on is missing.
    #[error("System account {0} is missing")]
    MissingSystemAccount(Url),

    /// Synthetic sequence chain disagrees with the assigned sequence number.
    #[error("Synthetic sequence for {destination}: sequence {sequence} landed at index {index}")]
    SequenceMismatch {
        /// Destination partition.
        destination: PartitionId,
        /// Assigned sequence number.
        sequence: u64,
        /// Index on the sequence chain.
        index: u64,
    },

    /// Chain entry has not been anchored into the root chain yet.
    #[error("{account}#{chain}[{index}] is not anchored yet")]
    NotAnchored {
        /// Account owning the chain.
        account: Url,
        /// Chain name.
        chain: String,
        /// Entry index.
        index: u64,
    },

    /// Snapshot export failed.
    #[error("Snapshot export failed: {0}")]
    Export(String),

    /// Receipt composition failed.
    #[error(transparent)]
    Receipt(#[from] ReceiptError),

    /// Signature validation failed.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Ledger database failure.
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl ExecutorError {
    /// Status category of this error.
    pub fn status(&self) -> Status {
        match self {
            ExecutorError::NoBlock
            | ExecutorError::BlockInProgress(_)
            | ExecutorError::BlockOutOfOrder { .. }
            | ExecutorError::MissingHandler(_)
            | ExecutorError::Receipt(_)
            | ExecutorError::Export(_) => Status::InternalError,
            ExecutorError::Unsupported(_)
            | ExecutorError::InternalOnly(_)
            | ExecutorError::WrongPrincipal { .. }
            | ExecutorError::BadRequest(_)
            | ExecutorError::InsufficientBalance { .. } => Status::BadRequest,
            ExecutorError::PrincipalNotFound(_)
            | ExecutorError::TransactionNotFound(_)
            | ExecutorError::NotAnchored { .. } => Status::NotFound,
            ExecutorError::AlreadyExists(_) => Status::Conflict,
            ExecutorError::InsufficientCredits { .. } => Status::InsufficientCredits,
            ExecutorError::MissingSystemAccount(_) | ExecutorError::SequenceMismatch { .. } => {
                Status::FatalError
            }
            ExecutorError::Validation(e) => e.status(),
            ExecutorError::Database(e) => e.status(),
        }
    }

    /// True if the block cannot continue.
    pub fn is_fatal(&self) -> bool {
        self.status().is_fatal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let url = Url::parse("acc://alice").unwrap();
        assert_eq!(ExecutorError::PrincipalNotFound(url.clone()).status(), Status::NotFound);
        assert_eq!(ExecutorError::AlreadyExists(url.clone()).status(), Status::Conflict);
        assert!(ExecutorError::MissingSystemAccount(url).is_fatal());
        assert!(ExecutorError::NoBlock.is_fatal());
        assert!(!ExecutorError::BadRequest("x".into()).is_fatal());
        assert_eq!(
            ExecutorError::Validation(ValidationError::DepthExceeded(6)).status(),
            Status::BadRequest
        );
    }
}
