//! # Validation Errors
//!
//! Every rejection maps onto one [`Status`] so that the executor can
//! record it on the transaction status unchanged.

use shared_types::{PartitionId, Status, Url};
use thiserror::Error;

/// Why a signature or signature set was rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Signer routes to another partition and the delivery was not forwarded.
    #[error("Signature from {signer} belongs on {expected}, not {actual}")]
    WrongPartition {
        /// Signer URL.
        signer: Url,
        /// Partition the signer routes to.
        expected: PartitionId,
        /// Partition executing.
        actual: PartitionId,
    },

    /// Delegation nested deeper than allowed.
    #[error("Delegated signature exceeded the depth limit ({0})")]
    DepthExceeded(usize),

    /// Signature kind not allowed for this transaction.
    #[error("{0}")]
    NotAllowed(&'static str),

    /// Partition signature addressed to another partition.
    #[error("Partition signature is for {destination}, not {actual}")]
    WrongDestination {
        /// Destination named by the signature.
        destination: Url,
        /// Partition executing.
        actual: PartitionId,
    },

    /// No signature matches the header's initiator.
    #[error("Transaction has no initiator signature")]
    MissingInitiator,

    /// More than one signature claims to be the initiator.
    #[error("Transaction has {0} initiator signatures")]
    MultipleInitiators(usize),

    /// Cryptographic verification failed.
    #[error("Invalid signature from {0}")]
    InvalidSignature(Url),

    /// Signer account does not exist or cannot sign.
    #[error("Signer {0} not found")]
    SignerNotFound(Url),

    /// Key is not on the signer.
    #[error("Key is not an entry of {0}")]
    KeyNotFound(Url),

    /// Signature names a stale signer version.
    #[error("Signer {signer} is at version {current}, signature names {signed}")]
    VersionMismatch {
        /// Signer URL.
        signer: Url,
        /// Current version.
        current: u64,
        /// Version named by the signature.
        signed: u64,
    },

    /// Threshold can never be met by the signer's entries.
    #[error("Threshold {threshold} of {signer} exceeds its {entries} entries")]
    ThresholdUnsatisfiable {
        /// Signer URL.
        signer: Url,
        /// Threshold.
        threshold: u64,
        /// Entry count.
        entries: usize,
    },

    /// Signer's authority does not govern the principal.
    #[error("{signer} is not authorized to sign for {principal}")]
    NotAuthorized {
        /// Signer URL.
        signer: Url,
        /// Principal URL.
        principal: Url,
    },

    /// Delegator does not list the inner signer as a delegate.
    #[error("{delegate} is not a delegate of {delegator}")]
    NotDelegate {
        /// Delegating signer.
        delegator: Url,
        /// Inner signer.
        delegate: Url,
    },

    /// Key does not belong to a validator of the source partition.
    #[error("Key is not a validator of {0}")]
    NotValidator(PartitionId),

    /// Synthetic or system transaction without a source partition.
    #[error("Cannot determine the source partition")]
    UnknownSource,

    /// Receipt does not prove the transaction.
    #[error("Invalid receipt: {0}")]
    InvalidReceipt(String),

    /// Receipt ends at an anchor this partition has not recorded.
    #[error("Receipt anchor {0} is not a known directory anchor")]
    UnknownAnchor(String),

    /// Signature set lacks a required kind.
    #[error("Missing {0} signature")]
    Incomplete(&'static str),

    /// Routing failed.
    #[error("Routing failed: {0}")]
    Routing(String),

    /// State could not be read.
    #[error("State read failed: {message}")]
    State {
        /// Status of the underlying failure.
        status: Status,
        /// Message.
        message: String,
    },
}

impl ValidationError {
    /// Status category of this error.
    pub fn status(&self) -> Status {
        match self {
            ValidationError::WrongPartition { .. }
            | ValidationError::DepthExceeded(_)
            | ValidationError::NotAllowed(_)
            | ValidationError::WrongDestination { .. } => Status::BadRequest,
            ValidationError::MissingInitiator
            | ValidationError::MultipleInitiators(_)
            | ValidationError::InvalidSignature(_)
            | ValidationError::SignerNotFound(_)
            | ValidationError::KeyNotFound(_)
            | ValidationError::NotValidator(_)
            | ValidationError::UnknownSource
            | ValidationError::InvalidReceipt(_)
            | ValidationError::UnknownAnchor(_)
            | ValidationError::Incomplete(_) => Status::Unauthenticated,
            ValidationError::VersionMismatch { .. } => Status::Conflict,
            ValidationError::ThresholdUnsatisfiable { .. }
            | ValidationError::NotAuthorized { .. }
            | ValidationError::NotDelegate { .. } => Status::Unauthorized,
            ValidationError::Routing(_) => Status::InternalError,
            ValidationError::State { status, .. } => *status,
        }
    }
}

impl From<mr_04_ledger_database::DatabaseError> for ValidationError {
    fn from(e: mr_04_ledger_database::DatabaseError) -> Self {
        ValidationError::State {
            status: e.status(),
            message: e.to_string(),
        }
    }
}
