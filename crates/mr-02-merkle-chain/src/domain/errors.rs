//! # Chain Errors

use shared_types::{EncodingError, Status};
use thiserror::Error;

/// Errors from chain operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// Index at or beyond the chain height.
    #[error("Index {index} is out of range for chain of height {height}")]
    OutOfRange {
        /// Requested index.
        index: u64,
        /// Chain height.
        height: u64,
    },

    /// `from` after `to`.
    #[error("Invalid receipt range: {from} > {to}")]
    InvalidRange {
        /// Start.
        from: u64,
        /// End.
        to: u64,
    },

    /// A record the chain needs is absent, typically because history
    /// before a compact restore was not kept.
    #[error("Missing chain record: {0}")]
    Missing(String),

    /// A record failed to decode.
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    /// The backing store failed.
    #[error("Chain storage failure: {0}")]
    Storage(String),
}

impl ChainError {
    /// Status category of this error.
    pub fn status(&self) -> Status {
        match self {
            ChainError::OutOfRange { .. } | ChainError::Missing(_) => Status::NotFound,
            ChainError::InvalidRange { .. } => Status::BadRequest,
            ChainError::Encoding(e) => e.status(),
            ChainError::Storage(_) => Status::FatalError,
        }
    }
}
