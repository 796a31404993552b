//! # Trie Errors

use shared_types::{Hash, Status};
use thiserror::Error;

/// Errors from trie lookups and proof checks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrieError {
    /// No leaf for the key.
    #[error("No state entry for key {}", hex::encode(.0))]
    KeyNotFound(Hash),

    /// The proof does not start at the expected leaf.
    #[error("Proof starts at the wrong leaf")]
    LeafMismatch,

    /// The proof does not end at the expected root.
    #[error("Proof ends at {} but the state root is {}", hex::encode(.actual), hex::encode(.expected))]
    RootMismatch {
        /// State root.
        expected: Hash,
        /// Anchor the proof evaluates to.
        actual: Hash,
    },
}

impl TrieError {
    /// Status category of this error.
    pub fn status(&self) -> Status {
        match self {
            TrieError::KeyNotFound(_) => Status::NotFound,
            TrieError::LeafMismatch | TrieError::RootMismatch { .. } => Status::Unauthenticated,
        }
    }
}
