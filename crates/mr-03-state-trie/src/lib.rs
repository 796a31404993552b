//! # State Trie (mr-03)
//!
//! Binary Patricia trie (BPT) committing to every account's state hash.
//!
//! | Hash | Definition |
//! |------|------------|
//! | leaf | `SHA-256(account id || state hash)` |
//! | branch | `SHA-256(left || right)` |
//! | empty root | all zeros |
//!
//! Proofs are ordinary receipts from the leaf hash to the root.

#![warn(missing_docs)]

pub mod domain;

pub use domain::errors::TrieError;
pub use domain::node::leaf_hash;
pub use domain::proofs::verify_proof;
pub use domain::trie::StateTrie;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
