//! # Merkle Chain (mr-02)
//!
//! Append-only hash chains with Merkle anchors and logarithmic receipts.
//!
//! ## Components
//!
//! | Type | Role |
//! |------|------|
//! | [`MerkleState`] | count plus complete-subtree peaks; the anchor |
//! | [`MerkleChain`] | persisted chain with marks, subtree roots and receipts |
//! | [`IndexChain`] | anchor-boundary records with binary search by source height |
//!
//! Chains are descriptors over a [`ChainStore`]; they hold no data
//! themselves.

#![warn(missing_docs)]

pub mod adapters;
pub mod domain;
pub mod ports;

pub use adapters::MemoryChainStore;
pub use domain::chain::{MerkleChain, DEFAULT_MARK_POWER, MAX_MARK_POWER};
pub use domain::errors::ChainError;
pub use domain::index::{IndexChain, IndexEntry};
pub use domain::names::*;
pub use domain::state::MerkleState;
pub use ports::outbound::ChainStore;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
