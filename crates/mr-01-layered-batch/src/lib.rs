//! # Layered Batch (mr-01)
//!
//! Nested, copy-on-write transactional batches over an ordered key-value
//! store. Every state change in a block goes through a batch: the block
//! opens a root batch, each transaction opens a child, and handlers open
//! grandchildren for work that may be rolled back on its own.
//!
//! ## Guarantees
//!
//! | Operation | Effect |
//! |-----------|--------|
//! | child commit | writes merge into the parent |
//! | root commit | writes reach the store in one atomic call |
//! | discard | writes are dropped, parent unchanged |
//! | read | own writes, then ancestors as of the batch's creation, then the store |
//!
//! Using a batch after it was closed is a programming error and panics.
//!
//! ## Crate Structure
//!
//! - `domain/` - batch arena, record keys, errors
//! - `ports/` - the [`KeyValueStore`] driven port
//! - `adapters/` - in-memory stores

#![warn(missing_docs)]

pub mod adapters;
pub mod domain;
pub mod ports;

pub use adapters::{InMemoryKVStore, SharedKVStore};
pub use domain::batch::{BatchId, LayeredBatch};
pub use domain::errors::{BatchError, KVStoreError};
pub use domain::key::{Key, KeyPart};
pub use ports::outbound::{BatchOperation, KeyValueStore};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
    }
}
