//! # Driven Ports
//!
//! Chains persist through a [`ChainStore`]. The ledger database implements
//! it over a layered batch; tests use [`MemoryChainStore`](crate::adapters::MemoryChainStore).

use crate::domain::errors::ChainError;

/// Byte-key storage seen by a chain.
pub trait ChainStore {
    /// Read a record.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, ChainError>;

    /// Write a record.
    fn put(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<(), ChainError>;
}
