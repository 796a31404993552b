//! In-memory [`ChainStore`].

use crate::domain::errors::ChainError;
use crate::ports::outbound::ChainStore;
use std::collections::BTreeMap;

/// `BTreeMap`-backed chain store.
#[derive(Debug, Default, Clone)]
pub struct MemoryChainStore {
    records: BTreeMap<Vec<u8>, Vec<u8>>,
    reads: std::cell::Cell<u64>,
}

impl MemoryChainStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Reads served so far.
    pub fn reads(&self) -> u64 {
        self.reads.get()
    }

    /// Reset the read counter.
    pub fn reset_reads(&self) {
        self.reads.set(0);
    }
}

impl ChainStore for MemoryChainStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, ChainError> {
        self.reads.set(self.reads.get() + 1);
        Ok(self.records.get(key).cloned())
    }

    fn put(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<(), ChainError> {
        self.records.insert(key, value);
        Ok(())
    }
}
