//! # In-Memory Store
//!
//! `BTreeMap`-backed store for tests and embedding. [`SharedKVStore`] wraps
//! one behind a lock so a test can keep a handle to the same data the
//! batch arena writes into.

use crate::domain::errors::KVStoreError;
use crate::ports::outbound::{BatchOperation, KeyValueStore};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Ordered in-memory store.
#[derive(Debug, Default, Clone)]
pub struct InMemoryKVStore {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
    writes: u64,
}

impl InMemoryKVStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True if no keys are stored.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of successful write calls (single or batch).
    pub fn write_count(&self) -> u64 {
        self.writes
    }
}

impl KeyValueStore for InMemoryKVStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        Ok(self.data.get(key).cloned())
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        self.data.insert(key.to_vec(), value.to_vec());
        self.writes += 1;
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), KVStoreError> {
        self.data.remove(key);
        self.writes += 1;
        Ok(())
    }

    fn atomic_batch_write(&mut self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        for op in operations {
            match op {
                BatchOperation::Put { key, value } => {
                    self.data.insert(key, value);
                }
                BatchOperation::Delete { key } => {
                    self.data.remove(&key);
                }
            }
        }
        self.writes += 1;
        Ok(())
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError> {
        Ok(self
            .data
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

/// Cloneable handle to a locked in-memory store.
#[derive(Debug, Default, Clone)]
pub struct SharedKVStore {
    inner: Arc<RwLock<InMemoryKVStore>>,
}

impl SharedKVStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> InMemoryKVStore {
        self.inner.read().clone()
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// True if no keys are stored.
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

impl KeyValueStore for SharedKVStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        self.inner.read().get(key)
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        self.inner.write().put(key, value)
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), KVStoreError> {
        self.inner.write().delete(key)
    }

    fn atomic_batch_write(&mut self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        self.inner.write().atomic_batch_write(operations)
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError> {
        self.inner.read().prefix_scan(prefix)
    }
}
