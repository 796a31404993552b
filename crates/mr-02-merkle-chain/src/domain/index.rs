//! # Index Chains
//!
//! An index chain records, at each anchor boundary, how far a tracked
//! chain had grown and where in the root chain that growth was anchored.
//! Entry hashes go on a Merkle chain; the encoded entries are stored
//! beside them under `value/<i>`.

use super::chain::MerkleChain;
use super::errors::ChainError;
use crate::ports::outbound::ChainStore;
use serde::{Deserialize, Serialize};
use shared_types::encoding::{decode, encode, hash_of};

/// One anchor-boundary record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Index of the last entry of the tracked chain at the boundary.
    pub source: u64,
    /// Root chain index the boundary was anchored at.
    pub anchor: u64,
    /// Block index.
    pub block_index: u64,
    /// Block time.
    pub block_time: u64,
}

/// Index chain over a [`MerkleChain`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexChain {
    chain: MerkleChain,
}

impl IndexChain {
    /// Wrap a chain.
    pub fn new(chain: MerkleChain) -> Self {
        Self { chain }
    }

    /// Underlying Merkle chain.
    pub fn chain(&self) -> &MerkleChain {
        &self.chain
    }

    fn value_key(&self, index: u64) -> Vec<u8> {
        self.chain.prefix().clone().push("value").push(index).into_bytes()
    }

    /// Number of entries.
    pub fn len<S: ChainStore + ?Sized>(&self, store: &S) -> Result<u64, ChainError> {
        self.chain.height(store)
    }

    /// Append an entry. Returns its index.
    pub fn append<S: ChainStore + ?Sized>(
        &self,
        store: &mut S,
        entry: IndexEntry,
    ) -> Result<u64, ChainError> {
        let index = self.chain.add(store, hash_of(&entry))?;
        store.put(self.value_key(index), encode("index entry", &entry)?)?;
        Ok(index)
    }

    /// Entry at `index`.
    pub fn get<S: ChainStore + ?Sized>(&self, store: &S, index: u64) -> Result<IndexEntry, ChainError> {
        match store.get(&self.value_key(index))? {
            Some(bytes) => Ok(decode("index entry", &bytes)?),
            None => {
                let height = self.len(store)?;
                if index >= height {
                    Err(ChainError::OutOfRange { index, height })
                } else {
                    Err(ChainError::Missing(format!("index entry {index}")))
                }
            }
        }
    }

    /// Most recent entry.
    pub fn last<S: ChainStore + ?Sized>(&self, store: &S) -> Result<Option<IndexEntry>, ChainError> {
        match self.len(store)? {
            0 => Ok(None),
            n => self.get(store, n - 1).map(Some),
        }
    }

    /// First entry whose `source` is at least `source`, with its index.
    /// Entries are appended with non-decreasing sources, so this is a
    /// binary search.
    pub fn find<S: ChainStore + ?Sized>(
        &self,
        store: &S,
        source: u64,
    ) -> Result<Option<(u64, IndexEntry)>, ChainError> {
        let (mut lo, mut hi) = (0u64, self.len(store)?);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.get(store, mid)?.source < source {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        if lo == self.len(store)? {
            return Ok(None);
        }
        Ok(Some((lo, self.get(store, lo)?)))
    }
}
