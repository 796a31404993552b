//! # Batch Views
//!
//! [`Batch`] writes typed records through one batch of the arena.
//! [`View`] reads through a batch, or the committed store when no batch is
//! given, without the ability to write.
//!
//! Every write that changes an account recomputes the account's state
//! hash and buffers it as a state-trie update on the batch.

use crate::domain::errors::DatabaseError;
use crate::domain::keys;
use crate::domain::records::{ChainIndexEntry, ChainMeta};
use crate::domain::snapshot::ChainRecord;
use crate::ports::inbound::LedgerReader;
use mr_01_layered_batch::{BatchError, BatchId, LayeredBatch};
use mr_02_merkle_chain::{
    chain_type, index_chain, ChainError, ChainStore, IndexChain, IndexEntry, MerkleState,
};
use serde::Serialize;
use shared_types::encoding::encode;
use shared_types::{Account, DataEntry, Hash, Receipt, Signature, Transaction, TransactionStatus, Url};
use tracing::trace;

// =============================================================================
// READ-ONLY VIEW
// =============================================================================

/// Read-only access through a batch or the committed store.
pub struct View<'a> {
    arena: &'a LayeredBatch,
    id: Option<BatchId>,
    mark_power: u32,
}

impl<'a> View<'a> {
    pub(crate) fn new(arena: &'a LayeredBatch, id: Option<BatchId>, mark_power: u32) -> Self {
        Self {
            arena,
            id,
            mark_power,
        }
    }
}

impl ChainStore for View<'_> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, ChainError> {
        let value = match self.id {
            Some(id) => self.arena.get(id, key),
            None => self.arena.store().get(key).map_err(BatchError::from),
        };
        value.map_err(|e| ChainError::Storage(e.to_string()))
    }

    fn put(&mut self, _key: Vec<u8>, _value: Vec<u8>) -> Result<(), ChainError> {
        Err(ChainError::Storage(DatabaseError::ReadOnly.to_string()))
    }
}

impl LedgerReader for View<'_> {
    fn mark_power(&self) -> u32 {
        self.mark_power
    }

    fn scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, DatabaseError> {
        match self.id {
            Some(id) => Ok(self.arena.scan(id, prefix)?),
            None => Ok(self
                .arena
                .store()
                .prefix_scan(prefix)
                .map_err(BatchError::from)?),
        }
    }
}

// =============================================================================
// WRITABLE BATCH
// =============================================================================

/// Typed writes through one batch.
pub struct Batch<'a> {
    arena: &'a mut LayeredBatch,
    id: BatchId,
    mark_power: u32,
}

impl ChainStore for Batch<'_> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, ChainError> {
        self.arena
            .get(self.id, key)
            .map_err(|e| ChainError::Storage(e.to_string()))
    }

    fn put(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<(), ChainError> {
        self.arena
            .put(self.id, key, value)
            .map_err(|e| ChainError::Storage(e.to_string()))
    }
}

impl LedgerReader for Batch<'_> {
    fn mark_power(&self) -> u32 {
        self.mark_power
    }

    fn scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, DatabaseError> {
        Ok(self.arena.scan(self.id, prefix)?)
    }
}

impl<'a> Batch<'a> {
    pub(crate) fn new(arena: &'a mut LayeredBatch, id: BatchId, mark_power: u32) -> Self {
        Self {
            arena,
            id,
            mark_power,
        }
    }

    /// Handle of the underlying batch.
    pub fn id(&self) -> BatchId {
        self.id
    }

    fn write<T: Serialize + ?Sized>(&mut self, what: &'static str, key: Vec<u8>, value: &T) -> Result<(), DatabaseError> {
        let bytes = encode(what, value)?;
        self.arena.put(self.id, key, bytes)?;
        Ok(())
    }

    /// Recompute the account's state hash and buffer it for the trie.
    pub(crate) fn touch(&mut self, url: &Url) -> Result<(), DatabaseError> {
        let hash = self.account_state_hash(url)?;
        self.arena.put_state_entry(self.id, url.account_id(), hash)?;
        Ok(())
    }

    // =========================================================================
    // ACCOUNTS
    // =========================================================================

    /// Write account state.
    pub fn put_account(&mut self, account: &Account) -> Result<(), DatabaseError> {
        let url = account.url().clone();
        self.write("account", keys::account_main(&url).into_bytes(), account)?;
        self.touch(&url)
    }

    /// Add a transaction to an account's pending list.
    pub fn add_pending(&mut self, url: &Url, hash: Hash) -> Result<(), DatabaseError> {
        let mut pending = self.pending(url)?;
        if pending.contains(&hash) {
            return Ok(());
        }
        pending.push(hash);
        self.write("pending list", keys::account_pending(url).into_bytes(), &pending)?;
        self.touch(url)
    }

    /// Remove a transaction from an account's pending list.
    pub fn remove_pending(&mut self, url: &Url, hash: &Hash) -> Result<(), DatabaseError> {
        let mut pending = self.pending(url)?;
        let before = pending.len();
        pending.retain(|h| h != hash);
        if pending.len() == before {
            return Ok(());
        }
        self.write("pending list", keys::account_pending(url).into_bytes(), &pending)?;
        self.touch(url)
    }

    /// Replace an account's pending list.
    pub fn put_pending(&mut self, url: &Url, pending: &[Hash]) -> Result<(), DatabaseError> {
        self.write("pending list", keys::account_pending(url).into_bytes(), pending)?;
        self.touch(url)
    }

    /// Add an account to an identity's directory.
    pub fn add_directory_entry(&mut self, identity: &Url, member: &Url) -> Result<(), DatabaseError> {
        let mut directory = self.directory(identity)?;
        if let Err(i) = directory.binary_search(member) {
            directory.insert(i, member.clone());
            self.put_directory(identity, &directory)?;
        }
        Ok(())
    }

    /// Replace an identity's directory.
    pub fn put_directory(&mut self, identity: &Url, directory: &[Url]) -> Result<(), DatabaseError> {
        self.write("directory", keys::account_directory(identity).into_bytes(), directory)?;
        self.touch(identity)
    }

    /// Write a data entry. Returns its hash.
    pub fn put_data_entry(&mut self, url: &Url, entry: &DataEntry) -> Result<Hash, DatabaseError> {
        let hash = entry.hash();
        self.write("data entry", keys::data_entry(url, &hash).into_bytes(), entry)?;
        Ok(hash)
    }

    // =========================================================================
    // CHAINS
    // =========================================================================

    fn register_chain(&mut self, url: &Url, name: &str) -> Result<(), DatabaseError> {
        let mut chains = self.chains(url)?;
        match chains.binary_search_by(|c| c.name.as_str().cmp(name)) {
            Ok(_) => Ok(()),
            Err(i) => {
                chains.insert(
                    i,
                    ChainMeta {
                        name: name.to_string(),
                        chain_type: chain_type(name),
                    },
                );
                self.write("chain list", keys::account_chains(url).into_bytes(), &chains)
            }
        }
    }

    /// Append to an account chain. Returns the new entry's index.
    pub fn add_chain_entry(&mut self, url: &Url, name: &str, hash: Hash) -> Result<u64, DatabaseError> {
        self.register_chain(url, name)?;
        let chain = self.chain(url, name);
        let index = chain.add(self, hash)?;
        trace!(
            "[mr-04] {url}#{name}[{index}] = {}",
            hex::encode(&hash[..8])
        );
        self.touch(url)?;
        Ok(index)
    }

    /// Append an index entry for chain `name`.
    pub fn add_index_entry(&mut self, url: &Url, name: &str, entry: IndexEntry) -> Result<u64, DatabaseError> {
        self.register_chain(url, &index_chain(name))?;
        let chain = self.index_chain(url, name);
        let index = chain.append(self, entry)?;
        self.touch(url)?;
        Ok(index)
    }

    /// Restore a chain from its head state alone.
    pub fn restore_chain_head(&mut self, url: &Url, name: &str, state: &MerkleState) -> Result<(), DatabaseError> {
        self.register_chain(url, name)?;
        let chain = self.chain(url, name);
        chain.restore_head(self, state)?;
        self.touch(url)
    }

    /// Rebuild a chain from a snapshot record.
    pub(crate) fn restore_chain(&mut self, url: &Url, record: &ChainRecord) -> Result<(), DatabaseError> {
        let name = record.meta.name.as_str();
        self.register_chain(url, name)?;
        let chain = self.chain(url, name);
        if let Some(values) = &record.index_values {
            let index = IndexChain::new(chain);
            for value in values {
                index.append(self, *value)?;
            }
        } else if let Some(entries) = &record.entries {
            for hash in entries {
                chain.add(self, *hash)?;
            }
        } else {
            chain.restore_head(self, &record.head)?;
        }
        Ok(())
    }

    // =========================================================================
    // TRANSACTIONS
    // =========================================================================

    /// Store a transaction body.
    pub fn put_transaction(&mut self, transaction: &Transaction) -> Result<Hash, DatabaseError> {
        let hash = transaction.hash();
        self.write("transaction", keys::transaction_main(&hash).into_bytes(), transaction)?;
        Ok(hash)
    }

    /// Store a transaction status.
    pub fn put_status(&mut self, status: &TransactionStatus) -> Result<(), DatabaseError> {
        self.write(
            "transaction status",
            keys::transaction_status(&status.txid).into_bytes(),
            status,
        )
    }

    /// Add signatures to a transaction's set, skipping ones already held.
    /// Returns the number added.
    pub fn add_signatures(&mut self, hash: &Hash, signatures: &[Signature]) -> Result<usize, DatabaseError> {
        let mut held = self.signatures(hash)?;
        let before = held.len();
        for signature in signatures {
            if !held.contains(signature) {
                held.push(signature.clone());
            }
        }
        let added = held.len() - before;
        if added > 0 {
            self.write("signatures", keys::transaction_signatures(hash).into_bytes(), &held)?;
        }
        Ok(added)
    }

    /// Replace a transaction's signature set.
    pub fn put_signatures(&mut self, hash: &Hash, signatures: &[Signature]) -> Result<(), DatabaseError> {
        self.write("signatures", keys::transaction_signatures(hash).into_bytes(), signatures)
    }

    /// Record where a transaction was placed on a chain.
    pub fn add_transaction_chain(&mut self, hash: &Hash, entry: ChainIndexEntry) -> Result<(), DatabaseError> {
        let mut entries = self.transaction_chains(hash)?;
        if !entries.contains(&entry) {
            entries.push(entry);
            self.write("chain index entries", keys::transaction_chains(hash).into_bytes(), &entries)?;
        }
        Ok(())
    }

    /// Replace a transaction's chain placements.
    pub fn put_transaction_chains(&mut self, hash: &Hash, entries: &[ChainIndexEntry]) -> Result<(), DatabaseError> {
        self.write("chain index entries", keys::transaction_chains(hash).into_bytes(), entries)
    }

    /// Record synthetic transactions waiting on a root anchor.
    pub fn add_synthetic_for_anchor(&mut self, anchor: &Hash, hashes: &[Hash]) -> Result<(), DatabaseError> {
        let mut held = self.synthetic_for_anchor(anchor)?;
        for hash in hashes {
            if !held.contains(hash) {
                held.push(*hash);
            }
        }
        self.write("synthetic for anchor", keys::synthetic_for_anchor(anchor).into_bytes(), &held)
    }

    /// Remove and return the synthetic transactions waiting on `anchor`.
    pub fn take_synthetic_for_anchor(&mut self, anchor: &Hash) -> Result<Vec<Hash>, DatabaseError> {
        let held = self.synthetic_for_anchor(anchor)?;
        if !held.is_empty() {
            self.arena.delete(self.id, keys::synthetic_for_anchor(anchor).into_bytes())?;
        }
        Ok(held)
    }

    /// Keep a directory receipt under the partition anchor it starts from.
    pub fn put_directory_receipt(&mut self, receipt: &Receipt) -> Result<(), DatabaseError> {
        self.write("directory receipt", keys::directory_receipt(&receipt.start).into_bytes(), receipt)
    }
}
