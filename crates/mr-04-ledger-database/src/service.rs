//! # Ledger Database Service
//!
//! [`Database`] owns the batch arena and the in-memory state trie.
//!
//! ## Commit
//!
//! Committing a root batch folds its buffered account state hashes into
//! `bpt/<account id>` leaf records, writes everything to the store in one
//! atomic call, then applies the same updates to the trie. Child commits
//! only merge into their parent. On open, the trie is rebuilt from the
//! persisted leaves.
//!
//! ## Snapshots
//!
//! [`Database::collect`] reads the committed store; [`Database::restore`]
//! rebuilds a fresh database from a snapshot and rejects it if the
//! resulting state root differs from the header.

use crate::adapters::{Batch, View};
use crate::domain::errors::DatabaseError;
use crate::domain::keys;
use crate::domain::snapshot::{
    AccountRecord, ChainRecord, Snapshot, SnapshotHeader, SignatureRecord, TransactionRecord,
    SNAPSHOT_VERSION,
};
use crate::ports::inbound::LedgerReader;
use mr_01_layered_batch::{BatchError, BatchId, Key, KeyValueStore, LayeredBatch};
use mr_02_merkle_chain::{is_index_chain, IndexChain};
use mr_03_state_trie::StateTrie;
use shared_types::encoding::{decode, encode};
use shared_types::{DataEntry, Hash, PartitionId, Receipt, Url};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Ledger database.
pub struct Database {
    arena: LayeredBatch,
    trie: StateTrie,
    mark_power: u32,
}

impl Database {
    /// Open over a store, rebuilding the state trie from its leaves.
    pub fn open(store: Box<dyn KeyValueStore>, mark_power: u32) -> Result<Self, DatabaseError> {
        let arena = LayeredBatch::new(store);
        let mut leaves: Vec<(Hash, Hash)> = Vec::new();
        for (key, value) in arena
            .store()
            .prefix_scan(Key::new(keys::BPT).as_bytes())
            .map_err(BatchError::from)?
        {
            let account_id = leaf_account_id(&key)?;
            leaves.push((account_id, decode("state trie leaf", &value)?));
        }
        let trie = StateTrie::from_leaves(leaves);
        debug!("[mr-04] opened with {} state leaves", trie.len());
        Ok(Self {
            arena,
            trie,
            mark_power,
        })
    }

    /// Mark power of every chain.
    pub fn mark_power(&self) -> u32 {
        self.mark_power
    }

    // =========================================================================
    // BATCHES
    // =========================================================================

    /// Open a root batch.
    pub fn begin(&mut self, writable: bool) -> BatchId {
        self.arena.begin(writable)
    }

    /// Open a child batch.
    pub fn begin_child(&mut self, parent: BatchId, writable: bool) -> BatchId {
        self.arena.begin_child(parent, writable)
    }

    /// Typed writes through `id`.
    pub fn batch(&mut self, id: BatchId) -> Batch<'_> {
        Batch::new(&mut self.arena, id, self.mark_power)
    }

    /// Typed reads through `id`, or the committed store for `None`.
    pub fn view(&self, id: Option<BatchId>) -> View<'_> {
        View::new(&self.arena, id, self.mark_power)
    }

    /// True while `id` is open.
    pub fn is_open(&self, id: BatchId) -> bool {
        self.arena.is_open(id)
    }

    /// Commit a batch.
    pub fn commit(&mut self, id: BatchId) -> Result<(), DatabaseError> {
        if self.arena.parent(id).is_some() {
            self.arena.commit(id)?;
            return Ok(());
        }
        let updates = self.arena.take_state_updates(id);
        for (account_id, hash) in &updates {
            self.arena
                .put(id, keys::bpt_leaf(account_id).into_bytes(), encode("state trie leaf", hash)?)?;
        }
        self.arena.commit(id)?;
        self.trie.apply(updates);
        Ok(())
    }

    /// Discard a batch and everything under it.
    pub fn discard(&mut self, id: BatchId) {
        self.arena.discard(id);
    }

    // =========================================================================
    // STATE TRIE
    // =========================================================================

    /// Committed state root.
    pub fn bpt_root(&self) -> Hash {
        self.trie.root()
    }

    /// Committed state hash of an account.
    pub fn bpt_value(&self, url: &Url) -> Option<Hash> {
        self.trie.get(&url.account_id())
    }

    /// Proof of an account's committed state hash.
    pub fn bpt_proof(&self, url: &Url) -> Option<Receipt> {
        self.trie.proof(&url.account_id())
    }

    // =========================================================================
    // SNAPSHOTS
    // =========================================================================

    /// Collect the committed state into a snapshot.
    ///
    /// Without `preserve_history`, transaction chains are carried as bare
    /// heads. Index chains always keep their values.
    pub fn collect(
        &self,
        partition: &PartitionId,
        height: u64,
        preserve_history: bool,
    ) -> Result<Vec<u8>, DatabaseError> {
        let view = self.view(None);

        let mut accounts = Vec::new();
        for url in group_by_second(&view, keys::ACCOUNT)? {
            let url = Url::parse(&String::from_utf8_lossy(&url))
                .map_err(|e| DatabaseError::CorruptRecord(e.to_string()))?;
            accounts.push(collect_account(&view, url, preserve_history)?);
        }

        let mut transactions = Vec::new();
        let mut signatures = Vec::new();
        for hash in group_by_second(&view, keys::TRANSACTION)? {
            let hash: Hash = match hash.as_slice().try_into() {
                Ok(hash) => hash,
                Err(_) => {
                    warn!("[mr-04] skipping malformed transaction key");
                    continue;
                }
            };
            let transaction = view.transaction(&hash)?;
            let status = view.status(&hash)?;
            let chains = view.transaction_chains(&hash)?;
            if transaction.is_some() || status.is_some() || !chains.is_empty() {
                transactions.push(TransactionRecord {
                    hash,
                    transaction,
                    status,
                    chains,
                });
            }
            let held = view.signatures(&hash)?;
            if !held.is_empty() {
                signatures.push(SignatureRecord {
                    hash,
                    signatures: held,
                });
            }
        }

        let snapshot = Snapshot {
            header: SnapshotHeader {
                version: SNAPSHOT_VERSION,
                partition: partition.clone(),
                height,
                root_hash: self.bpt_root(),
            },
            transactions,
            signatures,
            accounts,
        };
        info!(
            "[mr-04] collected snapshot of {partition} at {height}: {} accounts, {} transactions",
            snapshot.accounts.len(),
            snapshot.transactions.len()
        );
        snapshot.to_bytes()
    }

    /// Restore a snapshot into this database, which must be empty.
    pub fn restore(&mut self, bytes: &[u8]) -> Result<SnapshotHeader, DatabaseError> {
        let snapshot = Snapshot::from_bytes(bytes)?;
        if !self.trie.is_empty() || self.has_records(keys::ACCOUNT)? || self.has_records(keys::TRANSACTION)? {
            return Err(DatabaseError::NotEmpty);
        }

        let id = self.arena.begin(true);
        if let Err(e) = self.write_snapshot(id, &snapshot) {
            self.arena.discard(id);
            return Err(e);
        }

        let actual = StateTrie::from_leaves(self.arena.state_updates(id).clone()).root();
        if actual != snapshot.header.root_hash {
            self.arena.discard(id);
            return Err(DatabaseError::RootMismatch {
                expected: snapshot.header.root_hash,
                actual,
            });
        }
        self.commit(id)?;
        info!(
            "[mr-04] restored snapshot of {} at {}",
            snapshot.header.partition, snapshot.header.height
        );
        Ok(snapshot.header)
    }

    fn write_snapshot(&mut self, id: BatchId, snapshot: &Snapshot) -> Result<(), DatabaseError> {
        let mut batch = self.batch(id);
        for record in &snapshot.accounts {
            let url = &record.url;
            if let Some(account) = &record.main {
                batch.put_account(account)?;
            }
            if !record.pending.is_empty() {
                batch.put_pending(url, &record.pending)?;
            }
            if !record.directory.is_empty() {
                batch.put_directory(url, &record.directory)?;
            }
            for chain in &record.chains {
                batch.restore_chain(url, chain)?;
            }
            for entry in &record.data {
                batch.put_data_entry(url, entry)?;
            }
            batch.touch(url)?;
        }
        for record in &snapshot.transactions {
            if let Some(transaction) = &record.transaction {
                batch.put_transaction(transaction)?;
            }
            if let Some(status) = &record.status {
                batch.put_status(status)?;
            }
            if !record.chains.is_empty() {
                batch.put_transaction_chains(&record.hash, &record.chains)?;
            }
        }
        for record in &snapshot.signatures {
            batch.put_signatures(&record.hash, &record.signatures)?;
        }
        Ok(())
    }

    fn has_records(&self, root: &str) -> Result<bool, DatabaseError> {
        Ok(!self.view(None).scan(Key::new(root).as_bytes())?.is_empty())
    }
}

fn leaf_account_id(key: &[u8]) -> Result<Hash, DatabaseError> {
    Key::components(key)
        .and_then(|parts| parts.get(1).and_then(|id| <Hash>::try_from(*id).ok()))
        .ok_or_else(|| DatabaseError::CorruptRecord("malformed state trie leaf key".into()))
}

/// Distinct second key components under `root`, in key order.
fn group_by_second<R: LedgerReader>(reader: &R, root: &str) -> Result<Vec<Vec<u8>>, DatabaseError> {
    let mut seen = BTreeSet::new();
    for (key, _) in reader.scan(Key::new(root).as_bytes())? {
        if let Some(second) = Key::components(&key).and_then(|parts| parts.get(1).map(|p| p.to_vec())) {
            seen.insert(second);
        }
    }
    Ok(seen.into_iter().collect())
}

fn collect_account<R: LedgerReader>(
    reader: &R,
    url: Url,
    preserve_history: bool,
) -> Result<AccountRecord, DatabaseError> {
    let mut chains = Vec::new();
    for meta in reader.chains(&url)? {
        let chain = reader.chain(&url, &meta.name);
        let head = chain.head(reader)?;
        let (entries, index_values) = if is_index_chain(&meta.name) {
            let index = IndexChain::new(chain);
            let values = (0..head.count)
                .map(|i| index.get(reader, i))
                .collect::<Result<Vec<_>, _>>()?;
            (None, Some(values))
        } else if preserve_history {
            (Some(chain.entries(reader, 0, head.count)?), None)
        } else {
            (None, None)
        };
        chains.push(ChainRecord {
            meta,
            head,
            entries,
            index_values,
        });
    }

    let mut data = Vec::new();
    for (_, value) in reader.scan(keys::data_entries(&url).as_bytes())? {
        data.push(decode::<DataEntry>("data entry", &value)?);
    }

    Ok(AccountRecord {
        main: reader.account(&url)?,
        pending: reader.pending(&url)?,
        directory: reader.directory(&url)?,
        chains,
        data,
        url,
    })
}
