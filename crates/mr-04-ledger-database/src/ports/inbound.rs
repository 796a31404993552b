//! # Ledger Reads
//!
//! [`LedgerReader`] is the typed read API over a batch or the committed
//! store. Implementors only provide raw access; every typed read is a
//! provided method.

use crate::domain::errors::DatabaseError;
use crate::domain::keys;
use crate::domain::records::{ChainIndexEntry, ChainMeta};
use mr_02_merkle_chain::{index_chain, ChainStore, IndexChain, IndexEntry, MerkleChain};
use serde::de::DeserializeOwned;
use shared_crypto::Sha256Hasher;
use shared_types::encoding::{decode, hash_of};
use shared_types::{
    Account, DataEntry, Hash, Receipt, Signature, Transaction, TransactionStatus, Url,
};

/// Typed reads over ledger records.
pub trait LedgerReader: ChainStore {
    /// Mark power of every chain.
    fn mark_power(&self) -> u32;

    /// Every visible record under `prefix`, in key order.
    fn scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, DatabaseError>;

    /// Read and decode a record.
    fn read<T: DeserializeOwned>(&self, what: &'static str, key: &[u8]) -> Result<Option<T>, DatabaseError> {
        match self.get(key)? {
            Some(bytes) => Ok(Some(decode(what, &bytes)?)),
            None => Ok(None),
        }
    }

    // =========================================================================
    // ACCOUNTS
    // =========================================================================

    /// Account state.
    fn account(&self, url: &Url) -> Result<Option<Account>, DatabaseError> {
        self.read("account", keys::account_main(url).as_bytes())
    }

    /// Account state, or `AccountNotFound`.
    fn require_account(&self, url: &Url) -> Result<Account, DatabaseError> {
        self.account(url)?
            .ok_or_else(|| DatabaseError::AccountNotFound(url.clone()))
    }

    /// Transactions pending on the account.
    fn pending(&self, url: &Url) -> Result<Vec<Hash>, DatabaseError> {
        Ok(self
            .read("pending list", keys::account_pending(url).as_bytes())?
            .unwrap_or_default())
    }

    /// Accounts under an identity.
    fn directory(&self, url: &Url) -> Result<Vec<Url>, DatabaseError> {
        Ok(self
            .read("directory", keys::account_directory(url).as_bytes())?
            .unwrap_or_default())
    }

    /// Chains the account owns, in name order.
    fn chains(&self, url: &Url) -> Result<Vec<ChainMeta>, DatabaseError> {
        Ok(self
            .read("chain list", keys::account_chains(url).as_bytes())?
            .unwrap_or_default())
    }

    /// Data entry by hash.
    fn data_entry(&self, url: &Url, hash: &Hash) -> Result<Option<DataEntry>, DatabaseError> {
        self.read("data entry", keys::data_entry(url, hash).as_bytes())
    }

    /// Hash committed to the state trie for an account.
    ///
    /// `SHA-256` over the hashes of the encoded state, directory and
    /// pending list, followed by each chain's anchor in name order.
    fn account_state_hash(&self, url: &Url) -> Result<Hash, DatabaseError> {
        let mut hasher = Sha256Hasher::new();
        hasher.update(hash_of(&self.account(url)?));
        hasher.update(hash_of(&self.directory(url)?));
        hasher.update(hash_of(&self.pending(url)?));
        for meta in self.chains(url)? {
            hasher.update(self.chain(url, &meta.name).anchor(self)?);
        }
        Ok(hasher.finalize())
    }

    // =========================================================================
    // CHAINS
    // =========================================================================

    /// Descriptor of an account chain.
    fn chain(&self, url: &Url, name: &str) -> MerkleChain {
        MerkleChain::new(keys::chain(url, name), self.mark_power())
    }

    /// Descriptor of the index chain of `name`.
    fn index_chain(&self, url: &Url, name: &str) -> IndexChain {
        IndexChain::new(self.chain(url, &index_chain(name)))
    }

    /// Chain height.
    fn chain_height(&self, url: &Url, name: &str) -> Result<u64, DatabaseError> {
        Ok(self.chain(url, name).height(self)?)
    }

    /// Chain entry.
    fn chain_entry(&self, url: &Url, name: &str, index: u64) -> Result<Hash, DatabaseError> {
        Ok(self.chain(url, name).entry(self, index)?)
    }

    /// Chain entries in `[start, end)`.
    fn chain_entries(
        &self,
        url: &Url,
        name: &str,
        start: u64,
        end: u64,
    ) -> Result<Vec<Hash>, DatabaseError> {
        Ok(self.chain(url, name).entries(self, start, end)?)
    }

    /// Index of an entry on a chain.
    fn chain_height_of(&self, url: &Url, name: &str, hash: &Hash) -> Result<Option<u64>, DatabaseError> {
        Ok(self.chain(url, name).height_of(self, hash)?)
    }

    /// Current chain anchor.
    fn chain_anchor(&self, url: &Url, name: &str) -> Result<Hash, DatabaseError> {
        Ok(self.chain(url, name).anchor(self)?)
    }

    /// Receipt from entry `from` to the anchor at `to + 1`.
    fn chain_receipt(&self, url: &Url, name: &str, from: u64, to: u64) -> Result<Receipt, DatabaseError> {
        Ok(self.chain(url, name).receipt(self, from, to)?)
    }

    /// Last index entry of `name`.
    fn last_index_entry(&self, url: &Url, name: &str) -> Result<Option<IndexEntry>, DatabaseError> {
        Ok(self.index_chain(url, name).last(self)?)
    }

    // =========================================================================
    // TRANSACTIONS
    // =========================================================================

    /// Transaction body.
    fn transaction(&self, hash: &Hash) -> Result<Option<Transaction>, DatabaseError> {
        self.read("transaction", keys::transaction_main(hash).as_bytes())
    }

    /// Transaction status, if recorded.
    fn status(&self, hash: &Hash) -> Result<Option<TransactionStatus>, DatabaseError> {
        self.read("transaction status", keys::transaction_status(hash).as_bytes())
    }

    /// Transaction status, or a fresh one.
    fn status_or_new(&self, hash: &Hash) -> Result<TransactionStatus, DatabaseError> {
        Ok(self
            .status(hash)?
            .unwrap_or_else(|| TransactionStatus::new(*hash)))
    }

    /// Signatures received for a transaction.
    fn signatures(&self, hash: &Hash) -> Result<Vec<Signature>, DatabaseError> {
        Ok(self
            .read("signatures", keys::transaction_signatures(hash).as_bytes())?
            .unwrap_or_default())
    }

    /// Chains a transaction was recorded on.
    fn transaction_chains(&self, hash: &Hash) -> Result<Vec<ChainIndexEntry>, DatabaseError> {
        Ok(self
            .read("chain index entries", keys::transaction_chains(hash).as_bytes())?
            .unwrap_or_default())
    }

    /// Synthetic transactions waiting on a root anchor.
    fn synthetic_for_anchor(&self, anchor: &Hash) -> Result<Vec<Hash>, DatabaseError> {
        Ok(self
            .read("synthetic for anchor", keys::synthetic_for_anchor(anchor).as_bytes())?
            .unwrap_or_default())
    }

    /// Receipt from a partition root anchor to the directory anchor that
    /// recorded it, once a directory anchor carrying it was applied.
    fn directory_receipt(&self, anchor: &Hash) -> Result<Option<Receipt>, DatabaseError> {
        self.read("directory receipt", keys::directory_receipt(anchor).as_bytes())
    }
}
