//! Read accessors over committed state.
//!
//! Queries never see the open block. Receipts are best effort: a chain
//! whose entry is not anchored yet reports its error without failing the
//! others.

use super::Executor;
use crate::domain::entities::{ChainReceipt, QueriedTransaction};
use crate::domain::errors::ExecutorError;
use crate::domain::receipts::ReceiptBuilder;
use mr_04_ledger_database::{LedgerReader, Snapshot, SnapshotHeader};
use shared_types::{Account, AnchorLedger, DataEntry, Hash, Receipt, SyntheticLedger, SystemLedger, Url};
use tracing::{debug, info};

impl Executor {
    /// Committed account.
    pub fn account(&self, url: &Url) -> Result<Option<Account>, ExecutorError> {
        Ok(self.db.view(None).account(url)?)
    }

    /// Height of `url#chain`.
    pub fn chain_height(&self, url: &Url, chain: &str) -> Result<u64, ExecutorError> {
        Ok(self.db.view(None).chain_height(url, chain)?)
    }

    /// Entry `index` of `url#chain`.
    pub fn chain_entry(&self, url: &Url, chain: &str, index: u64) -> Result<Hash, ExecutorError> {
        Ok(self.db.view(None).chain_entry(url, chain, index)?)
    }

    /// Entries `[start, end)` of `url#chain`.
    pub fn chain_entries(&self, url: &Url, chain: &str, start: u64, end: u64) -> Result<Vec<Hash>, ExecutorError> {
        Ok(self.db.view(None).chain_entries(url, chain, start, end)?)
    }

    /// Index of `hash` on `url#chain`.
    pub fn chain_height_of(&self, url: &Url, chain: &str, hash: &Hash) -> Result<Option<u64>, ExecutorError> {
        Ok(self.db.view(None).chain_height_of(url, chain, hash)?)
    }

    /// Transaction, status and signatures.
    pub fn transaction(&self, hash: &Hash) -> Result<Option<QueriedTransaction>, ExecutorError> {
        let view = self.db.view(None);
        let Some(transaction) = view.transaction(hash)? else {
            return Ok(None);
        };
        Ok(Some(QueriedTransaction {
            transaction,
            status: view.status_or_new(hash)?,
            signatures: view.signatures(hash)?,
        }))
    }

    /// Transactions waiting on `url`.
    pub fn pending(&self, url: &Url) -> Result<Vec<Hash>, ExecutorError> {
        Ok(self.db.view(None).pending(url)?)
    }

    /// Data entry stored on `url`.
    pub fn data_entry(&self, url: &Url, hash: &Hash) -> Result<Option<DataEntry>, ExecutorError> {
        Ok(self.db.view(None).data_entry(url, hash)?)
    }

    /// A receipt for every chain `hash` was recorded on.
    pub fn receipts(&self, hash: &Hash) -> Result<Vec<ChainReceipt>, ExecutorError> {
        let view = self.db.view(None);
        let builder = ReceiptBuilder::new(&view, self.node.id());
        let receipts: Vec<ChainReceipt> = view
            .transaction_chains(hash)?
            .into_iter()
            .map(|entry| {
                let receipt = builder
                    .build(&entry.account, &entry.chain, entry.index)
                    .map_err(|e| e.to_string());
                ChainReceipt {
                    account: entry.account,
                    chain: entry.chain,
                    index: entry.index,
                    receipt,
                }
            })
            .collect();
        debug!(
            "[mr-06] {} receipts for {}, {} failed",
            receipts.len(),
            hex::encode(&hash[..8]),
            receipts.iter().filter(|r| r.receipt.is_err()).count()
        );
        Ok(receipts)
    }

    /// Receipt for `url#chain[index]`, optionally extended by a directory
    /// receipt that starts at this partition's root anchor.
    pub fn receipt(
        &self,
        url: &Url,
        chain: &str,
        index: u64,
        directory: Option<&Receipt>,
    ) -> Result<Receipt, ExecutorError> {
        let view = self.db.view(None);
        let receipt = ReceiptBuilder::new(&view, self.node.id()).build(url, chain, index)?;
        match directory {
            Some(extension) => Ok(receipt.combine(extension)?),
            None => Ok(receipt),
        }
    }

    /// Committed state root.
    pub fn state_root(&self) -> Hash {
        self.db.bpt_root()
    }

    /// Proof of an account's state hash to the state root.
    pub fn state_proof(&self, url: &Url) -> Option<Receipt> {
        self.db.bpt_proof(url)
    }

    /// Block ledger.
    pub fn system_ledger(&self) -> Result<SystemLedger, ExecutorError> {
        let url = self.node.id().ledger_url();
        match self.account(&url)? {
            Some(Account::SystemLedger(ledger)) => Ok(ledger),
            _ => Err(ExecutorError::MissingSystemAccount(url)),
        }
    }

    /// Synthetic transaction counters.
    pub fn synthetic_ledger(&self) -> Result<SyntheticLedger, ExecutorError> {
        let url = self.node.id().synthetic_url();
        match self.account(&url)? {
            Some(Account::SyntheticLedger(ledger)) => Ok(ledger),
            _ => Err(ExecutorError::MissingSystemAccount(url)),
        }
    }

    /// Anchor counters.
    pub fn anchor_ledger(&self) -> Result<AnchorLedger, ExecutorError> {
        let url = self.node.id().anchor_pool_url();
        match self.account(&url)? {
            Some(Account::AnchorLedger(ledger)) => Ok(ledger),
            _ => Err(ExecutorError::MissingSystemAccount(url)),
        }
    }

    // =========================================================================
    // SNAPSHOTS
    // =========================================================================

    /// Collect committed state at the last committed block.
    pub fn collect_snapshot(&self) -> Result<Vec<u8>, ExecutorError> {
        let height = self.system_ledger()?.index;
        Ok(self
            .db
            .collect(self.node.id(), height, self.node.config.preserve_history)?)
    }

    /// Restore a snapshot into an empty executor.
    pub fn restore_snapshot(&mut self, bytes: &[u8]) -> Result<SnapshotHeader, ExecutorError> {
        if let Some(block) = &self.block {
            return Err(ExecutorError::BlockInProgress(block.index));
        }
        let partition = Snapshot::from_bytes(bytes)?.header.partition;
        if &partition != self.node.id() {
            return Err(ExecutorError::BadRequest(format!(
                "snapshot of {} cannot be restored into {}",
                partition,
                self.node.id()
            )));
        }
        let header = self.db.restore(bytes)?;
        info!("[mr-06] {} restored at block {}", header.partition, header.height);
        Ok(header)
    }
}
