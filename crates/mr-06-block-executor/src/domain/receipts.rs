//! # Receipt Builder
//!
//! Proves an account chain entry up to a root chain anchor of the
//! partition:
//!
//! 1. The chain's index finds the first anchor boundary at or after the
//!    entry: the chain height that was anchored and the root chain index
//!    the chain anchor landed at.
//! 2. The root index finds the block boundary at or after that root entry.
//! 3. Entry to chain anchor, then chain anchor to root anchor, composed.
//!
//! A partition's synthetic proof extended by a directory receipt ends at a
//! directory root anchor; see [`Receipt::combine`].

use super::errors::ExecutorError;
use mr_02_merkle_chain::ROOT_CHAIN;
use mr_04_ledger_database::{DatabaseError, LedgerReader};
use shared_types::{PartitionId, Receipt, Url};

/// Builds receipts from ledger records read through `R`.
pub struct ReceiptBuilder<'a, R: ?Sized> {
    reader: &'a R,
    ledger: Url,
}

impl<'a, R: LedgerReader + ?Sized> ReceiptBuilder<'a, R> {
    /// Builder for the chains of `partition`.
    pub fn new(reader: &'a R, partition: &PartitionId) -> Self {
        Self {
            reader,
            ledger: partition.ledger_url(),
        }
    }

    /// Proof from entry `index` of `account#chain` to the root anchor of
    /// the block that anchored it.
    pub fn build(&self, account: &Url, chain: &str, index: u64) -> Result<Receipt, ExecutorError> {
        let not_anchored = || ExecutorError::NotAnchored {
            account: account.clone(),
            chain: chain.to_string(),
            index,
        };

        let (_, boundary) = self
            .reader
            .index_chain(account, chain)
            .find(self.reader, index)
            .map_err(DatabaseError::from)?
            .ok_or_else(not_anchored)?;
        let chain_receipt = self
            .reader
            .chain_receipt(account, chain, index, boundary.source)?;
        if account == &self.ledger && chain == ROOT_CHAIN {
            return Ok(chain_receipt);
        }

        let (_, block) = self
            .reader
            .index_chain(&self.ledger, ROOT_CHAIN)
            .find(self.reader, boundary.anchor)
            .map_err(DatabaseError::from)?
            .ok_or_else(not_anchored)?;
        let root_receipt = self
            .reader
            .chain_receipt(&self.ledger, ROOT_CHAIN, boundary.anchor, block.source)?;
        Ok(chain_receipt.combine(&root_receipt)?)
    }
}
