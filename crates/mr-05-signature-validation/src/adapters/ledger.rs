//! [`ValidationState`] over ledger records.

use crate::domain::errors::ValidationError;
use crate::ports::outbound::ValidationState;
use mr_02_merkle_chain::anchor_root_chain;
use mr_04_ledger_database::LedgerReader;
use shared_types::{Account, Hash, PartitionId, Url};

/// Validation state read through a batch or view.
pub struct LedgerState<'a, R: ?Sized> {
    reader: &'a R,
    anchor_pool: Url,
    directory_chain: String,
}

impl<'a, R: LedgerReader + ?Sized> LedgerState<'a, R> {
    /// State of `partition` read through `reader`.
    pub fn new(reader: &'a R, partition: &PartitionId) -> Self {
        Self {
            reader,
            anchor_pool: partition.anchor_pool_url(),
            directory_chain: anchor_root_chain(&PartitionId::directory()),
        }
    }
}

impl<R: LedgerReader + ?Sized> ValidationState for LedgerState<'_, R> {
    fn load_account(&self, url: &Url) -> Result<Option<Account>, ValidationError> {
        Ok(self.reader.account(url)?)
    }

    fn is_directory_anchor(&self, anchor: &Hash) -> Result<bool, ValidationError> {
        Ok(self
            .reader
            .chain_height_of(&self.anchor_pool, &self.directory_chain, anchor)?
            .is_some())
    }
}
