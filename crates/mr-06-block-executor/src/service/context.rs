//! # Execution Context
//!
//! [`NodeContext`] is what a node knows that never changes between
//! blocks. [`ExecContext`] is one batch scope within the open block:
//! the delivery scope, or a handler's body scope below it.

use crate::config::{ExecutorConfig, PartitionDescriptor};
use crate::domain::entities::{BlockMark, BlockState};
use crate::domain::errors::ExecutorError;
use crate::handlers::HandlerTable;
use mr_01_layered_batch::BatchId;
use mr_04_ledger_database::{Batch, Database, LedgerReader, View};
use mr_05_signature_validation::{AccountRouter, SignatureValidator, SigningKey};
use shared_types::{
    Account, AnchorLedger, Hash, NetworkDefinition, PartitionId, SyntheticLedger, SystemLedger, Url,
};
use std::sync::Arc;

/// Per-node configuration and collaborators.
pub struct NodeContext {
    /// This node's partition.
    pub partition: PartitionDescriptor,
    /// Executor configuration.
    pub config: ExecutorConfig,
    /// Every partition and its validators.
    pub network: Arc<NetworkDefinition>,
    /// Account routing.
    pub router: Arc<dyn AccountRouter>,
    /// Handlers by transaction type.
    pub handlers: Arc<HandlerTable>,
    /// Signature validator for this partition.
    pub validator: SignatureValidator,
    /// Validator key, signing as the partition's operators page.
    pub node_key: SigningKey,
}

impl NodeContext {
    /// Partition id.
    pub fn id(&self) -> &PartitionId {
        &self.partition.id
    }

    /// Partition URL.
    pub fn url(&self) -> Url {
        self.partition.id.url()
    }

    /// True on the directory.
    pub fn is_directory(&self) -> bool {
        self.partition.is_directory()
    }

    /// Partition owning `url`.
    pub fn route(&self, url: &Url) -> Result<PartitionId, ExecutorError> {
        Ok(self.router.route_account(url)?)
    }

    /// True if `url` lives on this partition.
    pub fn is_local(&self, url: &Url) -> Result<bool, ExecutorError> {
        Ok(&self.route(url)? == self.id())
    }

    /// True for accounts under this partition's own authority.
    pub fn is_system_account(&self, url: &Url) -> bool {
        PartitionId::from_url(url).as_ref() == Some(self.id())
    }
}

impl std::fmt::Debug for NodeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeContext")
            .field("partition", &self.partition)
            .field("handlers", &self.handlers.len())
            .finish_non_exhaustive()
    }
}

/// One batch scope of the open block.
pub struct ExecContext<'a> {
    /// Node configuration.
    pub node: &'a NodeContext,
    /// Open block.
    pub block: &'a mut BlockState,
    db: &'a mut Database,
    id: BatchId,
    mark: BlockMark,
}

impl<'a> ExecContext<'a> {
    pub(crate) fn new(node: &'a NodeContext, db: &'a mut Database, id: BatchId, block: &'a mut BlockState) -> Self {
        let mark = block.mark();
        Self {
            node,
            block,
            db,
            id,
            mark,
        }
    }

    /// Batch handle of this scope.
    pub fn id(&self) -> BatchId {
        self.id
    }

    /// Typed writes through this scope.
    pub fn batch(&mut self) -> Batch<'_> {
        self.db.batch(self.id)
    }

    /// Typed reads through this scope.
    pub fn view(&self) -> View<'_> {
        self.db.view(Some(self.id))
    }

    /// Open a child scope.
    pub(crate) fn child(&mut self) -> ExecContext<'_> {
        let id = self.db.begin_child(self.id, true);
        ExecContext {
            node: self.node,
            mark: self.block.mark(),
            block: &mut *self.block,
            db: &mut *self.db,
            id,
        }
    }

    /// Merge this scope into its parent.
    pub(crate) fn commit(self) -> Result<(), ExecutorError> {
        self.db.commit(self.id)?;
        Ok(())
    }

    /// Drop everything written in this scope, including work it queued on
    /// the block.
    pub(crate) fn discard(self) {
        self.block.rewind(&self.mark);
        self.db.discard(self.id);
    }

    // =========================================================================
    // ACCOUNTS
    // =========================================================================

    /// Load an account.
    pub fn account(&self, url: &Url) -> Result<Option<Account>, ExecutorError> {
        Ok(self.view().account(url)?)
    }

    /// Write an account.
    pub fn put_account(&mut self, account: &Account) -> Result<(), ExecutorError> {
        self.batch().put_account(account)?;
        Ok(())
    }

    /// Create an account that must not exist yet, listing it in its root
    /// identity's directory.
    pub fn create_account(&mut self, account: Account) -> Result<Url, ExecutorError> {
        let url = account.url().clone();
        if self.account(&url)?.is_some() {
            return Err(ExecutorError::AlreadyExists(url));
        }
        self.put_account(&account)?;
        if !url.is_root_identity() {
            self.batch().add_directory_entry(&url.root_identity(), &url)?;
        }
        Ok(url)
    }

    /// Append to a chain and mark it for anchoring at end of block.
    pub fn add_chain_entry(&mut self, url: &Url, chain: &str, hash: Hash) -> Result<u64, ExecutorError> {
        let index = self.batch().add_chain_entry(url, chain, hash)?;
        self.block.touch(url, chain);
        Ok(index)
    }

    // =========================================================================
    // SYSTEM LEDGERS
    // =========================================================================

    /// Block ledger.
    pub fn system_ledger(&self) -> Result<SystemLedger, ExecutorError> {
        let url = self.node.id().ledger_url();
        match self.account(&url)? {
            Some(Account::SystemLedger(ledger)) => Ok(ledger),
            _ => Err(ExecutorError::MissingSystemAccount(url)),
        }
    }

    /// Synthetic transaction ledger.
    pub fn synthetic_ledger(&self) -> Result<SyntheticLedger, ExecutorError> {
        let url = self.node.id().synthetic_url();
        match self.account(&url)? {
            Some(Account::SyntheticLedger(ledger)) => Ok(ledger),
            _ => Err(ExecutorError::MissingSystemAccount(url)),
        }
    }

    /// Anchor ledger, kept on the anchor pool account.
    pub fn anchor_ledger(&self) -> Result<AnchorLedger, ExecutorError> {
        let url = self.node.id().anchor_pool_url();
        match self.account(&url)? {
            Some(Account::AnchorLedger(ledger)) => Ok(ledger),
            _ => Err(ExecutorError::MissingSystemAccount(url)),
        }
    }
}
