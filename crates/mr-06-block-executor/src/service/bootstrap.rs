//! Genesis: system accounts and the operators key book.

use super::Executor;
use crate::domain::errors::ExecutorError;
use mr_04_ledger_database::LedgerReader;
use shared_types::{
    Account, AnchorLedger, Hash, Identity, KeyBook, KeyEntry, KeyPage, SyntheticLedger, SystemLedger,
};
use tracing::{debug, info};

impl Executor {
    /// Create the partition's system accounts plus every account in
    /// `accounts` that routes here, and commit. Returns the state root.
    pub fn bootstrap(&mut self, accounts: &[Account]) -> Result<Hash, ExecutorError> {
        if let Some(block) = &self.block {
            return Err(ExecutorError::BlockInProgress(block.index));
        }
        let id = self.node.id().clone();
        if self.db.view(None).account(&id.ledger_url())?.is_some() {
            return Err(ExecutorError::AlreadyExists(id.ledger_url()));
        }

        let validators: Vec<KeyEntry> = self
            .node
            .network
            .partition(&id)
            .map(|p| p.validators.clone())
            .unwrap_or_default()
            .into_iter()
            .map(|key_hash| KeyEntry {
                key_hash,
                delegate: None,
            })
            .collect();
        let threshold = self.node.network.validator_threshold(&id).min(validators.len().max(1) as u64);

        let mut genesis = vec![
            Account::Identity(Identity {
                url: id.url(),
                authority: id.operators_book_url(),
            }),
            Account::KeyBook(KeyBook {
                url: id.operators_book_url(),
                page_count: 1,
            }),
            Account::KeyPage(KeyPage {
                url: id.operators_page_url(),
                version: 1,
                accept_threshold: threshold,
                credit_balance: 0,
                keys: validators,
            }),
            Account::SystemLedger(SystemLedger::new(id.ledger_url())),
            Account::SyntheticLedger(SyntheticLedger::new(id.synthetic_url())),
            Account::AnchorLedger(AnchorLedger::new(id.anchor_pool_url())),
        ];
        for account in accounts {
            if self.node.is_local(account.url())? {
                genesis.push(account.clone());
            }
        }

        let batch_id = self.db.begin(true);
        let result = (|| -> Result<(), ExecutorError> {
            let mut batch = self.db.batch(batch_id);
            for account in &genesis {
                let url = account.url();
                batch.put_account(account)?;
                if !url.is_root_identity() {
                    batch.add_directory_entry(&url.root_identity(), url)?;
                }
                debug!("[mr-06] Genesis account {}", url);
            }
            Ok(())
        })();
        if let Err(e) = result {
            self.db.discard(batch_id);
            return Err(e);
        }
        self.db.commit(batch_id)?;

        let root = self.db.bpt_root();
        info!(
            "[mr-06] {} bootstrapped with {} accounts, root {}",
            id,
            genesis.len(),
            hex::encode(&root[..8])
        );
        Ok(root)
    }
}
