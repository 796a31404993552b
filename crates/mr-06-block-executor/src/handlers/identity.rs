//! Identity creation.
//!
//! `CreateIdentity` runs where its principal lives and produces a
//! `SyntheticCreateIdentity` addressed to the new identity, which creates
//! the identity, its key book and first page wherever the new URL routes.

use super::{is_under, require_principal, unset_origin, wrong_principal, HandlerInput, TransactionHandler};
use crate::domain::entities::HandlerOutput;
use crate::domain::errors::ExecutorError;
use crate::service::context::ExecContext;
use shared_types::{
    Account, Identity, KeyBook, KeyEntry, KeyPage, Transaction, TransactionBody, TransactionResult,
    TransactionType,
};
use tracing::debug;

/// Creates an identity with a key book and first page.
pub struct CreateIdentity;

impl TransactionHandler for CreateIdentity {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::CreateIdentity
    }

    fn execute(&self, _ctx: &mut ExecContext<'_>, mut input: HandlerInput<'_>) -> Result<HandlerOutput, ExecutorError> {
        let TransactionBody::CreateIdentity {
            url,
            key_hash,
            key_book_url,
        } = &input.transaction.body
        else {
            return Err(ExecutorError::Unsupported(input.transaction.transaction_type()));
        };
        let principal = require_principal(&mut input)?;
        match &principal {
            Account::LiteIdentity(_) if url.is_root_identity() => {}
            Account::Identity(parent) if url.is_child_of(&parent.url) => {}
            Account::LiteIdentity(_) | Account::Identity(_) => {
                return Err(ExecutorError::BadRequest(format!(
                    "{url} cannot be created by {}",
                    principal.url()
                )))
            }
            _ => return Err(wrong_principal(principal.url(), "identity")),
        }
        if url.is_lite() {
            return Err(ExecutorError::BadRequest(format!("{url} is a lite address")));
        }
        if !key_book_url.is_child_of(url) {
            return Err(ExecutorError::BadRequest(format!(
                "key book {key_book_url} is not under {url}"
            )));
        }

        let accounts = vec![
            Account::Identity(Identity {
                url: url.clone(),
                authority: key_book_url.clone(),
            }),
            Account::KeyBook(KeyBook {
                url: key_book_url.clone(),
                page_count: 1,
            }),
            Account::KeyPage(KeyPage {
                url: key_book_url.join("1"),
                version: 1,
                accept_threshold: 1,
                credit_balance: 0,
                keys: vec![KeyEntry::key(*key_hash)],
            }),
        ];
        let create = Transaction::new(
            url.clone(),
            [0u8; 32],
            TransactionBody::SyntheticCreateIdentity {
                origin: unset_origin(principal.url()),
                accounts,
            },
        );
        Ok(HandlerOutput::default().produce(create))
    }
}

/// Creates the accounts carried by an identity creation.
pub struct SyntheticCreateIdentity;

impl TransactionHandler for SyntheticCreateIdentity {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::SyntheticCreateIdentity
    }

    fn allows_missing_principal(&self) -> bool {
        true
    }

    fn execute(&self, ctx: &mut ExecContext<'_>, input: HandlerInput<'_>) -> Result<HandlerOutput, ExecutorError> {
        let TransactionBody::SyntheticCreateIdentity { accounts, .. } = &input.transaction.body else {
            return Err(ExecutorError::Unsupported(input.transaction.transaction_type()));
        };
        let root = input.principal_url();
        let mut created = Vec::with_capacity(accounts.len());
        for account in accounts {
            let url = account.url();
            if !is_under(url, root) {
                return Err(ExecutorError::BadRequest(format!("{url} is not under {root}")));
            }
            created.push(ctx.create_account(account.clone())?);
        }
        debug!("[mr-06] Created {} accounts under {}", created.len(), root);
        Ok(HandlerOutput::result(TransactionResult::CreatedAccounts(created)))
    }
}
