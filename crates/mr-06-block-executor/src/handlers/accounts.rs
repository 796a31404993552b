//! Accounts under an identity, and key management.

use super::{require_principal, wrong_principal, HandlerInput, TransactionHandler};
use crate::domain::entities::HandlerOutput;
use crate::domain::errors::ExecutorError;
use crate::service::context::ExecContext;
use shared_types::{
    Account, DataAccount, Hash, KeyBook, KeyEntry, KeyPage, KeyPageOperation, TokenAccount, TransactionBody,
    TransactionResult, TransactionType, Url,
};
use tracing::debug;

/// The identity that will own `url`, and its authority.
fn owning_identity(input: &mut HandlerInput<'_>, url: &Url) -> Result<Url, ExecutorError> {
    let principal = require_principal(input)?;
    let Account::Identity(identity) = &principal else {
        return Err(wrong_principal(principal.url(), "identity"));
    };
    if !url.is_child_of(&identity.url) {
        return Err(ExecutorError::BadRequest(format!(
            "{url} is not directly under {}",
            identity.url
        )));
    }
    Ok(identity.authority.clone())
}

fn created(urls: Vec<Url>) -> HandlerOutput {
    HandlerOutput::result(TransactionResult::CreatedAccounts(urls))
}

/// Creates a token account.
pub struct CreateTokenAccount;

impl TransactionHandler for CreateTokenAccount {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::CreateTokenAccount
    }

    fn execute(&self, ctx: &mut ExecContext<'_>, mut input: HandlerInput<'_>) -> Result<HandlerOutput, ExecutorError> {
        let TransactionBody::CreateTokenAccount { url, token_url } = &input.transaction.body else {
            return Err(ExecutorError::Unsupported(input.transaction.transaction_type()));
        };
        let authority = owning_identity(&mut input, url)?;
        if token_url.is_lite() {
            return Err(ExecutorError::BadRequest(format!("{token_url} is not a token issuer")));
        }
        let url = ctx.create_account(Account::TokenAccount(TokenAccount {
            url: url.clone(),
            authority,
            token_url: token_url.clone(),
            balance: 0,
        }))?;
        Ok(created(vec![url]))
    }
}

/// Creates a data account.
pub struct CreateDataAccount;

impl TransactionHandler for CreateDataAccount {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::CreateDataAccount
    }

    fn execute(&self, ctx: &mut ExecContext<'_>, mut input: HandlerInput<'_>) -> Result<HandlerOutput, ExecutorError> {
        let TransactionBody::CreateDataAccount { url } = &input.transaction.body else {
            return Err(ExecutorError::Unsupported(input.transaction.transaction_type()));
        };
        let authority = owning_identity(&mut input, url)?;
        let url = ctx.create_account(Account::DataAccount(DataAccount {
            url: url.clone(),
            authority,
        }))?;
        Ok(created(vec![url]))
    }
}

/// Creates a key book and its first page.
pub struct CreateKeyBook;

impl TransactionHandler for CreateKeyBook {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::CreateKeyBook
    }

    fn execute(&self, ctx: &mut ExecContext<'_>, mut input: HandlerInput<'_>) -> Result<HandlerOutput, ExecutorError> {
        let TransactionBody::CreateKeyBook { url, key_hash } = &input.transaction.body else {
            return Err(ExecutorError::Unsupported(input.transaction.transaction_type()));
        };
        owning_identity(&mut input, url)?;
        let book = ctx.create_account(Account::KeyBook(KeyBook {
            url: url.clone(),
            page_count: 1,
        }))?;
        let page = ctx.create_account(Account::KeyPage(KeyPage {
            url: url.join("1"),
            version: 1,
            accept_threshold: 1,
            credit_balance: 0,
            keys: vec![KeyEntry::key(*key_hash)],
        }))?;
        Ok(created(vec![book, page]))
    }
}

/// Adds the next page to a key book.
pub struct CreateKeyPage;

impl TransactionHandler for CreateKeyPage {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::CreateKeyPage
    }

    fn execute(&self, ctx: &mut ExecContext<'_>, mut input: HandlerInput<'_>) -> Result<HandlerOutput, ExecutorError> {
        let TransactionBody::CreateKeyPage { keys } = &input.transaction.body else {
            return Err(ExecutorError::Unsupported(input.transaction.transaction_type()));
        };
        let mut principal = require_principal(&mut input)?;
        let Account::KeyBook(book) = &mut principal else {
            return Err(wrong_principal(principal.url(), "key book"));
        };
        if keys.is_empty() {
            return Err(ExecutorError::BadRequest("a key page needs at least one key".into()));
        }
        book.page_count += 1;
        let page_url = book.url.join(&book.page_count.to_string());
        let page = ctx.create_account(Account::KeyPage(KeyPage {
            url: page_url,
            version: 1,
            accept_threshold: 1,
            credit_balance: 0,
            keys: keys.clone(),
        }))?;
        ctx.put_account(&principal)?;
        Ok(created(vec![page]))
    }
}

/// Mutates a key page.
pub struct UpdateKeyPage;

impl UpdateKeyPage {
    fn find(page: &KeyPage, key_hash: &Hash) -> Result<usize, ExecutorError> {
        page.keys
            .iter()
            .position(|e| e.delegate.is_none() && &e.key_hash == key_hash)
            .ok_or_else(|| {
                ExecutorError::BadRequest(format!(
                    "{} has no key {}",
                    page.url,
                    hex::encode(&key_hash[..8])
                ))
            })
    }

    fn contains(page: &KeyPage, entry: &KeyEntry) -> bool {
        page.keys.iter().any(|e| match (&entry.delegate, &e.delegate) {
            (Some(a), Some(b)) => a == b,
            (None, None) => e.key_hash == entry.key_hash,
            _ => false,
        })
    }

    fn apply(page: &mut KeyPage, operation: &KeyPageOperation) -> Result<(), ExecutorError> {
        match operation {
            KeyPageOperation::Add(entry) => {
                if Self::contains(page, entry) {
                    return Err(ExecutorError::BadRequest(format!("entry is already on {}", page.url)));
                }
                page.keys.push(entry.clone());
            }
            KeyPageOperation::Remove { key_hash } => {
                let i = Self::find(page, key_hash)?;
                if page.keys.len() == 1 {
                    return Err(ExecutorError::BadRequest(format!(
                        "cannot remove the last key of {}",
                        page.url
                    )));
                }
                page.keys.remove(i);
                page.accept_threshold = page.accept_threshold.min(page.keys.len() as u64);
            }
            KeyPageOperation::Update {
                old_key_hash,
                new_entry,
            } => {
                let i = Self::find(page, old_key_hash)?;
                if Self::contains(page, new_entry) {
                    return Err(ExecutorError::BadRequest(format!("entry is already on {}", page.url)));
                }
                page.keys[i] = new_entry.clone();
            }
            KeyPageOperation::SetThreshold(threshold) => {
                if *threshold == 0 || *threshold > page.keys.len() as u64 {
                    return Err(ExecutorError::BadRequest(format!(
                        "threshold {threshold} is out of range for {} keys",
                        page.keys.len()
                    )));
                }
                page.accept_threshold = *threshold;
            }
        }
        if operation.mutates_keys() {
            page.version += 1;
        }
        Ok(())
    }
}

impl TransactionHandler for UpdateKeyPage {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::UpdateKeyPage
    }

    fn execute(&self, ctx: &mut ExecContext<'_>, mut input: HandlerInput<'_>) -> Result<HandlerOutput, ExecutorError> {
        let TransactionBody::UpdateKeyPage { operation } = &input.transaction.body else {
            return Err(ExecutorError::Unsupported(input.transaction.transaction_type()));
        };
        let mut principal = require_principal(&mut input)?;
        let Account::KeyPage(page) = &mut principal else {
            return Err(wrong_principal(principal.url(), "key page"));
        };
        Self::apply(page, operation)?;
        debug!("[mr-06] {} is now at version {}", page.url, page.version);
        ctx.put_account(&principal)?;
        Ok(HandlerOutput::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(keys: &[u8]) -> KeyPage {
        KeyPage {
            url: Url::parse("acc://alice/book/1").unwrap(),
            version: 1,
            accept_threshold: 1,
            credit_balance: 0,
            keys: keys.iter().map(|k| KeyEntry::key([*k; 32])).collect(),
        }
    }

    #[test]
    fn test_key_changes_bump_version() {
        let mut p = page(&[1]);
        UpdateKeyPage::apply(&mut p, &KeyPageOperation::Add(KeyEntry::key([2; 32]))).unwrap();
        assert_eq!((p.keys.len(), p.version), (2, 2));

        UpdateKeyPage::apply(&mut p, &KeyPageOperation::SetThreshold(2)).unwrap();
        assert_eq!((p.accept_threshold, p.version), (2, 2));

        UpdateKeyPage::apply(&mut p, &KeyPageOperation::Remove { key_hash: [1; 32] }).unwrap();
        assert_eq!((p.keys.len(), p.accept_threshold, p.version), (1, 1, 3));
    }

    #[test]
    fn test_rejected_operations_leave_page_alone() {
        let mut p = page(&[1, 2]);
        let before = p.clone();
        assert!(UpdateKeyPage::apply(&mut p, &KeyPageOperation::Add(KeyEntry::key([2; 32]))).is_err());
        assert!(UpdateKeyPage::apply(&mut p, &KeyPageOperation::SetThreshold(3)).is_err());
        assert!(UpdateKeyPage::apply(&mut p, &KeyPageOperation::SetThreshold(0)).is_err());
        assert!(UpdateKeyPage::apply(&mut p, &KeyPageOperation::Remove { key_hash: [9; 32] }).is_err());
        assert_eq!(p, before);

        let mut single = page(&[1]);
        assert!(UpdateKeyPage::apply(&mut single, &KeyPageOperation::Remove { key_hash: [1; 32] }).is_err());
    }

    #[test]
    fn test_update_replaces_entry_in_place() {
        let mut p = page(&[1, 2]);
        let delegate = KeyEntry::delegate(Url::parse("acc://bob/book").unwrap());
        UpdateKeyPage::apply(
            &mut p,
            &KeyPageOperation::Update {
                old_key_hash: [1; 32],
                new_entry: delegate.clone(),
            },
        )
        .unwrap();
        assert_eq!(p.keys[0], delegate);
        assert_eq!(p.version, 2);
    }
}
