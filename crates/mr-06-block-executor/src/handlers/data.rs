//! Data entries.

use super::{require_principal, wrong_principal, HandlerInput, TransactionHandler};
use crate::domain::entities::HandlerOutput;
use crate::domain::errors::ExecutorError;
use crate::service::context::ExecContext;
use mr_02_merkle_chain::DATA_CHAIN;
use shared_types::{Account, DataAccount, DataEntry, TransactionBody, TransactionResult, TransactionType, Url};

fn write_entry(ctx: &mut ExecContext<'_>, account: &Url, entry: &DataEntry) -> Result<HandlerOutput, ExecutorError> {
    if entry.data.is_empty() {
        return Err(ExecutorError::BadRequest("data entry is empty".into()));
    }
    let entry_hash = ctx.batch().put_data_entry(account, entry)?;
    ctx.add_chain_entry(account, DATA_CHAIN, entry_hash)?;
    Ok(HandlerOutput::result(TransactionResult::WriteData {
        account: account.clone(),
        entry_hash,
    }))
}

/// Writes an entry to a data account.
pub struct WriteData;

impl TransactionHandler for WriteData {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::WriteData
    }

    fn execute(&self, ctx: &mut ExecContext<'_>, mut input: HandlerInput<'_>) -> Result<HandlerOutput, ExecutorError> {
        let TransactionBody::WriteData { entry } = &input.transaction.body else {
            return Err(ExecutorError::Unsupported(input.transaction.transaction_type()));
        };
        let principal = require_principal(&mut input)?;
        if !matches!(principal, Account::DataAccount(_)) {
            return Err(wrong_principal(principal.url(), "data account"));
        }
        write_entry(ctx, principal.url(), entry)
    }
}

/// Writes an entry to one of the partition's own data accounts, creating
/// it under the operators book if needed. Never accepted from outside.
pub struct SystemWriteData;

impl TransactionHandler for SystemWriteData {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::SystemWriteData
    }

    fn allows_missing_principal(&self) -> bool {
        true
    }

    fn execute(&self, ctx: &mut ExecContext<'_>, input: HandlerInput<'_>) -> Result<HandlerOutput, ExecutorError> {
        let TransactionBody::SystemWriteData { entry } = &input.transaction.body else {
            return Err(ExecutorError::Unsupported(input.transaction.transaction_type()));
        };
        let url = input.principal_url().clone();
        if !ctx.node.is_system_account(&url) {
            return Err(ExecutorError::BadRequest(format!(
                "{url} is not under {}",
                ctx.node.url()
            )));
        }
        match &input.principal {
            Some(Account::DataAccount(_)) => {}
            Some(other) => return Err(wrong_principal(other.url(), "data account")),
            None => {
                ctx.create_account(Account::DataAccount(DataAccount {
                    url: url.clone(),
                    authority: ctx.node.id().operators_book_url(),
                }))?;
            }
        }
        write_entry(ctx, &url, entry)
    }
}
