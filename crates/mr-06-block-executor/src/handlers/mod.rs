//! # Transaction Handlers
//!
//! One handler per executable transaction type. A handler reads and writes
//! through the body scope it is given and returns what it produced; the
//! pipeline decides whether the scope is kept.
//!
//! | Module | Types |
//! |--------|-------|
//! | `identity` | CreateIdentity, SyntheticCreateIdentity |
//! | `accounts` | CreateTokenAccount, CreateDataAccount, CreateKeyBook, CreateKeyPage, UpdateKeyPage |
//! | `tokens` | SendTokens, AddCredits, BurnTokens, SyntheticDepositTokens, SyntheticDepositCredits, SyntheticBurnTokens |
//! | `data` | WriteData, SystemWriteData |
//! | `anchors` | DirectoryAnchor, PartitionAnchor |

pub mod accounts;
pub mod anchors;
pub mod data;
pub mod identity;
pub mod tokens;

use crate::domain::entities::HandlerOutput;
use crate::domain::errors::ExecutorError;
use crate::service::context::ExecContext;
use shared_types::{Account, SyntheticOrigin, Transaction, TransactionStatus, TransactionType, Url};
use std::collections::HashMap;

/// What a handler is given besides its scope.
#[derive(Debug)]
pub struct HandlerInput<'r> {
    /// Transaction being executed.
    pub transaction: &'r Transaction,
    /// Its status so far.
    pub status: &'r TransactionStatus,
    /// Principal account, if it exists.
    pub principal: Option<Account>,
}

impl HandlerInput<'_> {
    /// Principal URL.
    pub fn principal_url(&self) -> &Url {
        self.transaction.principal()
    }
}

/// Executes one transaction type.
pub trait TransactionHandler: Send + Sync {
    /// Type handled.
    fn transaction_type(&self) -> TransactionType;

    /// True if the principal may not exist yet.
    fn allows_missing_principal(&self) -> bool {
        false
    }

    /// Apply the body.
    fn execute(&self, ctx: &mut ExecContext<'_>, input: HandlerInput<'_>) -> Result<HandlerOutput, ExecutorError>;
}

/// Handlers by transaction type.
pub struct HandlerTable {
    handlers: HashMap<TransactionType, Box<dyn TransactionHandler>>,
}

impl HandlerTable {
    /// Table from a list; later entries replace earlier ones of the same type.
    pub fn new(handlers: Vec<Box<dyn TransactionHandler>>) -> Self {
        let handlers = handlers
            .into_iter()
            .map(|h| (h.transaction_type(), h))
            .collect();
        Self { handlers }
    }

    /// Every built-in handler.
    pub fn standard() -> Self {
        Self::new(standard_handlers())
    }

    /// Handler for `txn_type`.
    pub fn get(&self, txn_type: TransactionType) -> Option<&dyn TransactionHandler> {
        self.handlers.get(&txn_type).map(|h| h.as_ref())
    }

    /// True if `txn_type` has a handler.
    pub fn contains(&self, txn_type: TransactionType) -> bool {
        self.handlers.contains_key(&txn_type)
    }

    /// Number of handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// True if empty.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for HandlerTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// Built-in handlers.
pub fn standard_handlers() -> Vec<Box<dyn TransactionHandler>> {
    vec![
        Box::new(identity::CreateIdentity),
        Box::new(identity::SyntheticCreateIdentity),
        Box::new(accounts::CreateTokenAccount),
        Box::new(accounts::CreateDataAccount),
        Box::new(accounts::CreateKeyBook),
        Box::new(accounts::CreateKeyPage),
        Box::new(accounts::UpdateKeyPage),
        Box::new(tokens::SendTokens),
        Box::new(tokens::AddCredits),
        Box::new(tokens::BurnTokens),
        Box::new(tokens::SyntheticDepositTokens),
        Box::new(tokens::SyntheticDepositCredits),
        Box::new(tokens::SyntheticBurnTokens),
        Box::new(data::WriteData),
        Box::new(data::SystemWriteData),
        Box::new(anchors::DirectoryAnchor),
        Box::new(anchors::PartitionAnchor),
    ]
}

/// Origin of a produced transaction before the producer fills it in.
pub(crate) fn unset_origin(source: &Url) -> SyntheticOrigin {
    SyntheticOrigin {
        cause: [0u8; 32],
        source: source.clone(),
        initiator: None,
        fee_refund: 0,
    }
}

/// Principal, or `PrincipalNotFound`.
pub(crate) fn require_principal(input: &mut HandlerInput<'_>) -> Result<Account, ExecutorError> {
    input
        .principal
        .take()
        .ok_or_else(|| ExecutorError::PrincipalNotFound(input.transaction.principal().clone()))
}

/// True if `url` is `root` or below it.
pub(crate) fn is_under(url: &Url, root: &Url) -> bool {
    if !url.local_to(root) {
        return false;
    }
    let (path, base) = (url.path(), root.path());
    base.is_empty() || path == base || path.strip_prefix(base).is_some_and(|rest| rest.starts_with('/'))
}

pub(crate) fn wrong_principal(principal: &Url, expected: &'static str) -> ExecutorError {
    ExecutorError::WrongPrincipal {
        principal: principal.clone(),
        expected,
    }
}
