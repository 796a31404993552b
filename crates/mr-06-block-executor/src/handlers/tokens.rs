//! Tokens and credits.
//!
//! Debits happen where the sender lives; every credit arrives as a
//! synthetic deposit at the recipient's partition.

use super::{require_principal, unset_origin, wrong_principal, HandlerInput, TransactionHandler};
use crate::domain::entities::HandlerOutput;
use crate::domain::errors::ExecutorError;
use crate::service::context::ExecContext;
use shared_types::{
    acme_url, Account, LiteIdentity, LiteTokenAccount, TokenAmount, Transaction, TransactionBody,
    TransactionResult, TransactionType, Url,
};
use tracing::debug;

/// Debit `amount` from a token-holding principal; returns its token issuer.
fn debit(principal: &mut Account, amount: TokenAmount) -> Result<Url, ExecutorError> {
    let url = principal.url().clone();
    let Some((token, balance)) = principal.token_balance_mut() else {
        return Err(wrong_principal(&url, "token account"));
    };
    if *balance < amount {
        return Err(ExecutorError::InsufficientBalance {
            account: url,
            balance: *balance,
            amount,
        });
    }
    *balance -= amount;
    Ok(token.clone())
}

/// True if `url` is the lite token account of its lite identity for `token`.
fn is_lite_token_address(url: &Url, token: &Url) -> bool {
    url.is_lite() && url.root_identity().join(token.authority()).join(token.path()) == *url
}

/// Sends tokens to one or more recipients.
pub struct SendTokens;

impl TransactionHandler for SendTokens {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::SendTokens
    }

    fn execute(&self, ctx: &mut ExecContext<'_>, mut input: HandlerInput<'_>) -> Result<HandlerOutput, ExecutorError> {
        let TransactionBody::SendTokens { to } = &input.transaction.body else {
            return Err(ExecutorError::Unsupported(input.transaction.transaction_type()));
        };
        if to.is_empty() {
            return Err(ExecutorError::BadRequest("no recipients".into()));
        }
        let total = to
            .iter()
            .try_fold(0 as TokenAmount, |sum, r| sum.checked_add(r.amount))
            .ok_or_else(|| ExecutorError::BadRequest("total amount overflows".into()))?;

        let mut principal = require_principal(&mut input)?;
        let token = debit(&mut principal, total)?;
        ctx.put_account(&principal)?;

        let mut output = HandlerOutput::default();
        for recipient in to {
            output = output.produce(Transaction::new(
                recipient.url.clone(),
                [0u8; 32],
                TransactionBody::SyntheticDepositTokens {
                    origin: unset_origin(principal.url()),
                    token: token.clone(),
                    amount: recipient.amount,
                    is_refund: false,
                },
            ));
        }
        Ok(output)
    }
}

/// Converts native tokens to credits on a signer.
pub struct AddCredits;

impl TransactionHandler for AddCredits {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::AddCredits
    }

    fn execute(&self, ctx: &mut ExecContext<'_>, mut input: HandlerInput<'_>) -> Result<HandlerOutput, ExecutorError> {
        let TransactionBody::AddCredits { recipient, amount } = &input.transaction.body else {
            return Err(ExecutorError::Unsupported(input.transaction.transaction_type()));
        };
        if *amount == 0 {
            return Err(ExecutorError::BadRequest("amount must be positive".into()));
        }
        let credits = u64::try_from(*amount)
            .ok()
            .and_then(|a| a.checked_mul(ctx.node.config.credits_per_token))
            .ok_or_else(|| ExecutorError::BadRequest(format!("{amount} tokens is too many credits")))?;

        let mut principal = require_principal(&mut input)?;
        if principal.token_balance().is_some_and(|(token, _)| *token != acme_url()) {
            return Err(ExecutorError::BadRequest(format!(
                "credits are bought with {}",
                acme_url()
            )));
        }
        debit(&mut principal, *amount)?;
        ctx.put_account(&principal)?;

        let deposit = Transaction::new(
            recipient.clone(),
            [0u8; 32],
            TransactionBody::SyntheticDepositCredits {
                origin: unset_origin(principal.url()),
                amount: credits,
                is_refund: false,
            },
        );
        Ok(HandlerOutput::result(TransactionResult::AddCredits { credits }).produce(deposit))
    }
}

/// Destroys tokens, reducing the issuer's supply.
pub struct BurnTokens;

impl TransactionHandler for BurnTokens {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::BurnTokens
    }

    fn execute(&self, ctx: &mut ExecContext<'_>, mut input: HandlerInput<'_>) -> Result<HandlerOutput, ExecutorError> {
        let TransactionBody::BurnTokens { amount } = &input.transaction.body else {
            return Err(ExecutorError::Unsupported(input.transaction.transaction_type()));
        };
        let mut principal = require_principal(&mut input)?;
        let token = debit(&mut principal, *amount)?;
        ctx.put_account(&principal)?;
        let burn = Transaction::new(
            token,
            [0u8; 32],
            TransactionBody::SyntheticBurnTokens {
                origin: unset_origin(principal.url()),
                amount: *amount,
            },
        );
        Ok(HandlerOutput::default().produce(burn))
    }
}

/// Credits tokens, creating a lite token account on first deposit.
pub struct SyntheticDepositTokens;

impl TransactionHandler for SyntheticDepositTokens {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::SyntheticDepositTokens
    }

    fn allows_missing_principal(&self) -> bool {
        true
    }

    fn execute(&self, ctx: &mut ExecContext<'_>, input: HandlerInput<'_>) -> Result<HandlerOutput, ExecutorError> {
        let TransactionBody::SyntheticDepositTokens { token, amount, .. } = &input.transaction.body else {
            return Err(ExecutorError::Unsupported(input.transaction.transaction_type()));
        };
        let url = input.principal_url().clone();
        let Some(mut account) = input.principal else {
            if !is_lite_token_address(&url, token) {
                return Err(ExecutorError::PrincipalNotFound(url));
            }
            let identity = url.root_identity();
            if ctx.account(&identity)?.is_none() {
                ctx.create_account(Account::LiteIdentity(LiteIdentity {
                    url: identity,
                    credit_balance: 0,
                }))?;
            }
            ctx.create_account(Account::LiteTokenAccount(LiteTokenAccount {
                url: url.clone(),
                token_url: token.clone(),
                balance: *amount,
            }))?;
            debug!("[mr-06] Opened {} with {}", url, amount);
            return Ok(HandlerOutput::default());
        };

        let Some((held, balance)) = account.token_balance_mut() else {
            return Err(wrong_principal(&url, "token account"));
        };
        if held != token {
            return Err(ExecutorError::BadRequest(format!("{url} holds {held}, not {token}")));
        }
        *balance = balance
            .checked_add(*amount)
            .ok_or_else(|| ExecutorError::BadRequest(format!("balance of {url} overflows")))?;
        ctx.put_account(&account)?;
        Ok(HandlerOutput::default())
    }
}

/// Credits a signer, creating a lite identity on first deposit.
pub struct SyntheticDepositCredits;

impl TransactionHandler for SyntheticDepositCredits {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::SyntheticDepositCredits
    }

    fn allows_missing_principal(&self) -> bool {
        true
    }

    fn execute(&self, ctx: &mut ExecContext<'_>, input: HandlerInput<'_>) -> Result<HandlerOutput, ExecutorError> {
        let TransactionBody::SyntheticDepositCredits { amount, .. } = &input.transaction.body else {
            return Err(ExecutorError::Unsupported(input.transaction.transaction_type()));
        };
        let url = input.principal_url().clone();
        let Some(mut account) = input.principal else {
            if !(url.is_lite() && url.is_root_identity()) {
                return Err(ExecutorError::PrincipalNotFound(url));
            }
            ctx.create_account(Account::LiteIdentity(LiteIdentity {
                url,
                credit_balance: *amount,
            }))?;
            return Ok(HandlerOutput::default());
        };
        let Some(signer) = account.as_signer_mut() else {
            return Err(wrong_principal(&url, "signer"));
        };
        signer.credit_credits(*amount);
        ctx.put_account(&account)?;
        Ok(HandlerOutput::default())
    }
}

/// Reduces an issuer's issued supply.
pub struct SyntheticBurnTokens;

impl TransactionHandler for SyntheticBurnTokens {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::SyntheticBurnTokens
    }

    fn execute(&self, ctx: &mut ExecContext<'_>, mut input: HandlerInput<'_>) -> Result<HandlerOutput, ExecutorError> {
        let TransactionBody::SyntheticBurnTokens { amount, .. } = &input.transaction.body else {
            return Err(ExecutorError::Unsupported(input.transaction.transaction_type()));
        };
        let mut principal = require_principal(&mut input)?;
        let Account::TokenIssuer(issuer) = &mut principal else {
            return Err(wrong_principal(principal.url(), "token issuer"));
        };
        issuer.issued = issuer.issued.checked_sub(*amount).ok_or_else(|| {
            ExecutorError::BadRequest(format!("{} has only issued {}", issuer.url, issuer.issued))
        })?;
        ctx.put_account(&principal)?;
        Ok(HandlerOutput::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{lite_token_address, TokenAccount};

    fn token_account(balance: TokenAmount) -> Account {
        Account::TokenAccount(TokenAccount {
            url: Url::parse("acc://alice/tokens").unwrap(),
            authority: Url::parse("acc://alice/book").unwrap(),
            token_url: acme_url(),
            balance,
        })
    }

    #[test]
    fn test_debit_checks_balance() {
        let mut account = token_account(10);
        assert_eq!(debit(&mut account, 4).unwrap(), acme_url());
        assert_eq!(account.token_balance().map(|(_, b)| b), Some(6));

        let err = debit(&mut account, 7).unwrap_err();
        assert!(matches!(err, ExecutorError::InsufficientBalance { balance: 6, amount: 7, .. }));
        assert_eq!(account.token_balance().map(|(_, b)| b), Some(6));
    }

    #[test]
    fn test_debit_requires_token_account() {
        let mut identity = Account::LiteIdentity(LiteIdentity {
            url: Url::parse("acc://alice").unwrap(),
            credit_balance: 0,
        });
        assert!(matches!(
            debit(&mut identity, 1),
            Err(ExecutorError::WrongPrincipal { .. })
        ));
    }

    #[test]
    fn test_lite_token_address_shape() {
        let key = [7u8; 32];
        let address = lite_token_address(&key, &acme_url());
        assert!(is_lite_token_address(&address, &acme_url()));
        let other = Url::parse("acc://other.token").unwrap();
        assert!(!is_lite_token_address(&address, &other));
        assert!(!is_lite_token_address(&address.root_identity(), &acme_url()));
    }
}
