//! # Accounts
//!
//! Accounts form a closed enum. Operations that only some variants support
//! are exposed through capability traits: [`Signer`] for variants that can
//! sign (key pages, lite identities) and [`Authority`] for variants that
//! govern other accounts (key books, lite identities).

use crate::ledger::{AnchorLedger, SyntheticLedger, SystemLedger};
use crate::transaction::TokenAmount;
use crate::url::Url;
use crate::Hash;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One key (or delegate) on a key page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEntry {
    /// SHA-256 of the public key, or zero for a delegate-only entry.
    pub key_hash: Hash,
    /// Key book (or signer) allowed to sign on behalf of this page.
    pub delegate: Option<Url>,
}

impl KeyEntry {
    /// Entry for a key.
    pub fn key(key_hash: Hash) -> Self {
        Self {
            key_hash,
            delegate: None,
        }
    }

    /// Entry for a delegate.
    pub fn delegate(delegate: Url) -> Self {
        Self {
            key_hash: [0u8; 32],
            delegate: Some(delegate),
        }
    }
}

/// Root of a lite address; signs with the key its URL encodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiteIdentity {
    /// URL.
    pub url: Url,
    /// Credits.
    pub credit_balance: u64,
}

/// Token account under a lite identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiteTokenAccount {
    /// URL.
    pub url: Url,
    /// Token issuer.
    pub token_url: Url,
    /// Balance.
    pub balance: TokenAmount,
}

/// Named identity (ADI).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// URL.
    pub url: Url,
    /// Governing key book.
    pub authority: Url,
}

/// Ordered set of key pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyBook {
    /// URL.
    pub url: Url,
    /// Number of pages (`<book>/1` .. `<book>/<n>`).
    pub page_count: u64,
}

/// Set of keys with a threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPage {
    /// URL.
    pub url: Url,
    /// Incremented on every key-set mutation.
    pub version: u64,
    /// Signatures required; zero means one.
    pub accept_threshold: u64,
    /// Credits.
    pub credit_balance: u64,
    /// Entries.
    pub keys: Vec<KeyEntry>,
}

/// Token account under an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAccount {
    /// URL.
    pub url: Url,
    /// Governing key book.
    pub authority: Url,
    /// Token issuer.
    pub token_url: Url,
    /// Balance.
    pub balance: TokenAmount,
}

/// Token issuer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenIssuer {
    /// URL.
    pub url: Url,
    /// Governing key book.
    pub authority: Url,
    /// Symbol.
    pub symbol: String,
    /// Decimal places.
    pub precision: u8,
    /// Tokens in circulation.
    pub issued: TokenAmount,
    /// Maximum supply, if limited.
    pub supply_limit: Option<TokenAmount>,
}

/// Data account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataAccount {
    /// URL.
    pub url: Url,
    /// Governing key book.
    pub authority: Url,
}

/// Account type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, std::hash::Hash, Serialize, Deserialize)]
pub enum AccountType {
    /// [`LiteIdentity`]
    LiteIdentity,
    /// [`LiteTokenAccount`]
    LiteTokenAccount,
    /// [`Identity`]
    Identity,
    /// [`KeyBook`]
    KeyBook,
    /// [`KeyPage`]
    KeyPage,
    /// [`TokenAccount`]
    TokenAccount,
    /// [`TokenIssuer`]
    TokenIssuer,
    /// [`DataAccount`]
    DataAccount,
    /// [`SystemLedger`]
    SystemLedger,
    /// [`AnchorLedger`]
    AnchorLedger,
    /// [`SyntheticLedger`]
    SyntheticLedger,
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Account variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Account {
    /// Lite identity.
    LiteIdentity(LiteIdentity),
    /// Lite token account.
    LiteTokenAccount(LiteTokenAccount),
    /// Identity.
    Identity(Identity),
    /// Key book.
    KeyBook(KeyBook),
    /// Key page.
    KeyPage(KeyPage),
    /// Token account.
    TokenAccount(TokenAccount),
    /// Token issuer.
    TokenIssuer(TokenIssuer),
    /// Data account.
    DataAccount(DataAccount),
    /// Block ledger.
    SystemLedger(SystemLedger),
    /// Anchor ledger (anchor pool).
    AnchorLedger(AnchorLedger),
    /// Synthetic ledger.
    SyntheticLedger(SyntheticLedger),
}

impl Account {
    /// URL.
    pub fn url(&self) -> &Url {
        match self {
            Account::LiteIdentity(a) => &a.url,
            Account::LiteTokenAccount(a) => &a.url,
            Account::Identity(a) => &a.url,
            Account::KeyBook(a) => &a.url,
            Account::KeyPage(a) => &a.url,
            Account::TokenAccount(a) => &a.url,
            Account::TokenIssuer(a) => &a.url,
            Account::DataAccount(a) => &a.url,
            Account::SystemLedger(a) => &a.url,
            Account::AnchorLedger(a) => &a.url,
            Account::SyntheticLedger(a) => &a.url,
        }
    }

    /// Type tag.
    pub fn account_type(&self) -> AccountType {
        match self {
            Account::LiteIdentity(_) => AccountType::LiteIdentity,
            Account::LiteTokenAccount(_) => AccountType::LiteTokenAccount,
            Account::Identity(_) => AccountType::Identity,
            Account::KeyBook(_) => AccountType::KeyBook,
            Account::KeyPage(_) => AccountType::KeyPage,
            Account::TokenAccount(_) => AccountType::TokenAccount,
            Account::TokenIssuer(_) => AccountType::TokenIssuer,
            Account::DataAccount(_) => AccountType::DataAccount,
            Account::SystemLedger(_) => AccountType::SystemLedger,
            Account::AnchorLedger(_) => AccountType::AnchorLedger,
            Account::SyntheticLedger(_) => AccountType::SyntheticLedger,
        }
    }

    /// The key book (or lite identity) whose signers may act on this account.
    pub fn governing_authority(&self) -> Url {
        match self {
            Account::LiteIdentity(a) => a.url.clone(),
            Account::LiteTokenAccount(a) => a.url.root_identity(),
            Account::Identity(a) => a.authority.clone(),
            Account::KeyBook(a) => a.url.clone(),
            Account::KeyPage(a) => a.url.parent().unwrap_or_else(|| a.url.clone()),
            Account::TokenAccount(a) => a.authority.clone(),
            Account::TokenIssuer(a) => a.authority.clone(),
            Account::DataAccount(a) => a.authority.clone(),
            Account::SystemLedger(a) => operators_book(&a.url),
            Account::AnchorLedger(a) => operators_book(&a.url),
            Account::SyntheticLedger(a) => operators_book(&a.url),
        }
    }

    /// Signer capability.
    pub fn as_signer(&self) -> Option<&dyn Signer> {
        match self {
            Account::KeyPage(p) => Some(p),
            Account::LiteIdentity(l) => Some(l),
            _ => None,
        }
    }

    /// Mutable signer capability.
    pub fn as_signer_mut(&mut self) -> Option<&mut dyn Signer> {
        match self {
            Account::KeyPage(p) => Some(p),
            Account::LiteIdentity(l) => Some(l),
            _ => None,
        }
    }

    /// Authority capability.
    pub fn as_authority(&self) -> Option<&dyn Authority> {
        match self {
            Account::KeyBook(b) => Some(b),
            Account::LiteIdentity(l) => Some(l),
            _ => None,
        }
    }

    /// Token issuer and balance for token-holding variants.
    pub fn token_balance(&self) -> Option<(&Url, TokenAmount)> {
        match self {
            Account::TokenAccount(a) => Some((&a.token_url, a.balance)),
            Account::LiteTokenAccount(a) => Some((&a.token_url, a.balance)),
            _ => None,
        }
    }

    /// Mutable balance for token-holding variants.
    pub fn token_balance_mut(&mut self) -> Option<(&Url, &mut TokenAmount)> {
        match self {
            Account::TokenAccount(a) => Some((&a.token_url, &mut a.balance)),
            Account::LiteTokenAccount(a) => Some((&a.token_url, &mut a.balance)),
            _ => None,
        }
    }
}

fn operators_book(url: &Url) -> Url {
    url.root_identity().join(crate::partition::OPERATORS_PATH)
}

/// Accounts that can sign.
pub trait Signer {
    /// Signer URL.
    fn signer_url(&self) -> &Url;
    /// Version; signatures must name the current version.
    fn version(&self) -> u64;
    /// Signatures required.
    fn threshold(&self) -> u64;
    /// Number of entries.
    fn entry_count(&self) -> usize;
    /// Index of the entry for a key hash.
    fn entry_by_key_hash(&self, key_hash: &Hash) -> Option<usize>;
    /// Index of the entry that names `delegate` (a signer or its book).
    fn entry_by_delegate(&self, delegate: &Url) -> Option<usize>;
    /// Authority this signer belongs to.
    fn authority_url(&self) -> Url;
    /// Credits.
    fn credit_balance(&self) -> u64;
    /// Remove credits; false if the balance is too low.
    fn debit_credits(&mut self, amount: u64) -> bool;
    /// Add credits.
    fn credit_credits(&mut self, amount: u64);
}

/// Accounts that govern others.
pub trait Authority {
    /// Authority URL.
    fn authority(&self) -> &Url;
    /// Signers belonging to this authority.
    fn signers(&self) -> Vec<Url>;
}

impl Signer for KeyPage {
    fn signer_url(&self) -> &Url {
        &self.url
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn threshold(&self) -> u64 {
        self.accept_threshold.max(1)
    }

    fn entry_count(&self) -> usize {
        self.keys.len()
    }

    fn entry_by_key_hash(&self, key_hash: &Hash) -> Option<usize> {
        self.keys
            .iter()
            .position(|k| k.delegate.is_none() && &k.key_hash == key_hash)
            .or_else(|| self.keys.iter().position(|k| &k.key_hash == key_hash))
    }

    fn entry_by_delegate(&self, delegate: &Url) -> Option<usize> {
        let book = delegate.parent();
        self.keys.iter().position(|k| match &k.delegate {
            Some(d) => d == delegate || Some(d) == book.as_ref(),
            None => false,
        })
    }

    fn authority_url(&self) -> Url {
        self.url.parent().unwrap_or_else(|| self.url.clone())
    }

    fn credit_balance(&self) -> u64 {
        self.credit_balance
    }

    fn debit_credits(&mut self, amount: u64) -> bool {
        match self.credit_balance.checked_sub(amount) {
            Some(rest) => {
                self.credit_balance = rest;
                true
            }
            None => false,
        }
    }

    fn credit_credits(&mut self, amount: u64) {
        self.credit_balance = self.credit_balance.saturating_add(amount);
    }
}

impl Signer for LiteIdentity {
    fn signer_url(&self) -> &Url {
        &self.url
    }

    fn version(&self) -> u64 {
        1
    }

    fn threshold(&self) -> u64 {
        1
    }

    fn entry_count(&self) -> usize {
        1
    }

    fn entry_by_key_hash(&self, key_hash: &Hash) -> Option<usize> {
        let prefix = self.url.lite_key_hash()?;
        (key_hash[..prefix.len()] == prefix).then_some(0)
    }

    fn entry_by_delegate(&self, _delegate: &Url) -> Option<usize> {
        None
    }

    fn authority_url(&self) -> Url {
        self.url.clone()
    }

    fn credit_balance(&self) -> u64 {
        self.credit_balance
    }

    fn debit_credits(&mut self, amount: u64) -> bool {
        match self.credit_balance.checked_sub(amount) {
            Some(rest) => {
                self.credit_balance = rest;
                true
            }
            None => false,
        }
    }

    fn credit_credits(&mut self, amount: u64) {
        self.credit_balance = self.credit_balance.saturating_add(amount);
    }
}

impl Authority for KeyBook {
    fn authority(&self) -> &Url {
        &self.url
    }

    fn signers(&self) -> Vec<Url> {
        (1..=self.page_count)
            .map(|i| self.url.join(&i.to_string()))
            .collect()
    }
}

impl Authority for LiteIdentity {
    fn authority(&self) -> &Url {
        &self.url
    }

    fn signers(&self) -> Vec<Url> {
        vec![self.url.clone()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::url::lite_identity;
    use shared_crypto::sha256;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn page() -> KeyPage {
        KeyPage {
            url: url("acc://alice/book/1"),
            version: 1,
            accept_threshold: 0,
            credit_balance: 10,
            keys: vec![
                KeyEntry::key([1u8; 32]),
                KeyEntry::delegate(url("acc://bob/book")),
            ],
        }
    }

    #[test]
    fn test_key_page_signer() {
        let page = page();
        assert_eq!(page.threshold(), 1);
        assert_eq!(page.entry_by_key_hash(&[1u8; 32]), Some(0));
        assert_eq!(page.entry_by_key_hash(&[2u8; 32]), None);
        assert_eq!(page.authority_url(), url("acc://alice/book"));
    }

    #[test]
    fn test_delegate_matches_signer_or_book() {
        let page = page();
        assert_eq!(page.entry_by_delegate(&url("acc://bob/book/1")), Some(1));
        assert_eq!(page.entry_by_delegate(&url("acc://bob/book")), Some(1));
        assert_eq!(page.entry_by_delegate(&url("acc://carol/book/1")), None);
    }

    #[test]
    fn test_credits() {
        let mut account = Account::KeyPage(page());
        let signer = account.as_signer_mut().unwrap();
        assert!(signer.debit_credits(4));
        assert!(!signer.debit_credits(7));
        signer.credit_credits(1);
        assert_eq!(signer.credit_balance(), 7);
    }

    #[test]
    fn test_lite_identity_signer() {
        let key_hash = sha256(b"lite key");
        let lite = LiteIdentity {
            url: lite_identity(&key_hash),
            credit_balance: 0,
        };
        assert_eq!(lite.entry_by_key_hash(&key_hash), Some(0));
        assert_eq!(lite.entry_by_key_hash(&sha256(b"other")), None);
        assert_eq!(lite.version(), 1);
        assert_eq!(Authority::signers(&lite), vec![lite.url.clone()]);
    }

    #[test]
    fn test_governing_authority() {
        let tokens = Account::TokenAccount(TokenAccount {
            url: url("acc://alice/tokens"),
            authority: url("acc://alice/book"),
            token_url: url("acc://acme"),
            balance: 5,
        });
        assert_eq!(tokens.governing_authority(), url("acc://alice/book"));
        assert_eq!(tokens.token_balance(), Some((&url("acc://acme"), 5)));
        assert!(tokens.as_signer().is_none());

        let ledger = Account::SyntheticLedger(SyntheticLedger::new(url("acc://bvn0.acme/synthetic")));
        assert_eq!(
            ledger.governing_authority(),
            url("acc://bvn0.acme/operators")
        );
    }

    #[test]
    fn test_key_book_signers() {
        let book = KeyBook {
            url: url("acc://alice/book"),
            page_count: 2,
        };
        assert_eq!(
            book.signers(),
            vec![url("acc://alice/book/1"), url("acc://alice/book/2")]
        );
    }
}
