//! # Transactions
//!
//! A transaction is an immutable header plus a body. Its identity is
//! `SHA-256(hash(header) || hash(body))` over the canonical encoding.
//!
//! ## Body Families
//!
//! | Family | Bodies |
//! |--------|--------|
//! | User | identity/account/key book/page creation, key page updates, token sends, credits, burns, data writes |
//! | Synthetic | token deposits, credit deposits, burns, identity creation (each carries its origin) |
//! | System | directory anchors, partition anchors, internal data writes |
//! | Reference | `Remote`: a pointer to an already-known transaction |

use crate::account::{Account, KeyEntry};
use crate::encoding::hash_of;
use crate::receipt::Receipt;
use crate::url::Url;
use crate::Hash;
use serde::{Deserialize, Serialize};
use shared_crypto::sha256_concat;
use std::fmt;

/// Token amounts, in the smallest unit.
pub type TokenAmount = u128;

/// Transaction header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionHeader {
    /// Account the transaction acts on.
    pub principal: Url,
    /// Metadata hash of the initiating signature.
    pub initiator: Hash,
    /// Free-form memo.
    pub memo: String,
}

/// An immutable transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Header.
    pub header: TransactionHeader,
    /// Body.
    pub body: TransactionBody,
}

impl Transaction {
    /// Create a transaction with an empty memo.
    pub fn new(principal: Url, initiator: Hash, body: TransactionBody) -> Self {
        Self {
            header: TransactionHeader {
                principal,
                initiator,
                memo: String::new(),
            },
            body,
        }
    }

    /// Content hash.
    pub fn hash(&self) -> Hash {
        sha256_concat(&[&hash_of(&self.header), &hash_of(&self.body)])
    }

    /// Principal URL.
    pub fn principal(&self) -> &Url {
        &self.header.principal
    }

    /// Body type.
    pub fn transaction_type(&self) -> TransactionType {
        self.body.transaction_type()
    }
}

/// Where a synthetic transaction came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntheticOrigin {
    /// Hash of the originating transaction.
    pub cause: Hash,
    /// Principal of the originating transaction.
    pub source: Url,
    /// Signer that initiated the originating transaction.
    pub initiator: Option<Url>,
    /// Credits refunded to the initiator if this transaction fails.
    pub fee_refund: u64,
}

/// One recipient of a token send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecipient {
    /// Receiving account.
    pub url: Url,
    /// Amount.
    pub amount: TokenAmount,
}

/// Key page mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyPageOperation {
    /// Append an entry.
    Add(KeyEntry),
    /// Remove the entry with this key hash.
    Remove {
        /// Key hash to remove.
        key_hash: Hash,
    },
    /// Replace one key hash with another.
    Update {
        /// Existing key hash.
        old_key_hash: Hash,
        /// Replacement entry.
        new_entry: KeyEntry,
    },
    /// Change the acceptance threshold.
    SetThreshold(u64),
}

impl KeyPageOperation {
    /// True for operations that change the key set.
    pub fn mutates_keys(&self) -> bool {
        !matches!(self, KeyPageOperation::SetThreshold(_))
    }
}

/// Count reported for one partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionCount {
    /// Partition URL.
    pub partition: Url,
    /// Count.
    pub count: u64,
}

/// Look up a count by partition URL.
pub fn count_for(counts: &[PartitionCount], partition: &Url) -> Option<u64> {
    counts
        .iter()
        .find(|c| &c.partition == partition)
        .map(|c| c.count)
}

/// Anchor sent from a block-validator partition to the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionAnchor {
    /// Source partition URL.
    pub source: Url,
    /// Major block index on the source.
    pub major_block_index: u64,
    /// Minor block index on the source.
    pub minor_block_index: u64,
    /// Index of the anchor in the source's root chain.
    pub root_chain_index: u64,
    /// Root chain anchor of the block.
    pub root_chain_anchor: Hash,
    /// BPT root after the block.
    pub state_tree_anchor: Hash,
    /// Synthetic transactions executed by the source, per origin partition.
    pub synthetic_executed: Vec<PartitionCount>,
    /// Directory anchors executed by the source.
    pub anchors_executed: u64,
}

/// A partition anchor with its proof of inclusion in the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionAnchorReceipt {
    /// The anchor the directory received.
    pub anchor: PartitionAnchor,
    /// Sequence number the anchor arrived with.
    pub sequence_number: u64,
    /// Proof from the partition's root anchor to the directory root anchor.
    pub root_chain_receipt: Receipt,
}

/// A network parameter update carried by a directory anchor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkAccountUpdate {
    /// Account path under the receiving partition's authority.
    pub name: String,
    /// Body to replay against it.
    pub body: TransactionBody,
}

/// Anchor sent from the directory to every partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryAnchor {
    /// Directory URL.
    pub source: Url,
    /// Minor block index on the directory.
    pub minor_block_index: u64,
    /// Index of the anchor in the directory root chain.
    pub root_chain_index: u64,
    /// Directory root chain anchor.
    pub root_chain_anchor: Hash,
    /// Directory BPT root.
    pub state_tree_anchor: Hash,
    /// Network parameter updates.
    pub updates: Vec<NetworkAccountUpdate>,
    /// Partition anchors received in this directory block.
    pub receipts: Vec<PartitionAnchorReceipt>,
    /// Major block to open, or zero.
    pub make_major_block: u64,
    /// Time of the major block, or zero.
    pub make_major_block_time: u64,
    /// Synthetic transactions the directory executed, per origin partition.
    pub synthetic_executed: Vec<PartitionCount>,
}

/// Data entry: a list of byte strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DataEntry {
    /// Parts.
    pub data: Vec<Vec<u8>>,
}

impl DataEntry {
    /// Entry hash: SHA-256 over the hashes of the parts.
    pub fn hash(&self) -> Hash {
        let part_hashes: Vec<Hash> = self.data.iter().map(|d| shared_crypto::sha256(d)).collect();
        let refs: Vec<&[u8]> = part_hashes.iter().map(|h| h.as_slice()).collect();
        sha256_concat(&refs)
    }
}

/// Transaction body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionBody {
    /// Create an identity with a key book and first page.
    CreateIdentity {
        /// New identity URL.
        url: Url,
        /// Key hash for the first page.
        key_hash: Hash,
        /// Key book URL (under the new identity).
        key_book_url: Url,
    },
    /// Create a token account under the principal identity.
    CreateTokenAccount {
        /// New account URL.
        url: Url,
        /// Token issuer.
        token_url: Url,
    },
    /// Create a data account under the principal identity.
    CreateDataAccount {
        /// New account URL.
        url: Url,
    },
    /// Create a key book and its first page.
    CreateKeyBook {
        /// New book URL.
        url: Url,
        /// Key hash for the first page.
        key_hash: Hash,
    },
    /// Create the next page of the principal key book.
    CreateKeyPage {
        /// Initial entries.
        keys: Vec<KeyEntry>,
    },
    /// Mutate the principal key page.
    UpdateKeyPage {
        /// Operation.
        operation: KeyPageOperation,
    },
    /// Send tokens.
    SendTokens {
        /// Recipients.
        to: Vec<TokenRecipient>,
    },
    /// Convert tokens to credits for a signer.
    AddCredits {
        /// Key page or lite identity to credit.
        recipient: Url,
        /// Tokens to spend.
        amount: TokenAmount,
    },
    /// Destroy tokens.
    BurnTokens {
        /// Amount.
        amount: TokenAmount,
    },
    /// Write a data entry.
    WriteData {
        /// Entry.
        entry: DataEntry,
    },
    /// Create the carried accounts.
    SyntheticCreateIdentity {
        /// Origin.
        origin: SyntheticOrigin,
        /// Accounts to create, identity first.
        accounts: Vec<Account>,
    },
    /// Deposit tokens.
    SyntheticDepositTokens {
        /// Origin.
        origin: SyntheticOrigin,
        /// Token issuer.
        token: Url,
        /// Amount.
        amount: TokenAmount,
        /// True when returning tokens from a failed deposit.
        is_refund: bool,
    },
    /// Deposit credits.
    SyntheticDepositCredits {
        /// Origin.
        origin: SyntheticOrigin,
        /// Credits.
        amount: u64,
        /// True for a fee refund.
        is_refund: bool,
    },
    /// Reduce an issuer's supply.
    SyntheticBurnTokens {
        /// Origin.
        origin: SyntheticOrigin,
        /// Amount.
        amount: TokenAmount,
    },
    /// Directory anchor.
    DirectoryAnchor(Box<DirectoryAnchor>),
    /// Partition anchor.
    PartitionAnchor(Box<PartitionAnchor>),
    /// Internal data write to a system account.
    SystemWriteData {
        /// Entry.
        entry: DataEntry,
    },
    /// Reference to a known transaction.
    Remote {
        /// Hash of the referenced transaction.
        hash: Hash,
    },
}

impl TransactionBody {
    /// Type discriminant.
    pub fn transaction_type(&self) -> TransactionType {
        match self {
            TransactionBody::CreateIdentity { .. } => TransactionType::CreateIdentity,
            TransactionBody::CreateTokenAccount { .. } => TransactionType::CreateTokenAccount,
            TransactionBody::CreateDataAccount { .. } => TransactionType::CreateDataAccount,
            TransactionBody::CreateKeyBook { .. } => TransactionType::CreateKeyBook,
            TransactionBody::CreateKeyPage { .. } => TransactionType::CreateKeyPage,
            TransactionBody::UpdateKeyPage { .. } => TransactionType::UpdateKeyPage,
            TransactionBody::SendTokens { .. } => TransactionType::SendTokens,
            TransactionBody::AddCredits { .. } => TransactionType::AddCredits,
            TransactionBody::BurnTokens { .. } => TransactionType::BurnTokens,
            TransactionBody::WriteData { .. } => TransactionType::WriteData,
            TransactionBody::SyntheticCreateIdentity { .. } => {
                TransactionType::SyntheticCreateIdentity
            }
            TransactionBody::SyntheticDepositTokens { .. } => {
                TransactionType::SyntheticDepositTokens
            }
            TransactionBody::SyntheticDepositCredits { .. } => {
                TransactionType::SyntheticDepositCredits
            }
            TransactionBody::SyntheticBurnTokens { .. } => TransactionType::SyntheticBurnTokens,
            TransactionBody::DirectoryAnchor(_) => TransactionType::DirectoryAnchor,
            TransactionBody::PartitionAnchor(_) => TransactionType::PartitionAnchor,
            TransactionBody::SystemWriteData { .. } => TransactionType::SystemWriteData,
            TransactionBody::Remote { .. } => TransactionType::Remote,
        }
    }

    /// Origin of a synthetic body.
    pub fn origin(&self) -> Option<&SyntheticOrigin> {
        match self {
            TransactionBody::SyntheticCreateIdentity { origin, .. }
            | TransactionBody::SyntheticDepositTokens { origin, .. }
            | TransactionBody::SyntheticDepositCredits { origin, .. }
            | TransactionBody::SyntheticBurnTokens { origin, .. } => Some(origin),
            _ => None,
        }
    }

    /// Mutable origin of a synthetic body.
    pub fn origin_mut(&mut self) -> Option<&mut SyntheticOrigin> {
        match self {
            TransactionBody::SyntheticCreateIdentity { origin, .. }
            | TransactionBody::SyntheticDepositTokens { origin, .. }
            | TransactionBody::SyntheticDepositCredits { origin, .. }
            | TransactionBody::SyntheticBurnTokens { origin, .. } => Some(origin),
            _ => None,
        }
    }
}

/// Transaction type discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, std::hash::Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TransactionType {
    /// See [`TransactionBody::CreateIdentity`].
    CreateIdentity,
    /// See [`TransactionBody::CreateTokenAccount`].
    CreateTokenAccount,
    /// See [`TransactionBody::CreateDataAccount`].
    CreateDataAccount,
    /// See [`TransactionBody::CreateKeyBook`].
    CreateKeyBook,
    /// See [`TransactionBody::CreateKeyPage`].
    CreateKeyPage,
    /// See [`TransactionBody::UpdateKeyPage`].
    UpdateKeyPage,
    /// See [`TransactionBody::SendTokens`].
    SendTokens,
    /// See [`TransactionBody::AddCredits`].
    AddCredits,
    /// See [`TransactionBody::BurnTokens`].
    BurnTokens,
    /// See [`TransactionBody::WriteData`].
    WriteData,
    /// See [`TransactionBody::SyntheticCreateIdentity`].
    SyntheticCreateIdentity,
    /// See [`TransactionBody::SyntheticDepositTokens`].
    SyntheticDepositTokens,
    /// See [`TransactionBody::SyntheticDepositCredits`].
    SyntheticDepositCredits,
    /// See [`TransactionBody::SyntheticBurnTokens`].
    SyntheticBurnTokens,
    /// See [`TransactionBody::DirectoryAnchor`].
    DirectoryAnchor,
    /// See [`TransactionBody::PartitionAnchor`].
    PartitionAnchor,
    /// See [`TransactionBody::SystemWriteData`].
    SystemWriteData,
    /// See [`TransactionBody::Remote`].
    Remote,
}

impl TransactionType {
    /// Submitted by users.
    pub fn is_user(self) -> bool {
        matches!(
            self,
            TransactionType::CreateIdentity
                | TransactionType::CreateTokenAccount
                | TransactionType::CreateDataAccount
                | TransactionType::CreateKeyBook
                | TransactionType::CreateKeyPage
                | TransactionType::UpdateKeyPage
                | TransactionType::SendTokens
                | TransactionType::AddCredits
                | TransactionType::BurnTokens
                | TransactionType::WriteData
        )
    }

    /// Produced by another transaction.
    pub fn is_synthetic(self) -> bool {
        matches!(
            self,
            TransactionType::SyntheticCreateIdentity
                | TransactionType::SyntheticDepositTokens
                | TransactionType::SyntheticDepositCredits
                | TransactionType::SyntheticBurnTokens
        )
    }

    /// Produced by the network itself.
    pub fn is_system(self) -> bool {
        matches!(
            self,
            TransactionType::DirectoryAnchor
                | TransactionType::PartitionAnchor
                | TransactionType::SystemWriteData
        )
    }

    /// Inter-partition anchor.
    pub fn is_anchor(self) -> bool {
        matches!(
            self,
            TransactionType::DirectoryAnchor | TransactionType::PartitionAnchor
        )
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
