//! # Partitions and the Network Definition
//!
//! A partition is either the directory or a block validator. Each owns a
//! system authority `acc://<id>.acme` holding its ledgers and anchor pool.

use crate::url::Url;
use crate::Hash;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Suffix of partition system authorities.
pub const PARTITION_AUTHORITY_SUFFIX: &str = ".acme";

/// Path of the block ledger under a partition authority.
pub const LEDGER_PATH: &str = "ledger";
/// Path of the synthetic ledger under a partition authority.
pub const SYNTHETIC_PATH: &str = "synthetic";
/// Path of the anchor pool under a partition authority.
pub const ANCHOR_POOL_PATH: &str = "anchors";
/// Path of the operators key book under a partition authority.
pub const OPERATORS_PATH: &str = "operators";

/// The native token issuer.
pub fn acme_url() -> Url {
    Url::from_authority("acme")
}

/// Normalized partition identifier.
#[derive(Clone, PartialEq, Eq, std::hash::Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartitionId(String);

impl PartitionId {
    /// Identifier of the directory partition.
    pub const DIRECTORY: &'static str = "directory";

    /// Create from a name (lower-cased).
    pub fn new(name: &str) -> Self {
        Self(name.to_ascii_lowercase())
    }

    /// The directory partition.
    pub fn directory() -> Self {
        Self(Self::DIRECTORY.to_string())
    }

    /// True for the directory partition.
    pub fn is_directory(&self) -> bool {
        self.0 == Self::DIRECTORY
    }

    /// Name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `acc://<id>.acme`
    pub fn url(&self) -> Url {
        Url::from_authority(&format!("{}{}", self.0, PARTITION_AUTHORITY_SUFFIX))
    }

    /// Partition owning a system authority, if `url` is one.
    pub fn from_url(url: &Url) -> Option<Self> {
        url.authority()
            .strip_suffix(PARTITION_AUTHORITY_SUFFIX)
            .filter(|id| !id.is_empty())
            .map(Self::new)
    }

    /// Block ledger account.
    pub fn ledger_url(&self) -> Url {
        self.url().join(LEDGER_PATH)
    }

    /// Synthetic ledger account.
    pub fn synthetic_url(&self) -> Url {
        self.url().join(SYNTHETIC_PATH)
    }

    /// Anchor pool account.
    pub fn anchor_pool_url(&self) -> Url {
        self.url().join(ANCHOR_POOL_PATH)
    }

    /// Operators key book.
    pub fn operators_book_url(&self) -> Url {
        self.url().join(OPERATORS_PATH)
    }

    /// Operators key page, the signer of partition-signed transactions.
    pub fn operators_page_url(&self) -> Url {
        self.operators_book_url().join("1")
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PartitionId({})", self.0)
    }
}

/// Kind of partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, std::hash::Hash, Serialize, Deserialize)]
pub enum PartitionKind {
    /// The single directory partition.
    Directory,
    /// A block-validator partition.
    BlockValidator,
}

/// A partition and its validator set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionInfo {
    /// Identifier.
    pub id: PartitionId,
    /// Kind.
    pub kind: PartitionKind,
    /// SHA-256 hashes of the validators' Ed25519 public keys.
    pub validators: Vec<Hash>,
}

/// Every partition in the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct NetworkDefinition {
    /// Partitions, directory first by convention.
    pub partitions: Vec<PartitionInfo>,
}

impl NetworkDefinition {
    /// Look up a partition.
    pub fn partition(&self, id: &PartitionId) -> Option<&PartitionInfo> {
        self.partitions.iter().find(|p| &p.id == id)
    }

    /// Block-validator partition ids in declaration order.
    pub fn block_validators(&self) -> Vec<PartitionId> {
        self.partitions
            .iter()
            .filter(|p| p.kind == PartitionKind::BlockValidator)
            .map(|p| p.id.clone())
            .collect()
    }

    /// Every partition id in declaration order.
    pub fn partition_ids(&self) -> Vec<PartitionId> {
        self.partitions.iter().map(|p| p.id.clone()).collect()
    }

    /// True if `key_hash` is a validator of `id`.
    pub fn is_validator(&self, id: &PartitionId, key_hash: &Hash) -> bool {
        self.partition(id)
            .is_some_and(|p| p.validators.contains(key_hash))
    }

    /// Distinct validator signatures needed to accept a transaction from
    /// `id`: `ceil(2n/3)`, at least one.
    pub fn validator_threshold(&self, id: &PartitionId) -> u64 {
        let n = self.partition(id).map_or(0, |p| p.validators.len()) as u64;
        ((2 * n).div_ceil(3)).max(1)
    }
}
