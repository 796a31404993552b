//! Configuration types for the block executor

use serde::{Deserialize, Serialize};
use shared_crypto::Ed25519KeyPair;
use shared_types::{PartitionId, PartitionKind, TransactionType};

/// Credits charged per transaction type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeSchedule {
    /// CreateIdentity.
    pub create_identity: u64,
    /// CreateTokenAccount and CreateDataAccount.
    pub create_account: u64,
    /// CreateKeyBook.
    pub create_key_book: u64,
    /// CreateKeyPage.
    pub create_key_page: u64,
    /// UpdateKeyPage.
    pub update_key_page: u64,
    /// SendTokens.
    pub send_tokens: u64,
    /// AddCredits.
    pub add_credits: u64,
    /// BurnTokens.
    pub burn_tokens: u64,
    /// WriteData.
    pub write_data: u64,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            create_identity: 500,
            create_account: 25,
            create_key_book: 100,
            create_key_page: 100,
            update_key_page: 3,
            send_tokens: 3,
            add_credits: 0,
            burn_tokens: 1,
            write_data: 10,
        }
    }
}

impl FeeSchedule {
    /// Fee for a transaction type. Synthetic and system transactions are free.
    pub fn fee(&self, txn_type: TransactionType) -> u64 {
        match txn_type {
            TransactionType::CreateIdentity => self.create_identity,
            TransactionType::CreateTokenAccount | TransactionType::CreateDataAccount => {
                self.create_account
            }
            TransactionType::CreateKeyBook => self.create_key_book,
            TransactionType::CreateKeyPage => self.create_key_page,
            TransactionType::UpdateKeyPage => self.update_key_page,
            TransactionType::SendTokens => self.send_tokens,
            TransactionType::AddCredits => self.add_credits,
            TransactionType::BurnTokens => self.burn_tokens,
            TransactionType::WriteData => self.write_data,
            _ => 0,
        }
    }

    /// Refund carried by each of `outputs` synthetic transactions
    /// produced by a transaction of `txn_type`.
    pub fn refund_share(&self, txn_type: TransactionType, outputs: usize) -> u64 {
        if outputs == 0 {
            return 0;
        }
        self.fee(txn_type) / outputs as u64
    }
}

/// Runtime configuration for the block executor
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Chain mark power: a mark every `2^mark_power` entries.
    pub mark_power: u32,

    /// Credits per transaction type.
    pub fees: FeeSchedule,

    /// Credits bought per token unit by AddCredits.
    pub credits_per_token: u64,

    /// Blocks per major block on the directory (0 = never).
    pub major_block_interval: u64,

    /// Blocks between snapshots (0 = never).
    pub snapshot_interval: u64,

    /// Keep full chain history in snapshots.
    pub preserve_history: bool,

    /// Treat a synthetic sequence chain mismatch as fatal instead of
    /// logging it.
    pub strict_sequence_check: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            mark_power: mr_02_merkle_chain::DEFAULT_MARK_POWER,
            fees: FeeSchedule::default(),
            credits_per_token: 1,
            major_block_interval: 0,
            snapshot_interval: 0,
            preserve_history: true,
            strict_sequence_check: true,
        }
    }
}

impl ExecutorConfig {
    /// Set the chain mark power.
    #[must_use]
    pub fn with_mark_power(mut self, mark_power: u32) -> Self {
        self.mark_power = mark_power;
        self
    }

    /// Set the fee schedule.
    #[must_use]
    pub fn with_fees(mut self, fees: FeeSchedule) -> Self {
        self.fees = fees;
        self
    }

    /// Set the major block interval.
    #[must_use]
    pub fn with_major_block_interval(mut self, blocks: u64) -> Self {
        self.major_block_interval = blocks;
        self
    }

    /// Set the snapshot interval and history mode.
    #[must_use]
    pub fn with_snapshots(mut self, blocks: u64, preserve_history: bool) -> Self {
        self.snapshot_interval = blocks;
        self.preserve_history = preserve_history;
        self
    }

    /// Set strict sequence checking.
    #[must_use]
    pub fn with_strict_sequence_check(mut self, strict: bool) -> Self {
        self.strict_sequence_check = strict;
        self
    }
}

/// One node of a partition.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionDescriptor {
    /// Partition the node belongs to.
    pub id: PartitionId,
    /// Directory or block validator.
    pub kind: PartitionKind,
    /// Seed of the node's Ed25519 validator key.
    pub node_seed: [u8; 32],
}

impl PartitionDescriptor {
    /// Describe a node.
    pub fn new(id: PartitionId, kind: PartitionKind, node_seed: [u8; 32]) -> Self {
        Self { id, kind, node_seed }
    }

    /// The node's validator key pair.
    pub fn node_key(&self) -> Ed25519KeyPair {
        Ed25519KeyPair::from_seed(self.node_seed)
    }

    /// SHA-256 of the node's public key, as listed in the network definition.
    pub fn node_key_hash(&self) -> shared_types::Hash {
        shared_crypto::sha256(self.node_key().public_key().as_bytes())
    }

    /// True for the directory.
    pub fn is_directory(&self) -> bool {
        self.kind == PartitionKind::Directory
    }
}

impl std::fmt::Debug for PartitionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionDescriptor")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}
