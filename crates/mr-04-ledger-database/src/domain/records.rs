//! # Record Types
//!
//! Values stored beside accounts and transactions that are not protocol
//! types themselves.

use mr_02_merkle_chain::ChainType;
use serde::{Deserialize, Serialize};
use shared_types::Url;

/// A chain an account owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainMeta {
    /// Chain name.
    pub name: String,
    /// Chain type.
    pub chain_type: ChainType,
}

/// Where a transaction was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainIndexEntry {
    /// Account owning the chain.
    pub account: Url,
    /// Chain name.
    pub chain: String,
    /// Index of the transaction on the chain.
    pub index: u64,
}
