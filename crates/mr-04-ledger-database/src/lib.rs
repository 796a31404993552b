//! # Ledger Database (mr-04)
//!
//! Typed ledger records over the layered batch arena: accounts, their
//! chains, transactions and signatures, plus the state trie commitment
//! and snapshots.
//!
//! ## Records
//!
//! | Area | Read | Write |
//! |------|------|-------|
//! | accounts | `account`, `pending`, `directory`, `chains` | `put_account`, `add_pending`, `add_directory_entry` |
//! | chains | `chain_height`, `chain_entry`, `chain_receipt`, `last_index_entry` | `add_chain_entry`, `add_index_entry` |
//! | transactions | `transaction`, `status`, `signatures`, `transaction_chains` | `put_transaction`, `put_status`, `add_signatures` |
//! | anchoring | `synthetic_for_anchor`, `directory_receipt` | `add_synthetic_for_anchor`, `take_synthetic_for_anchor`, `put_directory_receipt` |
//!
//! Reads are provided by [`LedgerReader`], implemented by both [`Batch`]
//! and [`View`].
//!
//! ## State Commitment
//!
//! Each account's state hash covers its encoded state, directory, pending
//! list and the anchor of every chain it owns. Root commits fold changed
//! hashes into the state trie; [`Database::bpt_root`] is the partition's
//! state commitment.

#![warn(missing_docs)]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::{Batch, View};
pub use domain::errors::DatabaseError;
pub use domain::records::{ChainIndexEntry, ChainMeta};
pub use domain::snapshot::{Snapshot, SnapshotHeader, SNAPSHOT_VERSION};
pub use ports::inbound::LedgerReader;
pub use service::Database;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
