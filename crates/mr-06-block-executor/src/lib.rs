//! # Block Executor (mr-06)
//!
//! Executes the blocks of one partition node: validates and delivers
//! envelopes, produces synthetic transactions, anchors chains into the
//! root chain, and exchanges anchors with the directory.
//!
//! ## Block Lifecycle
//!
//! | Call | Effect |
//! |------|--------|
//! | [`Executor::begin_block`] | opens the block's root batch |
//! | [`Executor::check`] | validates against a scratch batch that is always discarded |
//! | [`Executor::deliver`] | runs one envelope, and anything it queues, in a child batch |
//! | [`Executor::end_block`] | anchors, proves and sends synthetic transactions, emits the anchor, commits, dispatches |
//!
//! ## Cross-Partition Flow
//!
//! ```text
//! BVN block N:  SendTokens → SyntheticDepositTokens(seq s) ──────────┐
//!               PartitionAnchor(root N) ──► directory                 │ partition + key sig
//! DN block M:   records root N, DirectoryAnchor(receipt N→M) ──► all  │
//! BVN block N': applies DirectoryAnchor, releases with receipt ───────┴──► destination executes s
//! ```
//!
//! ## Collaborators
//!
//! - [`ports::Dispatcher`]: moves envelopes to other partitions.
//! - [`mr_05_signature_validation::AccountRouter`]: maps accounts to
//!   partitions; [`adapters::RendezvousRouter`] by default.
//! - [`ports::SnapshotSink`]: receives snapshots through the
//!   [`adapters::BackgroundQueue`].

#![warn(missing_docs)]

pub mod adapters;
pub mod config;
pub mod domain;
pub mod handlers;
pub mod ports;
pub mod service;

pub use adapters::{BackgroundQueue, FileSnapshotSink, MemorySnapshotSink, QueueDispatcher, RendezvousRouter};
pub use config::{ExecutorConfig, FeeSchedule, PartitionDescriptor};
pub use domain::entities::{BlockOutcome, ChainReceipt, HandlerOutput, QueriedTransaction};
pub use domain::errors::ExecutorError;
pub use domain::receipts::ReceiptBuilder;
pub use handlers::{HandlerInput, HandlerTable, TransactionHandler};
pub use ports::{Dispatcher, SnapshotSink};
pub use service::context::{ExecContext, NodeContext};
pub use service::Executor;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
