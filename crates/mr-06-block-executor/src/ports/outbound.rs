//! # Outbound Ports
//!
//! Collaborators the executor drives. The networking substrate that moves
//! envelopes between partitions and the storage behind snapshot exports
//! live outside this crate.

use crate::domain::errors::ExecutorError;
use shared_types::{Envelope, PartitionId};

/// Hands envelopes to the network for delivery to another partition.
pub trait Dispatcher: Send + Sync {
    /// Queue an envelope for `destination`.
    fn submit(&self, destination: &PartitionId, envelope: Envelope);
}

/// Receives snapshot bytes taken at end of block.
pub trait SnapshotSink: Send + Sync {
    /// Store a snapshot of `partition` at `height`.
    fn export(&self, partition: &PartitionId, height: u64, bytes: &[u8]) -> Result<(), ExecutorError>;
}
