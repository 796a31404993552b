//! Ports for the block executor.

pub mod outbound;

pub use outbound::{Dispatcher, SnapshotSink};
