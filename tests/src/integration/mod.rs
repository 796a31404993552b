//! Cross-partition scenarios driven through the [`crate::simulator`].

pub mod anchoring;
pub mod batches;
pub mod delegation;
pub mod receipts;
pub mod snapshots;
pub mod synthetic;
