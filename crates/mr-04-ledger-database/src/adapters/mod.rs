//! Adapters over the batch arena.

pub mod batch;

pub use batch::{Batch, View};
