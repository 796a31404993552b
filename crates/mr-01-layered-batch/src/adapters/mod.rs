//! Adapters for the driven ports.

pub mod memory;

pub use memory::{InMemoryKVStore, SharedKVStore};
