//! Domain layer: keys, errors and the batch arena.

pub mod batch;
pub mod errors;
pub mod key;
