//! Domain layer: record layout, errors and the snapshot format.

pub mod errors;
pub mod keys;
pub mod records;
pub mod snapshot;
