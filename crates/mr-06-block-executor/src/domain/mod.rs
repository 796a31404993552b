//! Domain layer for the block executor.

pub mod entities;
pub mod errors;
pub mod receipts;
