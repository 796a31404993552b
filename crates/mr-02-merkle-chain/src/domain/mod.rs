//! Domain layer.

pub mod chain;
pub mod errors;
pub mod index;
pub mod names;
pub mod state;
