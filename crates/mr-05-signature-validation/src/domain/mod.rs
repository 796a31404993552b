//! Domain layer for signature validation.

pub mod crypto;
pub mod entities;
pub mod errors;
pub mod metadata;
pub mod signing;
