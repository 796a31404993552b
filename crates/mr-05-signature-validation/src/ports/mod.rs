//! Ports of the signature validator.

pub mod outbound;
