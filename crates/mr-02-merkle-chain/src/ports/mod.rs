//! Ports (hexagonal boundaries).

pub mod outbound;
