//! Domain layer.

pub mod errors;
pub mod node;
pub mod proofs;
pub mod trie;
