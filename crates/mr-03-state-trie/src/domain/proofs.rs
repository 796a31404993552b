//! # State Proofs
//!
//! A state proof is a [`Receipt`] from a leaf hash to the trie root, so it
//! composes with chain receipts: a leaf proven against a state root that
//! is itself anchored can be carried all the way to a directory anchor.

use super::errors::TrieError;
use super::node::leaf_hash;
use shared_types::{Hash, Receipt};

/// Check that `proof` shows `key → value` under `root`.
pub fn verify_proof(root: &Hash, key: &Hash, value: &Hash, proof: &Receipt) -> Result<(), TrieError> {
    if proof.start != leaf_hash(key, value) {
        return Err(TrieError::LeafMismatch);
    }
    let actual = proof.compute_anchor();
    if &actual != root || proof.anchor != actual {
        return Err(TrieError::RootMismatch {
            expected: *root,
            actual,
        });
    }
    Ok(())
}
