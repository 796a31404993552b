//! # SHA-256 Hashing
//!
//! Every identity in the ledger (transaction hashes, chain anchors, trie
//! nodes, account ids) is a SHA-256 digest.

use sha2::{Digest, Sha256};

/// SHA-256 output (256-bit).
pub type Hash = [u8; 32];

/// The all-zero hash, used as the root of an empty chain or trie.
pub const ZERO_HASH: Hash = [0u8; 32];

/// Stateful SHA-256 hasher.
#[derive(Clone, Default)]
pub struct Sha256Hasher {
    inner: Sha256,
}

impl Sha256Hasher {
    /// Create new hasher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Update with data.
    pub fn update(&mut self, data: impl AsRef<[u8]>) -> &mut Self {
        self.inner.update(data.as_ref());
        self
    }

    /// Finalize and return hash.
    pub fn finalize(self) -> Hash {
        self.inner.finalize().into()
    }
}

/// Hash data with SHA-256 (one-shot).
pub fn sha256(data: &[u8]) -> Hash {
    Sha256::digest(data).into()
}

/// Hash the concatenation of several byte strings.
pub fn sha256_concat(parts: &[&[u8]]) -> Hash {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Merkle node combination: `SHA-256(left || right)`.
pub fn combine(left: &Hash, right: &Hash) -> Hash {
    sha256_concat(&[left, right])
}
