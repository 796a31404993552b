//! # Trie Nodes

use shared_crypto::{combine, sha256_concat};
use shared_types::Hash;

// =============================================================================
// TRIE NODE: leaves and crit-bit branches
// =============================================================================

/// Bit `index` of `key`, most significant bit first.
pub fn key_bit(key: &Hash, index: u16) -> u8 {
    let byte = key[(index / 8) as usize];
    (byte >> (7 - index % 8)) & 1
}

/// First bit at which two keys differ.
pub fn critical_bit(a: &Hash, b: &Hash) -> Option<u16> {
    a.iter().zip(b.iter()).enumerate().find_map(|(i, (x, y))| {
        let diff = x ^ y;
        (diff != 0).then(|| (i * 8) as u16 + diff.leading_zeros() as u16)
    })
}

/// Leaf hash: `SHA-256(key || value)`.
pub fn leaf_hash(key: &Hash, value: &Hash) -> Hash {
    sha256_concat(&[key, value])
}

/// Node of the binary Patricia trie.
///
/// Every key under a branch shares the bits before `bit`; keys with that
/// bit clear go left.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrieNode {
    /// Account id and state hash.
    Leaf {
        /// Key.
        key: Hash,
        /// Value.
        value: Hash,
        /// Cached `SHA-256(key || value)`.
        hash: Hash,
    },
    /// Split on one bit.
    Branch {
        /// Index of the distinguishing bit.
        bit: u16,
        /// Keys with the bit clear.
        left: Box<TrieNode>,
        /// Keys with the bit set.
        right: Box<TrieNode>,
        /// Cached `SHA-256(left || right)`.
        hash: Hash,
    },
}

impl TrieNode {
    /// New leaf.
    pub fn leaf(key: Hash, value: Hash) -> Box<Self> {
        Box::new(TrieNode::Leaf {
            key,
            value,
            hash: leaf_hash(&key, &value),
        })
    }

    /// New branch with its hash computed.
    pub fn branch(bit: u16, left: Box<TrieNode>, right: Box<TrieNode>) -> Box<Self> {
        let hash = combine(left.hash(), right.hash());
        Box::new(TrieNode::Branch {
            bit,
            left,
            right,
            hash,
        })
    }

    /// Cached hash.
    pub fn hash(&self) -> &Hash {
        match self {
            TrieNode::Leaf { hash, .. } | TrieNode::Branch { hash, .. } => hash,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_bits() {
        let mut key = [0u8; 32];
        key[0] = 0b1000_0001;
        key[31] = 1;
        assert_eq!(key_bit(&key, 0), 1);
        assert_eq!(key_bit(&key, 1), 0);
        assert_eq!(key_bit(&key, 7), 1);
        assert_eq!(key_bit(&key, 255), 1);
    }

    #[test]
    fn test_critical_bit() {
        let a = [0u8; 32];
        let mut b = [0u8; 32];
        assert_eq!(critical_bit(&a, &b), None);
        b[2] = 0b0010_0000;
        assert_eq!(critical_bit(&a, &b), Some(18));
    }

    #[test]
    fn test_branch_hash_covers_children() {
        let left = TrieNode::leaf([1u8; 32], [2u8; 32]);
        let right = TrieNode::leaf([3u8; 32], [4u8; 32]);
        let expected = combine(left.hash(), right.hash());
        assert_eq!(TrieNode::branch(0, left, right).hash(), &expected);
    }
}
