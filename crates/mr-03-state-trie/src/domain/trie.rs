//! # Binary Patricia Trie
//!
//! Crit-bit trie over 32-byte account ids. The root hash is the partition's
//! state commitment; an empty trie has the all-zero root.
//!
//! The trie lives in memory. Its leaves are persisted by the ledger
//! database and the trie is rebuilt from them on open.

use super::node::{critical_bit, key_bit, TrieNode};
use shared_crypto::ZERO_HASH;
use shared_types::{Hash, Receipt, ReceiptEntry};

/// Binary Patricia trie.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StateTrie {
    root: Option<Box<TrieNode>>,
    len: usize,
}

impl StateTrie {
    /// Empty trie.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from leaves.
    pub fn from_leaves(leaves: impl IntoIterator<Item = (Hash, Hash)>) -> Self {
        let mut trie = Self::new();
        for (key, value) in leaves {
            trie.insert(key, value);
        }
        trie
    }

    /// Number of leaves.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Root hash.
    pub fn root(&self) -> Hash {
        self.root.as_ref().map_or(ZERO_HASH, |n| *n.hash())
    }

    /// Value under `key`.
    pub fn get(&self, key: &Hash) -> Option<Hash> {
        let mut node = self.root.as_deref()?;
        loop {
            match node {
                TrieNode::Leaf { key: k, value, .. } => return (k == key).then_some(*value),
                TrieNode::Branch {
                    bit, left, right, ..
                } => {
                    node = if key_bit(key, *bit) == 0 { &**left } else { &**right };
                }
            }
        }
    }

    /// Insert or replace. Returns the previous value.
    pub fn insert(&mut self, key: Hash, value: Hash) -> Option<Hash> {
        let Some(root) = self.root.take() else {
            self.root = Some(TrieNode::leaf(key, value));
            self.len = 1;
            return None;
        };

        let nearest = nearest_key(&root, &key);
        match critical_bit(&nearest, &key) {
            None => {
                let (root, previous) = replace(root, &key, value);
                self.root = Some(root);
                previous
            }
            Some(crit) => {
                self.root = Some(insert_at(root, key, value, crit));
                self.len += 1;
                None
            }
        }
    }

    /// Apply a set of updates.
    pub fn apply(&mut self, updates: impl IntoIterator<Item = (Hash, Hash)>) {
        for (key, value) in updates {
            self.insert(key, value);
        }
    }

    /// Proof from the leaf for `key` to the root.
    pub fn proof(&self, key: &Hash) -> Option<Receipt> {
        let mut node = self.root.as_deref()?;
        let mut path = Vec::new();
        loop {
            match node {
                TrieNode::Leaf { key: k, hash, .. } => {
                    if k != key {
                        return None;
                    }
                    path.reverse();
                    return Some(Receipt::from_entries(*hash, path));
                }
                TrieNode::Branch {
                    bit, left, right, ..
                } => {
                    if key_bit(key, *bit) == 0 {
                        path.push(ReceiptEntry::right(*right.hash()));
                        node = &**left;
                    } else {
                        path.push(ReceiptEntry::left(*left.hash()));
                        node = &**right;
                    }
                }
            }
        }
    }

    /// All leaves in key order.
    pub fn leaves(&self) -> Vec<(Hash, Hash)> {
        let mut out = Vec::with_capacity(self.len);
        let mut stack: Vec<&TrieNode> = self.root.as_deref().into_iter().collect();
        while let Some(node) = stack.pop() {
            match node {
                TrieNode::Leaf { key, value, .. } => out.push((*key, *value)),
                TrieNode::Branch { left, right, .. } => {
                    stack.push(&**right);
                    stack.push(&**left);
                }
            }
        }
        out
    }
}

/// Key of the leaf reached by following `key`'s bits.
fn nearest_key(mut node: &TrieNode, key: &Hash) -> Hash {
    loop {
        match node {
            TrieNode::Leaf { key: k, .. } => return *k,
            TrieNode::Branch {
                bit, left, right, ..
            } => node = if key_bit(key, *bit) == 0 { &**left } else { &**right },
        }
    }
}

fn replace(node: Box<TrieNode>, key: &Hash, value: Hash) -> (Box<TrieNode>, Option<Hash>) {
    match *node {
        TrieNode::Leaf { key: k, value: old, .. } => (TrieNode::leaf(k, value), Some(old)),
        TrieNode::Branch {
            bit, left, right, ..
        } => {
            if key_bit(key, bit) == 0 {
                let (left, previous) = replace(left, key, value);
                (TrieNode::branch(bit, left, right), previous)
            } else {
                let (right, previous) = replace(right, key, value);
                (TrieNode::branch(bit, left, right), previous)
            }
        }
    }
}

fn insert_at(node: Box<TrieNode>, key: Hash, value: Hash, crit: u16) -> Box<TrieNode> {
    match *node {
        TrieNode::Branch {
            bit, left, right, ..
        } if bit < crit => {
            if key_bit(&key, bit) == 0 {
                TrieNode::branch(bit, insert_at(left, key, value, crit), right)
            } else {
                TrieNode::branch(bit, left, insert_at(right, key, value, crit))
            }
        }
        other => {
            let existing = Box::new(other);
            let leaf = TrieNode::leaf(key, value);
            if key_bit(&key, crit) == 0 {
                TrieNode::branch(crit, leaf, existing)
            } else {
                TrieNode::branch(crit, existing, leaf)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::proofs::verify_proof;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;
    use shared_crypto::sha256;

    fn key(i: u32) -> Hash {
        sha256(&i.to_be_bytes())
    }

    #[test]
    fn test_empty_root_is_zero() {
        let trie = StateTrie::new();
        assert_eq!(trie.root(), ZERO_HASH);
        assert!(trie.proof(&key(1)).is_none());
    }

    #[test]
    fn test_single_leaf_root() {
        let mut trie = StateTrie::new();
        trie.insert(key(1), key(2));
        assert_eq!(trie.root(), crate::domain::node::leaf_hash(&key(1), &key(2)));
    }

    #[test]
    fn test_root_is_order_independent() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let mut leaves: Vec<(Hash, Hash)> = (0..200).map(|i| (key(i), key(i + 10_000))).collect();
        let a = StateTrie::from_leaves(leaves.clone());
        leaves.shuffle(&mut rng);
        let b = StateTrie::from_leaves(leaves);
        assert_eq!(a.root(), b.root());
        assert_eq!(a.len(), 200);
    }

    #[test]
    fn test_update_replaces_value() {
        let mut trie = StateTrie::from_leaves((0..10).map(|i| (key(i), key(100))));
        let before = trie.root();
        assert_eq!(trie.insert(key(3), key(200)), Some(key(100)));
        assert_eq!(trie.len(), 10);
        assert_eq!(trie.get(&key(3)), Some(key(200)));
        assert_ne!(trie.root(), before);
        trie.insert(key(3), key(100));
        assert_eq!(trie.root(), before);
    }

    #[test]
    fn test_get_absent_key() {
        let trie = StateTrie::from_leaves((0..10).map(|i| (key(i), key(i))));
        assert_eq!(trie.get(&key(11)), None);
        assert!(trie.proof(&key(11)).is_none());
    }

    #[test]
    fn test_proofs_verify() {
        let trie = StateTrie::from_leaves((0..64).map(|i| (key(i), key(i + 1))));
        let root = trie.root();
        for i in 0..64 {
            let proof = trie.proof(&key(i)).unwrap();
            assert_eq!(proof.anchor, root);
            verify_proof(&root, &key(i), &key(i + 1), &proof).unwrap();
        }
        let proof = trie.proof(&key(0)).unwrap();
        assert!(verify_proof(&root, &key(0), &key(5), &proof).is_err());
    }

    #[test]
    fn test_leaves_in_key_order() {
        let trie = StateTrie::from_leaves((0..50).map(|i| (key(i), key(i))));
        let leaves = trie.leaves();
        assert_eq!(leaves.len(), 50);
        assert!(leaves.windows(2).all(|w| w[0].0 < w[1].0));
    }
}
