//! # Merkle State
//!
//! The compact state of an append-only Merkle tree: the entry count and,
//! for each set bit of the count, the root of the complete subtree that
//! bit represents. Adding an entry is a binary increment: equal-height
//! subtrees carry upward, hashed as `SHA-256(left || right)`.
//!
//! The anchor folds the peaks from the lowest level up:
//! `acc = lowest`, then `acc = SHA-256(peak || acc)` for each higher peak.

use serde::{Deserialize, Serialize};
use shared_crypto::{combine, ZERO_HASH};
use shared_types::Hash;

/// Count plus complete-subtree peaks, indexed by level.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MerkleState {
    /// Number of entries.
    pub count: u64,
    /// `pending[i]` is the root of a complete `2^i` subtree, present iff
    /// bit `i` of `count` is set.
    pub pending: Vec<Option<Hash>>,
}

impl MerkleState {
    /// Empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry. Returns every subtree completed by the addition as
    /// `(level, root)`, starting with the leaf at level 0.
    pub fn add(&mut self, hash: Hash) -> Vec<(u32, Hash)> {
        let mut completed = vec![(0, hash)];
        let mut carry = hash;
        let mut level = 0usize;
        loop {
            if level == self.pending.len() {
                self.pending.push(Some(carry));
                break;
            }
            match self.pending[level].take() {
                None => {
                    self.pending[level] = Some(carry);
                    break;
                }
                Some(left) => {
                    carry = combine(&left, &carry);
                    level += 1;
                    completed.push((level as u32, carry));
                }
            }
        }
        self.count += 1;
        completed
    }

    /// Merkle root over all entries; zero for an empty chain.
    pub fn anchor(&self) -> Hash {
        self.pending
            .iter()
            .flatten()
            .fold(None, |acc: Option<Hash>, peak| {
                Some(match acc {
                    None => *peak,
                    Some(acc) => combine(peak, &acc),
                })
            })
            .unwrap_or(ZERO_HASH)
    }

    /// Peaks as `(level, root)`, lowest level first.
    pub fn peaks(&self) -> Vec<(u32, Hash)> {
        self.pending
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.map(|h| (i as u32, h)))
            .collect()
    }

    /// True if the pending list matches the count's bits.
    pub fn is_well_formed(&self) -> bool {
        let bits = 64 - self.count.leading_zeros() as usize;
        if self.pending.len() < bits {
            return false;
        }
        self.pending
            .iter()
            .enumerate()
            .all(|(i, p)| p.is_some() == (i < 64 && self.count >> i & 1 == 1))
    }
}
