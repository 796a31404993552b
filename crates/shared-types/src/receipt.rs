//! # Merkle Receipts
//!
//! A receipt proves that `start` is included under `anchor`. Each entry
//! names a sibling hash and the side it sits on; applying the entries in
//! order to `start` must yield `anchor`.
//!
//! Receipts compose: `A→B` followed by `B→C` is `A→C`.

use crate::errors::ReceiptError;
use crate::Hash;
use serde::{Deserialize, Serialize};
use shared_crypto::combine;

/// One step of a receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptEntry {
    /// Sibling hash.
    pub hash: Hash,
    /// True if the sibling goes on the right: `H(current || sibling)`.
    pub right: bool,
}

impl ReceiptEntry {
    /// Sibling on the left.
    pub fn left(hash: Hash) -> Self {
        Self { hash, right: false }
    }

    /// Sibling on the right.
    pub fn right(hash: Hash) -> Self {
        Self { hash, right: true }
    }

    /// Apply this step to `current`.
    pub fn apply(&self, current: &Hash) -> Hash {
        if self.right {
            combine(current, &self.hash)
        } else {
            combine(&self.hash, current)
        }
    }
}

/// Merkle inclusion proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// The proven hash.
    pub start: Hash,
    /// Steps from `start` to `anchor`.
    pub entries: Vec<ReceiptEntry>,
    /// The root the proof ends at.
    pub anchor: Hash,
}

impl Receipt {
    /// A receipt with no steps: `start` is its own anchor.
    pub fn identity(hash: Hash) -> Self {
        Self {
            start: hash,
            entries: Vec::new(),
            anchor: hash,
        }
    }

    /// Build a receipt and compute its anchor from the entries.
    pub fn from_entries(start: Hash, entries: Vec<ReceiptEntry>) -> Self {
        let anchor = entries.iter().fold(start, |acc, e| e.apply(&acc));
        Self {
            start,
            entries,
            anchor,
        }
    }

    /// Apply all entries to `start`.
    pub fn compute_anchor(&self) -> Hash {
        self.entries.iter().fold(self.start, |acc, e| e.apply(&acc))
    }

    /// True if the entries evaluate to the declared anchor.
    pub fn is_valid(&self) -> bool {
        self.compute_anchor() == self.anchor
    }

    /// Check validity, reporting the computed anchor on failure.
    pub fn validate(&self) -> Result<(), ReceiptError> {
        let computed = self.compute_anchor();
        if computed != self.anchor {
            return Err(ReceiptError::Invalid {
                computed,
                declared: self.anchor,
            });
        }
        Ok(())
    }

    /// Compose `self` (`A→B`) with `next` (`B→C`) into `A→C`.
    pub fn combine(&self, next: &Receipt) -> Result<Receipt, ReceiptError> {
        if self.anchor != next.start {
            return Err(ReceiptError::NotAdjacent {
                anchor: self.anchor,
                start: next.start,
            });
        }
        let mut entries = self.entries.clone();
        entries.extend_from_slice(&next.entries);
        Ok(Receipt {
            start: self.start,
            entries,
            anchor: next.anchor,
        })
    }
}
