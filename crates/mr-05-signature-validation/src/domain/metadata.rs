//! Per-signature validation metadata.

use shared_types::{Hash, Url};

/// Hard limit on delegation nesting.
pub const MAX_DELEGATION_DEPTH: usize = 5;

/// How a signature sits within its delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureMetadata {
    /// Metadata hash equals the header's initiator.
    pub initiator: bool,
    /// URL the outermost signature routes by.
    pub location: Url,
    /// Delegation layers above this signature.
    pub depth: usize,
    /// Inside a delegated signature.
    pub nested: bool,
    /// Delivered on behalf of another partition.
    pub forwarded: bool,
    /// Metadata hash of the outermost delegated signature.
    pub outer_hash: Option<Hash>,
}

impl SignatureMetadata {
    /// Metadata of a top-level signature.
    pub fn top(location: Url, initiator: bool, forwarded: bool) -> Self {
        Self {
            initiator,
            location,
            depth: 0,
            nested: false,
            forwarded,
            outer_hash: None,
        }
    }

    /// Metadata of the signature wrapped by a delegated signature whose
    /// own metadata hash is `delegated_hash`.
    pub fn nested(&self, delegated_hash: Hash) -> Self {
        Self {
            initiator: self.initiator,
            location: self.location.clone(),
            depth: self.depth + 1,
            nested: true,
            forwarded: self.forwarded,
            outer_hash: Some(self.outer_hash.unwrap_or(delegated_hash)),
        }
    }

    /// True for a signature validated directly against the principal.
    pub fn is_first_level(&self) -> bool {
        self.depth == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outer_hash_is_outermost() {
        let top = SignatureMetadata::top(Url::parse("acc://a").unwrap(), true, false);
        let one = top.nested([1u8; 32]);
        let two = one.nested([2u8; 32]);
        assert_eq!(two.depth, 2);
        assert!(two.nested && !top.nested);
        assert_eq!(two.outer_hash, Some([1u8; 32]));
    }
}
