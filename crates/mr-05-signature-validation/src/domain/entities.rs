//! # Validation Outcomes
//!
//! What an accepted signature contributes to the transaction status.

use shared_types::{Hash, Url};

/// A key accepted on behalf of a signer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerKey {
    /// Signer the key counts toward.
    pub signer: Url,
    /// Signer version at the time of signing.
    pub version: u64,
    /// Distinct contribution: the key hash, or the delegate's account id
    /// for a delegated signature.
    pub key_hash: Hash,
    /// Signatures the signer needs.
    pub threshold: u64,
    /// Authority the signer belongs to.
    pub authority: Url,
    /// Validated on another partition and forwarded here.
    pub remote: bool,
    /// Initiating signature.
    pub initiator: bool,
}

/// Route named by a partition signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionRoute {
    /// Sending partition URL.
    pub source: Url,
    /// Receiving partition URL.
    pub destination: Url,
    /// Sequence number.
    pub sequence: u64,
    /// Initiating signature.
    pub initiator: bool,
}

/// Result of validating one signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Accepted {
    /// A signer key.
    Key(SignerKey),
    /// A partition route.
    Partition(PartitionRoute),
    /// A receipt ending at a recorded directory anchor.
    Receipt {
        /// Sending partition URL.
        source: Url,
        /// Directory root anchor the receipt ends at.
        anchor: Hash,
    },
    /// Valid, but the signer lives elsewhere and nothing is recorded.
    Unresolved {
        /// Signer URL.
        signer: Url,
    },
}

impl Accepted {
    /// Signer key, if one was identified.
    pub fn signer_key(&self) -> Option<&SignerKey> {
        match self {
            Accepted::Key(key) => Some(key),
            _ => None,
        }
    }
}
