//! # Signatures
//!
//! Closed set of signature variants carried by an envelope. Every variant
//! has a metadata hash; the initiating signature's metadata hash is the
//! transaction header's `initiator`.
//!
//! Key signatures sign `SHA-256(metadataHash || txHash)`, where the
//! metadata hash is the outermost delegated signature's when nested.

use crate::encoding::hash_of;
use crate::partition::PartitionId;
use crate::receipt::Receipt;
use crate::url::Url;
use crate::Hash;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};
use shared_crypto::{sha256, sha256_concat};

/// Key scheme of a key signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, std::hash::Hash, Serialize, Deserialize)]
pub enum KeyScheme {
    /// Ed25519, 32-byte keys.
    Ed25519,
    /// secp256k1, 33-byte compressed keys.
    Secp256k1,
}

/// Wire discriminant of a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, std::hash::Hash)]
#[repr(u8)]
pub enum SignatureType {
    /// Ed25519 key signature.
    Ed25519 = 1,
    /// secp256k1 key signature.
    Secp256k1 = 2,
    /// Delegated wrapper.
    Delegated = 3,
    /// Partition signature.
    Partition = 4,
    /// Receipt signature.
    Receipt = 5,
    /// Remote forwarding wrapper.
    Remote = 6,
    /// Signature set forwarding wrapper.
    Set = 7,
}

impl SignatureType {
    /// Wire tag.
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Parse a wire tag.
    pub fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            1 => SignatureType::Ed25519,
            2 => SignatureType::Secp256k1,
            3 => SignatureType::Delegated,
            4 => SignatureType::Partition,
            5 => SignatureType::Receipt,
            6 => SignatureType::Remote,
            7 => SignatureType::Set,
            _ => return None,
        })
    }
}

/// Signature by a key on a key page or lite identity.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySignature {
    /// Scheme.
    pub scheme: KeyScheme,
    /// Public key bytes.
    #[serde_as(as = "Bytes")]
    pub public_key: Vec<u8>,
    /// Signature bytes.
    #[serde_as(as = "Bytes")]
    pub signature: Vec<u8>,
    /// Signer URL.
    pub signer: Url,
    /// Signer version the key signed against.
    pub signer_version: u64,
    /// Signer-chosen timestamp.
    pub timestamp: u64,
}

#[derive(Serialize)]
struct KeyMetadata<'a> {
    scheme: KeyScheme,
    public_key: &'a [u8],
    signer: &'a Url,
    signer_version: u64,
    timestamp: u64,
}

impl KeySignature {
    /// Unsigned signature carrying only metadata.
    pub fn unsigned(
        scheme: KeyScheme,
        public_key: Vec<u8>,
        signer: Url,
        signer_version: u64,
        timestamp: u64,
    ) -> Self {
        Self {
            scheme,
            public_key,
            signature: Vec::new(),
            signer,
            signer_version,
            timestamp,
        }
    }

    /// Hash of everything except the signature bytes.
    pub fn metadata_hash(&self) -> Hash {
        hash_of(&KeyMetadata {
            scheme: self.scheme,
            public_key: &self.public_key,
            signer: &self.signer,
            signer_version: self.signer_version,
            timestamp: self.timestamp,
        })
    }

    /// SHA-256 of the public key.
    pub fn public_key_hash(&self) -> Hash {
        sha256(&self.public_key)
    }

    /// Message the key signs. `outer` is the outermost delegated
    /// signature's metadata hash when nested.
    pub fn signing_message(&self, outer: Option<&Hash>, txn_hash: &Hash) -> Hash {
        let metadata = match outer {
            Some(outer) => *outer,
            None => self.metadata_hash(),
        };
        sha256_concat(&[&metadata, txn_hash])
    }
}

/// Signature made on behalf of a delegator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegatedSignature {
    /// Wrapped signature.
    pub signature: Box<Signature>,
    /// Signer the wrapped signature signs for.
    pub delegator: Url,
}

/// Partition-level authentication of synthetic and system transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionSignature {
    /// Sending partition URL.
    pub source_network: Url,
    /// Receiving partition URL.
    pub destination_network: Url,
    /// Per-destination sequence number.
    pub sequence_number: u64,
}

/// Proof that a synthetic transaction is included on its source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptSignature {
    /// Sending partition URL.
    pub source_network: Url,
    /// Proof from the transaction hash to a directory root anchor.
    pub proof: Receipt,
    /// Transaction the proof is for.
    pub transaction_hash: Hash,
}

/// Forwarding wrapper around a signature validated on another partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSignature {
    /// Partition the transaction was forwarded to.
    pub destination: Url,
    /// Wrapped signature.
    pub signature: Box<Signature>,
}

/// Forwarding wrapper for several signatures from one signer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureSet {
    /// Signer.
    pub signer: Url,
    /// Wrapped signatures.
    pub signatures: Vec<Signature>,
}

/// Signature variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signature {
    /// Key signature.
    Key(KeySignature),
    /// Delegated signature.
    Delegated(DelegatedSignature),
    /// Partition signature.
    Partition(PartitionSignature),
    /// Receipt signature.
    Receipt(ReceiptSignature),
    /// Remote wrapper.
    Remote(RemoteSignature),
    /// Signature set wrapper.
    Set(SignatureSet),
}

impl Signature {
    /// Wire discriminant.
    pub fn signature_type(&self) -> SignatureType {
        match self {
            Signature::Key(k) => match k.scheme {
                KeyScheme::Ed25519 => SignatureType::Ed25519,
                KeyScheme::Secp256k1 => SignatureType::Secp256k1,
            },
            Signature::Delegated(_) => SignatureType::Delegated,
            Signature::Partition(_) => SignatureType::Partition,
            Signature::Receipt(_) => SignatureType::Receipt,
            Signature::Remote(_) => SignatureType::Remote,
            Signature::Set(_) => SignatureType::Set,
        }
    }

    /// Metadata hash, the value an initiator commits to.
    pub fn metadata_hash(&self) -> Hash {
        match self {
            Signature::Key(k) => k.metadata_hash(),
            Signature::Delegated(d) => {
                sha256_concat(&[&d.signature.metadata_hash(), d.delegator.to_string().as_bytes()])
            }
            Signature::Partition(p) => hash_of(p),
            Signature::Receipt(r) => hash_of(r),
            Signature::Remote(r) => r.signature.metadata_hash(),
            Signature::Set(s) => hash_of(s),
        }
    }

    /// URL of the signer this signature speaks for.
    pub fn signer_url(&self) -> Url {
        match self {
            Signature::Key(k) => k.signer.clone(),
            Signature::Delegated(d) => d.delegator.clone(),
            Signature::Partition(p) => PartitionId::from_url(&p.source_network)
                .map_or_else(|| p.source_network.clone(), |id| id.operators_page_url()),
            Signature::Receipt(r) => r.source_network.clone(),
            Signature::Remote(r) => r.signature.signer_url(),
            Signature::Set(s) => s.signer.clone(),
        }
    }

    /// Partition and receipt signatures.
    pub fn is_system(&self) -> bool {
        matches!(self, Signature::Partition(_) | Signature::Receipt(_))
    }

    /// Innermost key signature, looking through delegation.
    pub fn key_signature(&self) -> Option<&KeySignature> {
        match self {
            Signature::Key(k) => Some(k),
            Signature::Delegated(d) => d.signature.key_signature(),
            _ => None,
        }
    }

    /// Number of delegation layers.
    pub fn delegation_depth(&self) -> usize {
        match self {
            Signature::Delegated(d) => 1 + d.signature.delegation_depth(),
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn key_sig(timestamp: u64) -> KeySignature {
        KeySignature::unsigned(
            KeyScheme::Ed25519,
            vec![7u8; 32],
            url("acc://alice/book/1"),
            1,
            timestamp,
        )
    }

    #[test]
    fn test_metadata_hash_excludes_signature_bytes() {
        let a = key_sig(1);
        let mut b = a.clone();
        b.signature = vec![9u8; 64];
        assert_eq!(a.metadata_hash(), b.metadata_hash());
        assert_ne!(a.metadata_hash(), key_sig(2).metadata_hash());
    }

    #[test]
    fn test_signing_message_uses_outer_metadata() {
        let key = key_sig(1);
        let txn = [3u8; 32];
        let outer = [4u8; 32];
        assert_ne!(
            key.signing_message(None, &txn),
            key.signing_message(Some(&outer), &txn)
        );
        assert_eq!(
            key.signing_message(Some(&outer), &txn),
            sha256_concat(&[&outer, &txn])
        );
    }

    #[test]
    fn test_delegation_depth_and_signer() {
        let mut sig = Signature::Key(key_sig(1));
        for i in 0..3 {
            sig = Signature::Delegated(DelegatedSignature {
                signature: Box::new(sig),
                delegator: url(&format!("acc://d{i}/book/1")),
            });
        }
        assert_eq!(sig.delegation_depth(), 3);
        assert_eq!(sig.signer_url(), url("acc://d2/book/1"));
        assert_eq!(sig.key_signature().unwrap().timestamp, 1);
        assert_eq!(sig.signature_type(), SignatureType::Delegated);
    }

    #[test]
    fn test_partition_signer_is_operators_page() {
        let sig = Signature::Partition(PartitionSignature {
            source_network: url("acc://bvn0.acme"),
            destination_network: url("acc://bvn1.acme"),
            sequence_number: 1,
        });
        assert!(sig.is_system());
        assert_eq!(sig.signer_url(), url("acc://bvn0.acme/operators/1"));
    }

    #[test]
    fn test_tags_roundtrip() {
        for tag in 1..=7u8 {
            assert_eq!(SignatureType::from_tag(tag).unwrap().tag(), tag);
        }
        assert!(SignatureType::from_tag(0).is_none());
        assert!(SignatureType::from_tag(8).is_none());
    }
}
