//! # Signature Cryptography
//!
//! Stateless verification of every key signature in an envelope. Checks
//! here need nothing but the envelope, so independent envelopes are
//! verified in parallel before the stateful pass.

use super::errors::ValidationError;
use rayon::prelude::*;
use shared_crypto::{verify_ed25519, verify_secp256k1};
use shared_types::{Envelope, Hash, KeyScheme, KeySignature, Signature, Transaction, TransactionBody};

/// Hash the signatures of `transaction` sign. A remote body signs the
/// hash it references.
pub fn signed_hash(transaction: &Transaction) -> Hash {
    match &transaction.body {
        TransactionBody::Remote { hash } => *hash,
        _ => transaction.hash(),
    }
}

/// Verify one key signature. `outer` is the outermost delegated
/// signature's metadata hash when nested.
pub fn verify_key(signature: &KeySignature, outer: Option<&Hash>, txn_hash: &Hash) -> Result<(), ValidationError> {
    let message = signature.signing_message(outer, txn_hash);
    let result = match signature.scheme {
        KeyScheme::Ed25519 => verify_ed25519(&signature.public_key, &message, &signature.signature),
        KeyScheme::Secp256k1 => verify_secp256k1(&signature.public_key, &message, &signature.signature),
    };
    result.map_err(|_| ValidationError::InvalidSignature(signature.signer.clone()))
}

/// Verify every key signature within `signature`, looking through
/// delegation and forwarding wrappers.
pub fn verify_tree(signature: &Signature, outer: Option<&Hash>, txn_hash: &Hash) -> Result<(), ValidationError> {
    match signature {
        Signature::Key(key) => verify_key(key, outer, txn_hash),
        Signature::Delegated(d) => {
            let outer = outer.copied().unwrap_or_else(|| signature.metadata_hash());
            verify_tree(&d.signature, Some(&outer), txn_hash)
        }
        Signature::Remote(r) => verify_tree(&r.signature, None, txn_hash),
        Signature::Set(set) => set
            .signatures
            .iter()
            .try_for_each(|s| verify_tree(s, None, txn_hash)),
        Signature::Partition(_) | Signature::Receipt(_) => Ok(()),
    }
}

/// Verify every key signature of an envelope.
pub fn verify_envelope(envelope: &Envelope) -> Result<(), ValidationError> {
    let txn_hash = signed_hash(&envelope.transaction);
    envelope
        .signatures
        .iter()
        .try_for_each(|s| verify_tree(s, None, &txn_hash))
}

/// Verify many envelopes in parallel. Results are in input order.
pub fn preverify(envelopes: &[Envelope]) -> Vec<Result<(), ValidationError>> {
    envelopes.par_iter().map(verify_envelope).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::signing::SigningKey;
    use shared_crypto::Ed25519KeyPair;
    use shared_types::{DataEntry, Url};

    fn envelope(seed: u8, tamper: bool) -> Envelope {
        let key = SigningKey::ed25519(
            Ed25519KeyPair::from_seed([seed; 32]),
            Url::parse("acc://alice/book/1").unwrap(),
            1,
        );
        let unsigned = key.unsigned(seed as u64, &[]);
        let txn = Transaction::new(
            Url::parse("acc://alice/data").unwrap(),
            unsigned.metadata_hash(),
            TransactionBody::WriteData {
                entry: DataEntry {
                    data: vec![vec![seed]],
                },
            },
        );
        let mut signed = key.complete(unsigned, &txn.hash());
        if tamper {
            if let Signature::Key(k) = &mut signed {
                k.signature[0] ^= 1;
            }
        }
        Envelope::new(txn, vec![signed])
    }

    #[test]
    fn test_preverify_keeps_order() {
        let envelopes = vec![envelope(1, false), envelope(2, true), envelope(3, false)];
        let results = preverify(&envelopes);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(ValidationError::InvalidSignature(_))));
        assert!(results[2].is_ok());
    }

    #[test]
    fn test_remote_body_signs_referenced_hash() {
        let txn = Transaction::new(
            Url::parse("acc://alice").unwrap(),
            [0u8; 32],
            TransactionBody::Remote { hash: [5u8; 32] },
        );
        assert_eq!(signed_hash(&txn), [5u8; 32]);
    }
}
