//! # ECDSA Signatures (secp256k1)
//!
//! Key pages may hold secp256k1 keys alongside Ed25519 keys; a key
//! signature names its scheme and carries the 33-byte compressed public
//! key. Signing uses RFC 6979 deterministic nonces.

use crate::hashing::{sha256, Hash};
use crate::CryptoError;
use k256::ecdsa::{
    signature::{Signer, Verifier},
    Signature, SigningKey, VerifyingKey,
};

/// Compressed secp256k1 public key (33 bytes).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Secp256k1PublicKey([u8; 33]);

impl Secp256k1PublicKey {
    /// Parse a wire slice, rejecting anything that is not a curve point.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let array: [u8; 33] = bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength {
            expected: 33,
            actual: bytes.len(),
        })?;
        VerifyingKey::from_sec1_bytes(&array).map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self(array))
    }

    /// Raw compressed bytes.
    pub fn as_bytes(&self) -> &[u8; 33] {
        &self.0
    }

    /// SHA-256 of the compressed key, the form stored in key-page entries.
    pub fn key_hash(&self) -> Hash {
        sha256(&self.0)
    }
}

/// secp256k1 signing key.
pub struct Secp256k1KeyPair {
    signing_key: SigningKey,
}

impl Secp256k1KeyPair {
    /// Create from a 32-byte secret scalar.
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, CryptoError> {
        let signing_key = SigningKey::from_bytes((&bytes).into()).map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self { signing_key })
    }

    /// Compressed public key.
    pub fn public_key(&self) -> Secp256k1PublicKey {
        let sec1 = self.signing_key.verifying_key().to_sec1_bytes();
        let mut bytes = [0u8; 33];
        bytes.copy_from_slice(&sec1[..33]);
        Secp256k1PublicKey(bytes)
    }

    /// Sign `message`, returning the 64-byte `r || s` form.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        let signature: Signature = self.signing_key.sign(message);
        signature.to_bytes().into()
    }
}

/// Verify a secp256k1 signature given wire-format key and signature bytes.
pub fn verify_secp256k1(public_key: &[u8], message: &[u8], signature: &[u8]) -> Result<(), CryptoError> {
    let key = VerifyingKey::from_sec1_bytes(&Secp256k1PublicKey::from_slice(public_key)?.0)
        .map_err(|_| CryptoError::InvalidPublicKey)?;
    let signature = Signature::from_slice(signature).map_err(|_| CryptoError::InvalidSignatureFormat)?;
    key.verify(message, &signature)
        .map_err(|_| CryptoError::SignatureVerificationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_verifies_against_its_key_only() {
        let pair = Secp256k1KeyPair::from_bytes([0x11u8; 32]).unwrap();
        let key = pair.public_key();
        assert_eq!(key.key_hash(), sha256(key.as_bytes()));

        let signature = pair.sign(b"raw");
        assert_eq!(signature, pair.sign(b"raw"));
        assert!(verify_secp256k1(key.as_bytes(), b"raw", &signature).is_ok());
        assert!(verify_secp256k1(key.as_bytes(), b"other", &signature).is_err());

        let other = Secp256k1KeyPair::from_bytes([0x22u8; 32]).unwrap().public_key();
        assert!(verify_secp256k1(other.as_bytes(), b"raw", &signature).is_err());
    }

    #[test]
    fn test_malformed_key_rejected() {
        let signature = Secp256k1KeyPair::from_bytes([0x11u8; 32]).unwrap().sign(b"raw");
        assert!(matches!(
            verify_secp256k1(&[2u8; 32], b"raw", &signature),
            Err(CryptoError::InvalidKeyLength { expected: 33, actual: 32 })
        ));
        assert!(Secp256k1PublicKey::from_slice(&[9u8; 33]).is_err());
    }
}
