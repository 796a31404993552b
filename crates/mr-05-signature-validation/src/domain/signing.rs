//! # Signing
//!
//! Builds key and delegated signatures. The initiator hash commits to the
//! signature metadata only, so a transaction is signed in two steps:
//! [`SigningKey::unsigned`] gives the metadata hash to put in the header,
//! and [`SigningKey::complete`] fills in the signature bytes once the
//! transaction hash is known.

use shared_crypto::{sha256, Ed25519KeyPair, Secp256k1KeyPair};
use shared_types::{
    lite_identity, DelegatedSignature, Hash, KeyScheme, KeySignature, Signature, Url,
};

enum KeyMaterial {
    Ed25519(Ed25519KeyPair),
    Secp256k1(Secp256k1KeyPair),
}

/// A private key bound to the signer it signs for.
pub struct SigningKey {
    key: KeyMaterial,
    signer: Url,
    version: u64,
}

impl SigningKey {
    /// Ed25519 key signing for `signer` at `version`.
    pub fn ed25519(pair: Ed25519KeyPair, signer: Url, version: u64) -> Self {
        Self {
            key: KeyMaterial::Ed25519(pair),
            signer,
            version,
        }
    }

    /// secp256k1 key signing for `signer` at `version`.
    pub fn secp256k1(pair: Secp256k1KeyPair, signer: Url, version: u64) -> Self {
        Self {
            key: KeyMaterial::Secp256k1(pair),
            signer,
            version,
        }
    }

    /// Ed25519 key signing for its own lite identity.
    pub fn lite(pair: Ed25519KeyPair) -> Self {
        let key_hash = sha256(pair.public_key().as_bytes());
        Self::ed25519(pair, lite_identity(&key_hash), 1)
    }

    /// Public key bytes.
    pub fn public_key(&self) -> Vec<u8> {
        match &self.key {
            KeyMaterial::Ed25519(pair) => pair.public_key().as_bytes().to_vec(),
            KeyMaterial::Secp256k1(pair) => pair.public_key().as_bytes().to_vec(),
        }
    }

    /// SHA-256 of the public key.
    pub fn key_hash(&self) -> Hash {
        sha256(&self.public_key())
    }

    /// Signer URL.
    pub fn signer(&self) -> &Url {
        &self.signer
    }

    /// Signer version signatures will name.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Name a new signer version, after the page changed.
    pub fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    fn scheme(&self) -> KeyScheme {
        match &self.key {
            KeyMaterial::Ed25519(_) => KeyScheme::Ed25519,
            KeyMaterial::Secp256k1(_) => KeyScheme::Secp256k1,
        }
    }

    fn sign_message(&self, message: &Hash) -> Vec<u8> {
        match &self.key {
            KeyMaterial::Ed25519(pair) => pair.sign(message).as_bytes().to_vec(),
            KeyMaterial::Secp256k1(pair) => pair.sign(message).to_vec(),
        }
    }

    /// Unsigned signature, wrapped in one delegated layer per delegator
    /// (innermost first).
    pub fn unsigned(&self, timestamp: u64, delegators: &[Url]) -> Signature {
        let mut signature = Signature::Key(KeySignature::unsigned(
            self.scheme(),
            self.public_key(),
            self.signer.clone(),
            self.version,
            timestamp,
        ));
        for delegator in delegators {
            signature = Signature::Delegated(DelegatedSignature {
                signature: Box::new(signature),
                delegator: delegator.clone(),
            });
        }
        signature
    }

    /// Fill in the signature bytes of an unsigned signature.
    pub fn complete(&self, mut signature: Signature, txn_hash: &Hash) -> Signature {
        let outer = match &signature {
            Signature::Delegated(_) => Some(signature.metadata_hash()),
            _ => None,
        };
        self.fill(&mut signature, outer.as_ref(), txn_hash);
        signature
    }

    fn fill(&self, signature: &mut Signature, outer: Option<&Hash>, txn_hash: &Hash) {
        match signature {
            Signature::Key(key) => {
                let message = key.signing_message(outer, txn_hash);
                key.signature = self.sign_message(&message);
            }
            Signature::Delegated(d) => self.fill(&mut d.signature, outer, txn_hash),
            _ => {}
        }
    }

    /// Signed, undelegated signature over `txn_hash`.
    pub fn sign(&self, timestamp: u64, txn_hash: &Hash) -> Signature {
        self.complete(self.unsigned(timestamp, &[]), txn_hash)
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("signer", &self.signer)
            .field("version", &self.version)
            .field("scheme", &self.scheme())
            .finish_non_exhaustive()
    }
}
