//! # Shared Crypto
//!
//! Hashing and key-signature primitives used by every ledger subsystem.
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `hashing` | SHA-256 | Transaction identity, Merkle chains, BPT |
//! | `signatures` | Ed25519 | Key-page signatures, validator node keys |
//! | `ecdsa` | secp256k1 | Key-page signatures |
//!
//! ## Security Properties
//!
//! - **Ed25519**: Deterministic nonces, no RNG dependency
//! - **secp256k1**: RFC 6979 deterministic nonces
//! - Secret material is zeroized on drop

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ecdsa;
pub mod errors;
pub mod hashing;
pub mod signatures;

// Re-exports
pub use ecdsa::{verify_secp256k1, Secp256k1KeyPair, Secp256k1PublicKey};
pub use errors::CryptoError;
pub use hashing::{combine, sha256, sha256_concat, Hash, Sha256Hasher, ZERO_HASH};
pub use signatures::{verify_ed25519, Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
    }
}
