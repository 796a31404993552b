//! # Shared Types Crate
//!
//! Protocol types shared by every ledger subsystem.
//!
//! ## Modules
//!
//! | Module | Contents |
//! |--------|----------|
//! | `url` | `acc://` account URLs and lite addresses |
//! | `partition` | partition ids, system account URLs, the network definition |
//! | `status` | status taxonomy and the per-transaction status record |
//! | `receipt` | composable Merkle receipts |
//! | `transaction` | transactions, bodies and anchor payloads |
//! | `signature` | signature variants and their metadata hashes |
//! | `account` | account variants with `Signer`/`Authority` capabilities |
//! | `ledger` | synthetic and anchor ledger counters |
//! | `envelope` | the envelope wire format |
//! | `encoding` | canonical bincode encoding and hashing |
//!
//! ## Design Principles
//!
//! - **Closed variants**: accounts, signatures and bodies are enums with
//!   explicit discriminants; capabilities are traits.
//! - **Canonical identity**: every hash is SHA-256 over the bincode
//!   encoding, which contains no unordered collections.

#![warn(missing_docs)]

pub mod account;
pub mod encoding;
pub mod envelope;
pub mod errors;
pub mod ledger;
pub mod partition;
pub mod receipt;
pub mod signature;
pub mod status;
pub mod transaction;
pub mod url;

pub use account::*;
pub use envelope::Envelope;
pub use errors::*;
pub use ledger::*;
pub use partition::*;
pub use receipt::{Receipt, ReceiptEntry};
pub use signature::*;
pub use status::*;
pub use transaction::*;
pub use url::{lite_identity, lite_token_address, Url};

/// A 32-byte SHA-256 hash.
pub type Hash = [u8; 32];

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
    }
}
