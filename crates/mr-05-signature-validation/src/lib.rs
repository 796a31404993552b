//! # Signature Validation (mr-05)
//!
//! Checks the signatures of an envelope before the executor records them.
//!
//! ## Two Passes
//!
//! | Pass | Needs | Entry point |
//! |------|-------|-------------|
//! | cryptographic | the envelope only | [`preverify`], [`verify_envelope`] |
//! | stateful | signer accounts, routing, recorded anchors | [`SignatureValidator::validate_delivery`] |
//!
//! The cryptographic pass runs on a rayon pool across all envelopes of a
//! block. The stateful pass runs inside the delivery's batch and returns
//! one [`Accepted`] per signature.
//!
//! ## Signature Kinds
//!
//! - **Key**: counts toward its signer page, or toward the source
//!   partition's operators for synthetic and system transactions.
//! - **Delegated**: counts toward the delegator, at most
//!   [`MAX_DELEGATION_DEPTH`] layers deep.
//! - **Partition**: names the route and sequence number of a synthetic or
//!   system transaction.
//! - **Receipt**: proves a synthetic transaction reached a directory
//!   anchor this partition has recorded.

#![warn(missing_docs)]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::LedgerState;
pub use domain::crypto::{preverify, signed_hash, verify_envelope};
pub use domain::entities::{Accepted, PartitionRoute, SignerKey};
pub use domain::errors::ValidationError;
pub use domain::metadata::{SignatureMetadata, MAX_DELEGATION_DEPTH};
pub use domain::signing::SigningKey;
pub use ports::outbound::{AccountRouter, ValidationState};
pub use service::{signer_account, Delivery, SignatureValidator};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
