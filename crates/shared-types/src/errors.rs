//! # Error Types
//!
//! Errors raised by the protocol types themselves. Every error in the
//! workspace maps onto a [`Status`] so it can be recorded on a
//! transaction status without losing its category.

use crate::status::Status;
use crate::Hash;
use thiserror::Error;

/// Errors from parsing account URLs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    /// Scheme other than `acc://`.
    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    /// Nothing between the scheme and the first slash.
    #[error("Missing authority: {0}")]
    MissingAuthority(String),

    /// Character not permitted in a URL component.
    #[error("Invalid character {character:?} in {url}")]
    InvalidCharacter {
        /// The offending URL.
        url: String,
        /// The offending character.
        character: char,
    },
}

impl UrlError {
    /// Status category of this error.
    pub fn status(&self) -> Status {
        Status::BadRequest
    }
}

/// Errors from combining or checking Merkle receipts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReceiptError {
    /// The first receipt does not end where the second starts.
    #[error("Receipts cannot be combined: anchor {} does not match start {}", hex::encode(.anchor), hex::encode(.start))]
    NotAdjacent {
        /// Anchor of the first receipt.
        anchor: Hash,
        /// Start of the second receipt.
        start: Hash,
    },

    /// The entries do not evaluate to the declared anchor.
    #[error("Receipt is invalid: computed {} but declared {}", hex::encode(.computed), hex::encode(.declared))]
    Invalid {
        /// Anchor computed from the entries.
        computed: Hash,
        /// Anchor declared by the receipt.
        declared: Hash,
    },
}

impl ReceiptError {
    /// Status category of this error.
    pub fn status(&self) -> Status {
        match self {
            ReceiptError::NotAdjacent { .. } => Status::BadRequest,
            ReceiptError::Invalid { .. } => Status::Unauthenticated,
        }
    }
}

/// Binary encoding and decoding failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    /// A serializer failed.
    #[error("Failed to encode {what}: {reason}")]
    Encode {
        /// Value being encoded.
        what: &'static str,
        /// Serializer message.
        reason: String,
    },

    /// A deserializer failed.
    #[error("Failed to decode {what}: {reason}")]
    Decode {
        /// Value being decoded.
        what: &'static str,
        /// Deserializer message.
        reason: String,
    },

    /// Input ended early.
    #[error("Unexpected end of input while reading {0}")]
    Truncated(&'static str),

    /// Bytes left over after a complete value.
    #[error("{0} trailing bytes after envelope")]
    TrailingBytes(usize),

    /// Unknown signature discriminant.
    #[error("Unknown signature type tag {0}")]
    UnknownSignatureType(u8),

    /// Tag does not match the payload.
    #[error("Signature tag {tag} does not match payload of type {actual}")]
    TagMismatch {
        /// Tag on the wire.
        tag: u8,
        /// Tag implied by the decoded payload.
        actual: u8,
    },
}

impl EncodingError {
    /// Status category of this error.
    pub fn status(&self) -> Status {
        Status::EncodingError
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = UrlError::MissingAuthority("acc:///x".into());
        assert!(err.to_string().contains("Missing authority"));
        assert_eq!(err.status(), Status::BadRequest);

        let err = ReceiptError::NotAdjacent {
            anchor: [1u8; 32],
            start: [2u8; 32],
        };
        assert!(err.to_string().contains("0101"));
        assert_eq!(err.status(), Status::BadRequest);

        assert_eq!(
            EncodingError::Truncated("signature").status(),
            Status::EncodingError
        );
    }
}
