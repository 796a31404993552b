//! # Envelope Wire Format
//!
//! ```text
//! u32 BE  transaction length
//! bytes   bincode(Transaction)
//! u32 BE  signature count
//! repeat:
//!   u8      signature type tag
//!   u32 BE  payload length
//!   bytes   bincode(Signature)
//! ```

use crate::encoding::{decode, encode};
use crate::errors::EncodingError;
use crate::signature::{Signature, SignatureType};
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};

/// A transaction and its signatures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Transaction.
    pub transaction: Transaction,
    /// Signatures, in submission order.
    pub signatures: Vec<Signature>,
}

impl Envelope {
    /// Create an envelope.
    pub fn new(transaction: Transaction, signatures: Vec<Signature>) -> Self {
        Self {
            transaction,
            signatures,
        }
    }

    /// Encode to the wire format.
    pub fn to_bytes(&self) -> Result<Vec<u8>, EncodingError> {
        let txn = encode("transaction", &self.transaction)?;
        let mut out = Vec::with_capacity(txn.len() + 8);
        out.extend_from_slice(&length_prefix(txn.len())?);
        out.extend_from_slice(&txn);
        out.extend_from_slice(&length_prefix(self.signatures.len())?);
        for signature in &self.signatures {
            let payload = encode("signature", signature)?;
            out.push(signature.signature_type().tag());
            out.extend_from_slice(&length_prefix(payload.len())?);
            out.extend_from_slice(&payload);
        }
        Ok(out)
    }

    /// Decode from the wire format.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EncodingError> {
        let mut reader = Reader { bytes, offset: 0 };
        let txn_len = reader.read_u32("transaction length")? as usize;
        let transaction = decode("transaction", reader.take(txn_len, "transaction")?)?;

        let count = reader.read_u32("signature count")? as usize;
        let mut signatures = Vec::with_capacity(count.min(64));
        for _ in 0..count {
            let tag = reader.take(1, "signature tag")?[0];
            let expected =
                SignatureType::from_tag(tag).ok_or(EncodingError::UnknownSignatureType(tag))?;
            let len = reader.read_u32("signature length")? as usize;
            let signature: Signature = decode("signature", reader.take(len, "signature")?)?;
            let actual = signature.signature_type();
            if actual != expected {
                return Err(EncodingError::TagMismatch {
                    tag,
                    actual: actual.tag(),
                });
            }
            signatures.push(signature);
        }

        let rest = bytes.len() - reader.offset;
        if rest != 0 {
            return Err(EncodingError::TrailingBytes(rest));
        }
        Ok(Self {
            transaction,
            signatures,
        })
    }
}

fn length_prefix(len: usize) -> Result<[u8; 4], EncodingError> {
    u32::try_from(len)
        .map(u32::to_be_bytes)
        .map_err(|_| EncodingError::Encode {
            what: "envelope",
            reason: format!("length {len} exceeds u32"),
        })
}

struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize, what: &'static str) -> Result<&'a [u8], EncodingError> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(EncodingError::Truncated(what))?;
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn read_u32(&mut self, what: &'static str) -> Result<u32, EncodingError> {
        let raw = self.take(4, what)?;
        Ok(u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }
}
