//! # Canonical Encoding
//!
//! All protocol values are encoded with bincode. The encoding is canonical
//! because no protocol type contains an unordered collection.

use crate::errors::EncodingError;
use crate::Hash;
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared_crypto::Sha256Hasher;
use std::io;

/// Encode a value.
pub fn encode<T: Serialize + ?Sized>(what: &'static str, value: &T) -> Result<Vec<u8>, EncodingError> {
    bincode::serialize(value).map_err(|e| EncodingError::Encode {
        what,
        reason: e.to_string(),
    })
}

/// Decode a value, rejecting trailing bytes.
pub fn decode<T: DeserializeOwned>(what: &'static str, bytes: &[u8]) -> Result<T, EncodingError> {
    use bincode::Options;
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
        .deserialize(bytes)
        .map_err(|e| EncodingError::Decode {
            what,
            reason: e.to_string(),
        })
}

struct HashWriter(Sha256Hasher);

impl io::Write for HashWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// SHA-256 of the canonical encoding, streamed straight into the hasher.
pub fn hash_of<T: Serialize + ?Sized>(value: &T) -> Hash {
    let mut writer = HashWriter(Sha256Hasher::new());
    // The writer never fails and protocol types have no fallible
    // serializers, so this cannot error.
    let _ = bincode::serialize_into(&mut writer, value);
    writer.0.finalize()
}
