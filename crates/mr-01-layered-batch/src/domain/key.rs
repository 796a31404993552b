//! # Storage Keys
//!
//! Record keys are a sequence of components, each written as a big-endian
//! `u16` length followed by its bytes. Length prefixes make the encoding
//! unambiguous, and a key built from a prefix of another key's components
//! is a byte prefix of it, so prefix scans select whole subtrees.
//!
//! A component of `u16::MAX` bytes or more is stored as its SHA-256
//! under the reserved length `u16::MAX`, so distinct long components stay
//! distinct and never collide with a literal 32-byte component.

use shared_crypto::sha256;
use shared_types::{Hash, Url};
use std::fmt;

/// A value usable as a key component.
pub trait KeyPart {
    /// Raw bytes of the component.
    fn key_bytes(&self) -> Vec<u8>;
}

impl KeyPart for &str {
    fn key_bytes(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }
}

impl KeyPart for String {
    fn key_bytes(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }
}

impl KeyPart for &[u8] {
    fn key_bytes(&self) -> Vec<u8> {
        self.to_vec()
    }
}

impl KeyPart for Hash {
    fn key_bytes(&self) -> Vec<u8> {
        self.to_vec()
    }
}

impl KeyPart for &Hash {
    fn key_bytes(&self) -> Vec<u8> {
        self.to_vec()
    }
}

impl KeyPart for u64 {
    fn key_bytes(&self) -> Vec<u8> {
        self.to_be_bytes().to_vec()
    }
}

impl KeyPart for &Url {
    fn key_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

/// Length prefix marking a hashed component.
const HASHED: u16 = u16::MAX;

/// Composite record key.
#[derive(Clone, PartialEq, Eq, std::hash::Hash, PartialOrd, Ord)]
pub struct Key(Vec<u8>);

impl Key {
    /// Key with a single leading component.
    pub fn new(root: &str) -> Self {
        Self(Vec::new()).push(root)
    }

    /// Append a component.
    pub fn push(mut self, part: impl KeyPart) -> Self {
        let bytes = part.key_bytes();
        match u16::try_from(bytes.len()) {
            Ok(len) if len < HASHED => {
                self.0.extend_from_slice(&len.to_be_bytes());
                self.0.extend_from_slice(&bytes);
            }
            _ => {
                self.0.extend_from_slice(&HASHED.to_be_bytes());
                self.0.extend_from_slice(&sha256(&bytes));
            }
        }
        self
    }

    /// Encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Encoded bytes, by value.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Split encoded key bytes back into components. Returns `None` if
    /// the bytes are not a well-formed key.
    pub fn components(bytes: &[u8]) -> Option<Vec<&[u8]>> {
        let mut parts = Vec::new();
        let mut rest = bytes;
        while !rest.is_empty() {
            let len = match u16::from_be_bytes([*rest.first()?, *rest.get(1)?]) {
                HASHED => 32,
                len => len as usize,
            };
            let part = rest.get(2..2 + len)?;
            parts.push(part);
            rest = &rest[2 + len..];
        }
        Some(parts)
    }
}

impl From<Key> for Vec<u8> {
    fn from(key: Key) -> Self {
        key.0
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = Key::components(&self.0).unwrap_or_default();
        let mut list = f.debug_list();
        for part in parts {
            match std::str::from_utf8(part) {
                Ok(s) if s.chars().all(|c| !c.is_control()) => list.entry(&s),
                _ => list.entry(&format_args!("{:02x?}", part)),
            };
        }
        list.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_components_roundtrip() {
        let url = Url::parse("acc://alice/tokens").unwrap();
        let key = Key::new("account").push(&url).push("chain").push(7u64);
        let parts = Key::components(key.as_bytes()).unwrap();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[1], b"acc://alice/tokens");
        assert_eq!(parts[3], 7u64.to_be_bytes());
    }

    #[test]
    fn test_prefix_keys_are_byte_prefixes() {
        let url = Url::parse("acc://alice").unwrap();
        let prefix = Key::new("account").push(&url);
        let full = prefix.clone().push("main");
        assert!(full.as_bytes().starts_with(prefix.as_bytes()));

        // "ab"+"c" and "a"+"bc" must not collide
        let a = Key::new("ab").push("c");
        let b = Key::new("a").push("bc");
        assert_ne!(a, b);
    }

    #[test]
    fn test_long_components_are_hashed_not_truncated() {
        let mut long = vec![7u8; 70_000];
        let a = Key::new("data").push(long.as_slice());
        long[69_999] = 8;
        let b = Key::new("data").push(long.as_slice());
        assert_ne!(a, b);

        let digest = sha256(&vec![7u8; 70_000]);
        let parts = Key::components(a.as_bytes()).unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1], digest);
        assert_ne!(Key::new("data").push(&digest), a);
        let edge = vec![1u8; 65_535];
        assert_ne!(Key::new("data").push(edge.as_slice()), Key::new("data").push(&edge[1..]));
    }

    #[test]
    fn test_malformed_components_rejected() {
        assert!(Key::components(&[0, 5, 1]).is_none());
        assert!(Key::components(&[0]).is_none());
        assert_eq!(Key::components(&[]).unwrap().len(), 0);
    }
}
