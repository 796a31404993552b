//! # Account URLs
//!
//! Every account is addressed by an `acc://authority/path` URL. URLs are
//! case-insensitive and normalized to lower case at parse time, so equality
//! and hashing can use the stored form directly.
//!
//! Lite addresses encode a key hash in the authority:
//! `acc://<hex(keyhash[0..20])><hex(checksum)>/<token>`.

use crate::errors::UrlError;
use crate::Hash;
use serde::{Deserialize, Serialize};
use shared_crypto::sha256;
use std::fmt;
use std::str::FromStr;

/// URL scheme prefix.
pub const SCHEME: &str = "acc://";

/// Length of the key-hash prefix carried by a lite address.
pub const LITE_KEY_HASH_LEN: usize = 20;

/// A normalized account URL.
#[derive(Clone, PartialEq, Eq, std::hash::Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Url {
    authority: String,
    /// Empty, or `/segment(/segment)*`.
    path: String,
}

impl Url {
    /// Parse `acc://authority/path`. The scheme prefix is optional.
    pub fn parse(input: &str) -> Result<Self, UrlError> {
        let trimmed = input.trim();
        let rest = match trimmed.get(..SCHEME.len()) {
            Some(prefix) if prefix.eq_ignore_ascii_case(SCHEME) => &trimmed[SCHEME.len()..],
            _ => trimmed,
        };
        if rest.contains("://") {
            return Err(UrlError::InvalidScheme(input.to_string()));
        }

        let (authority, path) = match rest.find('/') {
            Some(i) => (&rest[..i], &rest[i..]),
            None => (rest, ""),
        };
        if authority.is_empty() {
            return Err(UrlError::MissingAuthority(input.to_string()));
        }
        if let Some(c) = authority
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '.' || *c == '_'))
        {
            return Err(UrlError::InvalidCharacter {
                url: input.to_string(),
                character: c,
            });
        }

        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        for segment in &segments {
            if let Some(c) = segment.chars().find(|c| c.is_whitespace() || *c == '#') {
                return Err(UrlError::InvalidCharacter {
                    url: input.to_string(),
                    character: c,
                });
            }
        }
        let mut normalized = String::new();
        for segment in segments {
            normalized.push('/');
            normalized.push_str(&segment.to_ascii_lowercase());
        }

        Ok(Self {
            authority: authority.to_ascii_lowercase(),
            path: normalized,
        })
    }

    /// Root identity URL for a known-good authority, such as a partition
    /// system authority. No validation is performed.
    pub(crate) fn from_authority(authority: &str) -> Self {
        Self {
            authority: authority.to_ascii_lowercase(),
            path: String::new(),
        }
    }

    /// The authority component.
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// The path component (empty or starting with `/`).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Append a path segment.
    pub fn join(&self, segment: &str) -> Self {
        let mut path = self.path.clone();
        for part in segment.split('/').filter(|s| !s.is_empty()) {
            path.push('/');
            path.push_str(&part.to_ascii_lowercase());
        }
        Self {
            authority: self.authority.clone(),
            path,
        }
    }

    /// The parent URL, or `None` for a root identity.
    pub fn parent(&self) -> Option<Self> {
        let i = self.path.rfind('/')?;
        Some(Self {
            authority: self.authority.clone(),
            path: self.path[..i].to_string(),
        })
    }

    /// The root identity (authority only).
    pub fn root_identity(&self) -> Self {
        Self {
            authority: self.authority.clone(),
            path: String::new(),
        }
    }

    /// True for an authority-only URL.
    pub fn is_root_identity(&self) -> bool {
        self.path.is_empty()
    }

    /// True if `self` is an immediate child of `parent`.
    pub fn is_child_of(&self, parent: &Url) -> bool {
        self.parent().as_ref() == Some(parent)
    }

    /// True if both URLs share an authority, and therefore a partition.
    pub fn local_to(&self, other: &Url) -> bool {
        self.authority == other.authority
    }

    /// The account id, the key under which the account's state is
    /// committed in the BPT.
    pub fn account_id(&self) -> Hash {
        sha256(self.to_string().as_bytes())
    }

    /// The routing id, derived from the authority alone so that every
    /// account under an identity lands on the same partition.
    pub fn routing_id(&self) -> Hash {
        sha256(self.authority.as_bytes())
    }

    /// Key-hash prefix if this URL is (or is under) a lite identity.
    pub fn lite_key_hash(&self) -> Option<[u8; LITE_KEY_HASH_LEN]> {
        let authority = self.authority.as_bytes();
        if authority.len() != (LITE_KEY_HASH_LEN + 4) * 2 {
            return None;
        }
        let key_hex = &self.authority[..LITE_KEY_HASH_LEN * 2];
        let checksum_hex = &self.authority[LITE_KEY_HASH_LEN * 2..];
        let key: [u8; LITE_KEY_HASH_LEN] = hex::decode(key_hex).ok()?.try_into().ok()?;
        let checksum = hex::decode(checksum_hex).ok()?;
        if checksum != lite_checksum(key_hex) {
            return None;
        }
        Some(key)
    }

    /// True if the authority is a valid lite address.
    pub fn is_lite(&self) -> bool {
        self.lite_key_hash().is_some()
    }
}

fn lite_checksum(key_hex: &str) -> Vec<u8> {
    sha256(key_hex.as_bytes())[28..].to_vec()
}

/// The lite identity for a public key hash.
pub fn lite_identity(key_hash: &Hash) -> Url {
    let key_hex = hex::encode(&key_hash[..LITE_KEY_HASH_LEN]);
    let checksum = hex::encode(lite_checksum(&key_hex));
    Url {
        authority: format!("{key_hex}{checksum}"),
        path: String::new(),
    }
}

/// The lite token account for a public key hash and token issuer.
pub fn lite_token_address(key_hash: &Hash, token: &Url) -> Url {
    lite_identity(key_hash)
        .join(token.authority())
        .join(token.path())
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCHEME}{}{}", self.authority, self.path)
    }
}

impl fmt::Debug for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl FromStr for Url {
    type Err = UrlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Url {
    type Error = UrlError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Url> for String {
    fn from(url: Url) -> Self {
        url.to_string()
    }
}
