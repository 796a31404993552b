//! # Snapshot Format
//!
//! A snapshot is a sequence of sections, each framed as
//! `u16 BE type || u64 BE length || bincode payload`, in the fixed order
//! header, transactions, signatures, accounts.
//!
//! Chains are carried either with their full entry history or as a bare
//! head state. A head-only chain keeps its anchor and can keep growing,
//! but its earlier entries cannot be proven after restore.

use super::errors::DatabaseError;
use super::records::{ChainIndexEntry, ChainMeta};
use mr_02_merkle_chain::{IndexEntry, MerkleState};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shared_types::encoding::{decode, encode};
use shared_types::{
    Account, DataEntry, EncodingError, Hash, PartitionId, Signature, Transaction,
    TransactionStatus, Url,
};

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Section discriminants, in file order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum SectionType {
    /// [`SnapshotHeader`]
    Header = 1,
    /// [`TransactionRecord`]s
    Transactions = 2,
    /// [`SignatureRecord`]s
    Signatures = 3,
    /// [`AccountRecord`]s
    Accounts = 4,
}

/// Snapshot header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    /// Format version.
    pub version: u32,
    /// Partition the snapshot was taken on.
    pub partition: PartitionId,
    /// Block height at the time of the snapshot.
    pub height: u64,
    /// State trie root.
    pub root_hash: Hash,
}

/// A transaction with its status and chain placements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Transaction hash.
    pub hash: Hash,
    /// Body, if known.
    pub transaction: Option<Transaction>,
    /// Status, if recorded.
    pub status: Option<TransactionStatus>,
    /// Chains the transaction was recorded on.
    pub chains: Vec<ChainIndexEntry>,
}

/// Signatures received for one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRecord {
    /// Transaction hash.
    pub hash: Hash,
    /// Signatures.
    pub signatures: Vec<Signature>,
}

/// One chain of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainRecord {
    /// Name and type.
    pub meta: ChainMeta,
    /// Head state.
    pub head: MerkleState,
    /// Every entry, when history is preserved.
    pub entries: Option<Vec<Hash>>,
    /// Index entry values, for index chains with history.
    pub index_values: Option<Vec<IndexEntry>>,
}

impl ChainRecord {
    /// True if the record carries the full history.
    pub fn has_history(&self) -> bool {
        self.entries.is_some() || self.index_values.is_some()
    }
}

/// Everything stored for one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    /// Account URL.
    pub url: Url,
    /// Account state.
    pub main: Option<Account>,
    /// Pending transactions.
    pub pending: Vec<Hash>,
    /// Directory entries.
    pub directory: Vec<Url>,
    /// Chains, in name order.
    pub chains: Vec<ChainRecord>,
    /// Data entries, in hash order.
    pub data: Vec<DataEntry>,
}

/// A decoded snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Header.
    pub header: SnapshotHeader,
    /// Transactions.
    pub transactions: Vec<TransactionRecord>,
    /// Signatures.
    pub signatures: Vec<SignatureRecord>,
    /// Accounts.
    pub accounts: Vec<AccountRecord>,
}

impl Snapshot {
    /// Encode into sections.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DatabaseError> {
        let mut out = Vec::new();
        write_section(&mut out, SectionType::Header, &self.header)?;
        write_section(&mut out, SectionType::Transactions, &self.transactions)?;
        write_section(&mut out, SectionType::Signatures, &self.signatures)?;
        write_section(&mut out, SectionType::Accounts, &self.accounts)?;
        Ok(out)
    }

    /// Decode, requiring every section in order.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DatabaseError> {
        let mut reader = SectionReader { rest: bytes };
        let header: SnapshotHeader = reader.next(SectionType::Header, "snapshot header")?;
        if header.version != SNAPSHOT_VERSION {
            return Err(DatabaseError::SnapshotVersion(header.version));
        }
        let transactions = reader.next(SectionType::Transactions, "snapshot transactions")?;
        let signatures = reader.next(SectionType::Signatures, "snapshot signatures")?;
        let accounts = reader.next(SectionType::Accounts, "snapshot accounts")?;
        if !reader.rest.is_empty() {
            return Err(EncodingError::TrailingBytes(reader.rest.len()).into());
        }
        Ok(Self {
            header,
            transactions,
            signatures,
            accounts,
        })
    }
}

fn write_section<T: Serialize + ?Sized>(
    out: &mut Vec<u8>,
    section: SectionType,
    value: &T,
) -> Result<(), DatabaseError> {
    let payload = encode("snapshot section", value)?;
    out.extend_from_slice(&(section as u16).to_be_bytes());
    out.extend_from_slice(&(payload.len() as u64).to_be_bytes());
    out.extend_from_slice(&payload);
    Ok(())
}

struct SectionReader<'a> {
    rest: &'a [u8],
}

impl SectionReader<'_> {
    fn next<T: DeserializeOwned>(
        &mut self,
        expected: SectionType,
        what: &'static str,
    ) -> Result<T, DatabaseError> {
        if self.rest.is_empty() {
            return Err(DatabaseError::SnapshotSection {
                expected: expected as u16,
                found: 0,
            });
        }
        if self.rest.len() < 10 {
            return Err(DatabaseError::SnapshotTruncated);
        }
        let found = u16::from_be_bytes([self.rest[0], self.rest[1]]);
        if found != expected as u16 {
            return Err(DatabaseError::SnapshotSection {
                expected: expected as u16,
                found,
            });
        }
        let mut len_bytes = [0u8; 8];
        len_bytes.copy_from_slice(&self.rest[2..10]);
        let len = u64::from_be_bytes(len_bytes);
        let body = &self.rest[10..];
        let len = usize::try_from(len).map_err(|_| DatabaseError::SnapshotTruncated)?;
        if body.len() < len {
            return Err(DatabaseError::SnapshotTruncated);
        }
        let value = decode(what, &body[..len])?;
        self.rest = &body[len..];
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty(height: u64) -> Snapshot {
        Snapshot {
            header: SnapshotHeader {
                version: SNAPSHOT_VERSION,
                partition: PartitionId::new("bvn0"),
                height,
                root_hash: [9u8; 32],
            },
            transactions: vec![],
            signatures: vec![],
            accounts: vec![],
        }
    }

    #[test]
    fn test_sections_in_order() {
        let bytes = empty(5).to_bytes().unwrap();
        assert_eq!(u16::from_be_bytes([bytes[0], bytes[1]]), 1);
        assert_eq!(Snapshot::from_bytes(&bytes).unwrap(), empty(5));
    }

    #[test]
    fn test_out_of_order_section_rejected() {
        let snapshot = empty(1);
        let mut bytes = Vec::new();
        write_section(&mut bytes, SectionType::Header, &snapshot.header).unwrap();
        write_section(&mut bytes, SectionType::Signatures, &snapshot.signatures).unwrap();
        write_section(&mut bytes, SectionType::Transactions, &snapshot.transactions).unwrap();
        write_section(&mut bytes, SectionType::Accounts, &snapshot.accounts).unwrap();
        assert_eq!(
            Snapshot::from_bytes(&bytes),
            Err(DatabaseError::SnapshotSection {
                expected: 2,
                found: 3
            })
        );
    }

    #[test]
    fn test_missing_section_rejected() {
        let snapshot = empty(1);
        let mut bytes = Vec::new();
        write_section(&mut bytes, SectionType::Header, &snapshot.header).unwrap();
        assert_eq!(
            Snapshot::from_bytes(&bytes),
            Err(DatabaseError::SnapshotSection {
                expected: 2,
                found: 0
            })
        );
    }

    #[test]
    fn test_truncation_and_trailing_bytes() {
        let bytes = empty(1).to_bytes().unwrap();
        assert_eq!(
            Snapshot::from_bytes(&bytes[..bytes.len() - 1]),
            Err(DatabaseError::SnapshotTruncated)
        );
        let mut long = bytes.clone();
        long.push(0);
        assert!(matches!(
            Snapshot::from_bytes(&long),
            Err(DatabaseError::Encoding(EncodingError::TrailingBytes(1)))
        ));
    }

    #[test]
    fn test_version_checked() {
        let mut snapshot = empty(1);
        snapshot.header.version = 7;
        let bytes = snapshot.to_bytes().unwrap();
        assert_eq!(
            Snapshot::from_bytes(&bytes),
            Err(DatabaseError::SnapshotVersion(7))
        );
    }
}
