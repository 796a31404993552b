//! # Status Taxonomy and Transaction Status
//!
//! [`Status`] is the category every outcome and error is reported under.
//! [`TransactionStatus`] is the mutable per-transaction record: created on
//! first sight, updated on each accepted signature, finalized on delivery.

use crate::receipt::Receipt;
use crate::url::Url;
use crate::Hash;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome and error categories with their numeric codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, std::hash::Hash, Serialize, Deserialize, Default)]
pub enum Status {
    /// Accepted.
    #[default]
    Ok,
    /// Executed and applied.
    Delivered,
    /// Waiting for signatures, a receipt, or an earlier sequence number.
    Pending,
    /// Principal lives on another partition.
    Remote,
    /// Malformed or unsupported input.
    BadRequest,
    /// Signature or proof missing or invalid.
    Unauthenticated,
    /// Signer cannot pay the fee.
    InsufficientCredits,
    /// Valid signer, insufficient rights.
    Unauthorized,
    /// Missing account, transaction or chain entry.
    NotFound,
    /// Version or nonce mismatch.
    Conflict,
    /// Internal invariant violation.
    InternalError,
    /// Uncategorized failure.
    UnknownError,
    /// Binary or JSON marshalling failure.
    EncodingError,
    /// Unrecoverable for the current block.
    FatalError,
}

impl Status {
    /// Numeric code.
    pub fn code(self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::Delivered => 201,
            Status::Pending => 202,
            Status::Remote => 203,
            Status::BadRequest => 400,
            Status::Unauthenticated => 401,
            Status::InsufficientCredits => 402,
            Status::Unauthorized => 403,
            Status::NotFound => 404,
            Status::Conflict => 409,
            Status::InternalError => 500,
            Status::UnknownError => 501,
            Status::EncodingError => 502,
            Status::FatalError => 503,
        }
    }

    /// Status for a numeric code, if known.
    pub fn from_code(code: u16) -> Option<Self> {
        Some(match code {
            200 => Status::Ok,
            201 => Status::Delivered,
            202 => Status::Pending,
            203 => Status::Remote,
            400 => Status::BadRequest,
            401 => Status::Unauthenticated,
            402 => Status::InsufficientCredits,
            403 => Status::Unauthorized,
            404 => Status::NotFound,
            409 => Status::Conflict,
            500 => Status::InternalError,
            501 => Status::UnknownError,
            502 => Status::EncodingError,
            503 => Status::FatalError,
            _ => return None,
        })
    }

    /// True for 4xx and 5xx codes.
    pub fn is_error(self) -> bool {
        self.code() >= 400
    }

    /// True for client errors (4xx).
    pub fn is_client_error(self) -> bool {
        (400..500).contains(&self.code())
    }

    /// True if the current block cannot continue.
    pub fn is_fatal(self) -> bool {
        matches!(self, Status::FatalError | Status::InternalError)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?} ({})", self.code())
    }
}

/// Handler-specific result payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TransactionResult {
    /// No payload.
    #[default]
    Empty,
    /// A data entry was written.
    WriteData {
        /// Account written to.
        account: Url,
        /// Hash of the entry.
        entry_hash: Hash,
    },
    /// Credits were purchased.
    AddCredits {
        /// Credits bought.
        credits: u64,
    },
    /// Accounts were created.
    CreatedAccounts(Vec<Url>),
}

/// Signatures a single signer has contributed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerRecord {
    /// Signer (key page, lite identity, or partition operators).
    pub url: Url,
    /// Signer version at the time of signing.
    pub version: u64,
    /// Distinct key hashes that have signed, sorted.
    pub key_hashes: Vec<Hash>,
}

/// Per-transaction mutable record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionStatus {
    /// Transaction hash.
    pub txid: Hash,
    /// Current code.
    pub code: Status,
    /// Error message for failed transactions.
    pub error: Option<String>,
    /// Result payload.
    pub result: TransactionResult,
    /// Block in which the transaction was first seen.
    pub received: u64,
    /// Signer of the initiating signature.
    pub initiator: Option<Url>,
    /// Signers that have signed.
    pub signers: Vec<SignerRecord>,
    /// Source partition (synthetic and system transactions).
    pub source_network: Option<Url>,
    /// Destination partition (synthetic and system transactions).
    pub destination_network: Option<Url>,
    /// Sequence number (synthetic and system transactions).
    pub sequence_number: u64,
    /// Proof of inclusion on the source partition.
    pub proof: Option<Receipt>,
    /// Synthetic transactions this transaction produced, sorted.
    pub produced: Vec<Hash>,
}

impl TransactionStatus {
    /// A fresh status for a transaction seen for the first time.
    pub fn new(txid: Hash) -> Self {
        Self {
            txid,
            code: Status::Ok,
            error: None,
            result: TransactionResult::Empty,
            received: 0,
            initiator: None,
            signers: Vec::new(),
            source_network: None,
            destination_network: None,
            sequence_number: 0,
            proof: None,
            produced: Vec::new(),
        }
    }

    /// Executed successfully.
    pub fn is_delivered(&self) -> bool {
        self.code == Status::Delivered
    }

    /// Executed, successfully or not.
    pub fn is_final(&self) -> bool {
        self.code == Status::Delivered || self.code.is_error()
    }

    /// Waiting for more input.
    pub fn is_pending(&self) -> bool {
        self.code == Status::Pending
    }

    /// Principal lives elsewhere.
    pub fn is_remote(&self) -> bool {
        self.code == Status::Remote
    }

    /// Record a failure.
    pub fn fail(&mut self, code: Status, message: impl Into<String>) {
        self.code = code;
        self.error = Some(message.into());
    }

    /// Record the partition route; the first route recorded wins.
    pub fn set_route(&mut self, source: &Url, destination: &Url, sequence: u64) {
        if self.source_network.is_none() {
            self.source_network = Some(source.clone());
        }
        if self.destination_network.is_none() {
            self.destination_network = Some(destination.clone());
        }
        if self.sequence_number == 0 {
            self.sequence_number = sequence;
        }
    }

    /// Signer record for `url`.
    pub fn signer(&self, url: &Url) -> Option<&SignerRecord> {
        self.signers.iter().find(|s| &s.url == url)
    }

    /// Add a key hash under a signer. Returns false if it was already
    /// recorded. A version change resets the signer's keys.
    pub fn add_signer_key(&mut self, url: &Url, version: u64, key_hash: Hash) -> bool {
        let record = match self.signers.iter().position(|s| &s.url == url) {
            Some(i) => &mut self.signers[i],
            None => {
                self.signers.push(SignerRecord {
                    url: url.clone(),
                    version,
                    key_hashes: Vec::new(),
                });
                let last = self.signers.len() - 1;
                &mut self.signers[last]
            }
        };
        if record.version != version {
            record.version = version;
            record.key_hashes.clear();
        }
        match record.key_hashes.binary_search(&key_hash) {
            Ok(_) => false,
            Err(i) => {
                record.key_hashes.insert(i, key_hash);
                true
            }
        }
    }

    /// Number of distinct keys recorded under `url`.
    pub fn signature_count(&self, url: &Url) -> usize {
        self.signer(url).map_or(0, |s| s.key_hashes.len())
    }

    /// Record a produced transaction.
    pub fn add_produced(&mut self, hash: Hash) {
        if let Err(i) = self.produced.binary_search(&hash) {
            self.produced.insert(i, hash);
        }
    }
}
