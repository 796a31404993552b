//! # Executor Entities
//!
//! Per-block working state and what the executor reports back.

use mr_01_layered_batch::BatchId;
use shared_types::{
    Envelope, Hash, NetworkAccountUpdate, PartitionId, Receipt, Signature, Transaction, TransactionResult,
    TransactionStatus, Url,
};
use std::collections::{BTreeSet, VecDeque};

/// Result of committing a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockOutcome {
    /// Block index.
    pub index: u64,
    /// State trie root after the commit.
    pub state_root: Hash,
    /// Root chain anchor of the block.
    pub root_anchor: Hash,
    /// Transactions executed in the block.
    pub executed: usize,
    /// Synthetic transactions produced in the block.
    pub produced: usize,
    /// Envelopes handed to the dispatcher.
    pub dispatched: usize,
    /// Major block requested by the directory, if one arrived.
    pub major_block: Option<u64>,
}

/// A stored transaction with everything known about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueriedTransaction {
    /// The transaction.
    pub transaction: Transaction,
    /// Its status.
    pub status: TransactionStatus,
    /// Signatures received for it.
    pub signatures: Vec<Signature>,
}

/// Receipt for one chain a transaction was recorded on. Failures are kept
/// per chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainReceipt {
    /// Account owning the chain.
    pub account: Url,
    /// Chain name.
    pub chain: String,
    /// Index of the transaction on the chain.
    pub index: u64,
    /// Proof to the partition's root anchor, or why it could not be built.
    pub receipt: Result<Receipt, String>,
}

/// What a handler did.
#[derive(Debug, Clone, Default)]
pub struct HandlerOutput {
    /// Result recorded on the status.
    pub result: TransactionResult,
    /// Transactions to send to other accounts. Header initiators are
    /// filled in by the synthetic producer.
    pub produced: Vec<Transaction>,
}

impl HandlerOutput {
    /// Output with a result and nothing produced.
    pub fn result(result: TransactionResult) -> Self {
        Self {
            result,
            produced: Vec::new(),
        }
    }

    /// Add a produced transaction.
    pub fn produce(mut self, transaction: Transaction) -> Self {
        self.produced.push(transaction);
        self
    }
}

/// Work queued behind the current delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Queued {
    /// Execute a known transaction whose turn has come.
    Execute(Hash),
    /// Re-check the signatures of a known transaction.
    Evaluate(Hash),
    /// Internal transaction, executed without signatures.
    Internal(Transaction),
}

/// A partition anchor received by the directory in this block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedAnchor {
    /// Hash of the anchor transaction.
    pub transaction: Hash,
    /// Sending partition.
    pub partition: PartitionId,
    /// Index of the anchor on `anchor(P)-root`.
    pub chain_index: u64,
    /// Sequence number the anchor arrived with.
    pub sequence: u64,
}

/// State of the open block.
#[derive(Debug)]
pub struct BlockState {
    /// Root batch of the block.
    pub batch: BatchId,
    /// Block index.
    pub index: u64,
    /// Block time.
    pub time: u64,
    /// Chains that received entries, as (account, chain).
    pub touched: BTreeSet<(Url, String)>,
    /// Synthetic transactions produced, in production order.
    pub produced: Vec<Hash>,
    /// Deliveries waiting behind the current one.
    pub queue: VecDeque<Queued>,
    /// Partition anchors received (directory only).
    pub anchors: Vec<ReceivedAnchor>,
    /// Envelopes to dispatch after commit.
    pub outbound: Vec<(PartitionId, Envelope)>,
    /// Transactions executed.
    pub executed: usize,
    /// Major block signalled in this block.
    pub major_block: Option<u64>,
    /// Network updates for the next directory anchor (directory only).
    pub updates: Vec<NetworkAccountUpdate>,
}

impl BlockState {
    /// Fresh state for a block.
    pub fn new(batch: BatchId, index: u64, time: u64) -> Self {
        Self {
            batch,
            index,
            time,
            touched: BTreeSet::new(),
            produced: Vec::new(),
            queue: VecDeque::new(),
            anchors: Vec::new(),
            outbound: Vec::new(),
            executed: 0,
            major_block: None,
            updates: Vec::new(),
        }
    }

    /// Record a chain as touched.
    pub fn touch(&mut self, account: &Url, chain: &str) {
        self.touched.insert((account.clone(), chain.to_string()));
    }

    /// Current lengths of the per-block lists.
    pub fn mark(&self) -> BlockMark {
        BlockMark {
            produced: self.produced.len(),
            queue: self.queue.len(),
            anchors: self.anchors.len(),
            outbound: self.outbound.len(),
            executed: self.executed,
        }
    }

    /// Forget everything recorded since `mark`. Touched chains are kept;
    /// anchoring skips chains that did not grow.
    pub fn rewind(&mut self, mark: &BlockMark) {
        self.produced.truncate(mark.produced);
        self.queue.truncate(mark.queue);
        self.anchors.truncate(mark.anchors);
        self.outbound.truncate(mark.outbound);
        self.executed = mark.executed;
    }
}

/// Position in a [`BlockState`] to rewind to when a scope is discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockMark {
    produced: usize,
    queue: usize,
    anchors: usize,
    outbound: usize,
    executed: usize,
}
