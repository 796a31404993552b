//! # Partition Ledgers
//!
//! Singleton system accounts per partition.
//!
//! ## Counters
//!
//! Each [`PartitionLedger`] tracks one remote partition in both directions.
//!
//! | Counter | Direction | Meaning |
//! |---------|-----------|---------|
//! | `produced` | outbound | transactions created for the partition; the last sequence number |
//! | `delivered` | outbound | transactions handed to the dispatcher |
//! | `acknowledged` | outbound | transactions the partition reports having executed |
//! | `received` | inbound | highest sequence number seen from the partition |
//! | `executed` | inbound | highest sequence number applied contiguously |
//!
//! Invariant: `acknowledged <= delivered <= produced`.

use crate::partition::PartitionId;
use crate::url::Url;
use crate::Hash;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What to do with an inbound sequenced transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundDisposition {
    /// Next in sequence; execute now.
    Ready,
    /// Ahead of sequence; parked until its predecessors execute.
    Parked,
    /// Already executed.
    Duplicate,
}

/// Counters for one remote partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionLedger {
    /// Remote partition.
    pub partition: PartitionId,
    /// Outbound: created.
    pub produced: u64,
    /// Outbound: dispatched.
    pub delivered: u64,
    /// Outbound: executed remotely.
    pub acknowledged: u64,
    /// Inbound: highest sequence seen.
    pub received: u64,
    /// Inbound: highest sequence applied contiguously.
    pub executed: u64,
    /// Inbound: parked sequence numbers.
    pub pending: BTreeMap<u64, Hash>,
}

impl PartitionLedger {
    /// Empty counters for a partition.
    pub fn new(partition: PartitionId) -> Self {
        Self {
            partition,
            produced: 0,
            delivered: 0,
            acknowledged: 0,
            received: 0,
            executed: 0,
            pending: BTreeMap::new(),
        }
    }

    /// Assign the next outbound sequence number.
    pub fn produce(&mut self) -> u64 {
        self.produced += 1;
        self.produced
    }

    /// Record `count` more outbound transactions as dispatched. The
    /// total never exceeds `produced`.
    pub fn deliver(&mut self, count: u64) {
        self.delivered = (self.delivered + count).min(self.produced);
    }

    /// Advance `acknowledged` to `count`, capped at `delivered`. Returns
    /// true if the counter moved. Lower or repeated reports are no-ops.
    pub fn acknowledge(&mut self, count: u64) -> bool {
        let target = count.min(self.delivered);
        if target > self.acknowledged {
            self.acknowledged = target;
            return true;
        }
        false
    }

    /// Classify an inbound sequence number and record it.
    pub fn receive(&mut self, sequence: u64, hash: Hash) -> InboundDisposition {
        if sequence <= self.executed {
            return InboundDisposition::Duplicate;
        }
        self.received = self.received.max(sequence);
        if sequence == self.executed + 1 {
            return InboundDisposition::Ready;
        }
        self.pending.entry(sequence).or_insert(hash);
        InboundDisposition::Parked
    }

    /// Mark `sequence` as executed. Must be `executed + 1`.
    pub fn mark_executed(&mut self, sequence: u64) -> bool {
        if sequence != self.executed + 1 {
            return false;
        }
        self.executed = sequence;
        self.pending.remove(&sequence);
        true
    }

    /// The parked transaction that is now next in sequence, if any.
    pub fn next_ready(&self) -> Option<(u64, Hash)> {
        let next = self.executed + 1;
        self.pending.get(&next).map(|h| (next, *h))
    }

    /// True if the outbound invariant holds.
    pub fn is_consistent(&self) -> bool {
        self.acknowledged <= self.delivered && self.delivered <= self.produced
    }
}

fn entry<'a>(sequence: &'a mut Vec<PartitionLedger>, partition: &PartitionId) -> &'a mut PartitionLedger {
    let index = match sequence.binary_search_by(|p| p.partition.cmp(partition)) {
        Ok(i) => i,
        Err(i) => {
            sequence.insert(i, PartitionLedger::new(partition.clone()));
            i
        }
    };
    &mut sequence[index]
}

/// Synthetic transaction counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntheticLedger {
    /// URL.
    pub url: Url,
    /// One entry per remote partition, sorted.
    pub sequence: Vec<PartitionLedger>,
}

impl SyntheticLedger {
    /// Empty ledger.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            sequence: Vec::new(),
        }
    }

    /// Counters for a partition.
    pub fn partition(&self, partition: &PartitionId) -> Option<&PartitionLedger> {
        self.sequence.iter().find(|p| &p.partition == partition)
    }

    /// Counters for a partition, created on first use.
    pub fn partition_mut(&mut self, partition: &PartitionId) -> &mut PartitionLedger {
        entry(&mut self.sequence, partition)
    }
}

/// Anchor counters, held by the anchor pool account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorLedger {
    /// URL.
    pub url: Url,
    /// One entry per remote partition, sorted.
    pub sequence: Vec<PartitionLedger>,
    /// Current major block index.
    pub major_block_index: u64,
    /// Minor block at which the current major block opened.
    pub major_block_start: u64,
    /// Major block requested by the directory and not yet opened.
    pub pending_major_block: Option<u64>,
}

impl AnchorLedger {
    /// Empty ledger.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            sequence: Vec::new(),
            major_block_index: 0,
            major_block_start: 0,
            pending_major_block: None,
        }
    }

    /// Counters for a partition.
    pub fn partition(&self, partition: &PartitionId) -> Option<&PartitionLedger> {
        self.sequence.iter().find(|p| &p.partition == partition)
    }

    /// Counters for a partition, created on first use.
    pub fn partition_mut(&mut self, partition: &PartitionId) -> &mut PartitionLedger {
        entry(&mut self.sequence, partition)
    }
}

/// Block ledger: the partition's block index and time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemLedger {
    /// URL.
    pub url: Url,
    /// Last committed block index.
    pub index: u64,
    /// Last committed block time.
    pub timestamp: u64,
}

impl SystemLedger {
    /// Ledger before the first block.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            index: 0,
            timestamp: 0,
        }
    }
}
