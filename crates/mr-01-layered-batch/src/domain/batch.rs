//! # Layered Batch Arena
//!
//! Batches form a tree. A root batch sits directly on the store; a child
//! batch sits on its parent. Writes stay in the batch that made them until
//! it commits: a child commit merges into the parent, a root commit writes
//! everything to the store in one atomic call. Discarding drops the writes.
//!
//! ## Isolation
//!
//! Every write is stamped from a monotonic clock. A child reads its
//! ancestors as they were when it was created: it sees a parent's entry
//! only if the entry's stamp is not later than the child's creation
//! stamp. Moving further up, the bound tightens to the creation stamp of
//! each ancestor passed. Two siblings therefore never see each other's
//! writes, even after one of them commits, while a child created after the
//! commit does.
//!
//! Root batches read the store directly and are not isolated from each
//! other.
//!
//! ## Lifecycle
//!
//! Using a batch after it was committed or discarded panics. Closing a
//! batch discards any children still open under it.

use super::errors::BatchError;
use crate::ports::outbound::{BatchOperation, KeyValueStore};
use shared_types::Hash;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::{debug, trace};

/// Handle to a batch in a [`LayeredBatch`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, std::hash::Hash, PartialOrd, Ord)]
pub struct BatchId(u64);

impl BatchId {
    /// Numeric id.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
struct Version {
    stamp: u64,
    value: Option<Vec<u8>>,
}

#[derive(Debug)]
struct BatchNode {
    parent: Option<BatchId>,
    writable: bool,
    created_at: u64,
    open_children: usize,
    values: HashMap<Vec<u8>, Vec<Version>>,
    state_updates: BTreeMap<Hash, Hash>,
}

impl BatchNode {
    fn new(parent: Option<BatchId>, writable: bool, created_at: u64) -> Self {
        Self {
            parent,
            writable,
            created_at,
            open_children: 0,
            values: HashMap::new(),
            state_updates: BTreeMap::new(),
        }
    }

    /// Latest version visible to a reader bounded by `bound`.
    fn visible(&self, key: &[u8], bound: u64) -> Option<&Version> {
        self.values
            .get(key)
            .and_then(|history| history.iter().rev().find(|v| v.stamp <= bound))
    }

    /// Record a version. Older versions are only kept while a child could
    /// still need them.
    fn record(&mut self, key: Vec<u8>, version: Version) {
        let history = self.values.entry(key).or_default();
        if self.open_children == 0 {
            history.clear();
        }
        history.push(version);
    }
}

/// Arena of nested copy-on-write batches over a key-value store.
pub struct LayeredBatch {
    store: Box<dyn KeyValueStore>,
    nodes: HashMap<u64, BatchNode>,
    next_id: u64,
    clock: u64,
}

impl LayeredBatch {
    /// Create an arena over `store`.
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        Self {
            store,
            nodes: HashMap::new(),
            next_id: 1,
            clock: 0,
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    /// Number of open batches.
    pub fn open_count(&self) -> usize {
        self.nodes.len()
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn node(&self, id: BatchId) -> &BatchNode {
        match self.nodes.get(&id.0) {
            Some(node) => node,
            None => panic!("batch {id} used after it was closed"),
        }
    }

    fn node_mut(&mut self, id: BatchId) -> &mut BatchNode {
        match self.nodes.get_mut(&id.0) {
            Some(node) => node,
            None => panic!("batch {id} used after it was closed"),
        }
    }

    fn insert(&mut self, node: BatchNode) -> BatchId {
        let id = BatchId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id.0, node);
        id
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Open a root batch directly on the store.
    pub fn begin(&mut self, writable: bool) -> BatchId {
        let stamp = self.tick();
        let id = self.insert(BatchNode::new(None, writable, stamp));
        trace!("[mr-01] Opened root batch {id} (writable: {writable})");
        id
    }

    /// Open a child of `parent`. A child of a read-only batch is read-only.
    pub fn begin_child(&mut self, parent: BatchId, writable: bool) -> BatchId {
        let parent_writable = self.node(parent).writable;
        let stamp = self.tick();
        self.node_mut(parent).open_children += 1;
        let id = self.insert(BatchNode::new(
            Some(parent),
            writable && parent_writable,
            stamp,
        ));
        trace!("[mr-01] Opened batch {id} under {parent}");
        id
    }

    /// True if the batch is still open.
    pub fn is_open(&self, id: BatchId) -> bool {
        self.nodes.contains_key(&id.0)
    }

    /// True if the batch accepts writes.
    pub fn is_writable(&self, id: BatchId) -> bool {
        self.node(id).writable
    }

    /// Parent of a child batch.
    pub fn parent(&self, id: BatchId) -> Option<BatchId> {
        self.node(id).parent
    }

    /// Number of keys written in this batch.
    pub fn pending_writes(&self, id: BatchId) -> usize {
        self.node(id).values.len()
    }

    /// Commit the batch into its parent, or into the store for a root.
    pub fn commit(&mut self, id: BatchId) -> Result<(), BatchError> {
        let node = self.node(id);
        if node.parent.is_none() && !node.state_updates.is_empty() {
            return Err(BatchError::UnfoldedStateUpdates(node.state_updates.len()));
        }
        self.close_children(id);
        let node = self.close(id);
        if !node.writable {
            return Ok(());
        }

        match node.parent {
            Some(parent) => {
                let count = node.values.len();
                for (key, mut history) in node.values {
                    if let Some(latest) = history.pop() {
                        let stamp = self.tick();
                        self.node_mut(parent).record(
                            key,
                            Version {
                                stamp,
                                value: latest.value,
                            },
                        );
                    }
                }
                self.node_mut(parent)
                    .state_updates
                    .extend(node.state_updates);
                trace!("[mr-01] Merged batch {id} into {parent} ({count} keys)");
            }
            None => {
                let mut operations: Vec<BatchOperation> = node
                    .values
                    .into_iter()
                    .filter_map(|(key, mut history)| {
                        history.pop().map(|latest| match latest.value {
                            Some(value) => BatchOperation::Put { key, value },
                            None => BatchOperation::Delete { key },
                        })
                    })
                    .collect();
                if operations.is_empty() {
                    return Ok(());
                }
                operations.sort_by(|a, b| op_key(a).cmp(op_key(b)));
                let count = operations.len();
                self.store.atomic_batch_write(operations)?;
                debug!("[mr-01] Committed root batch {id} ({count} writes)");
            }
        }
        Ok(())
    }

    /// Drop the batch and everything written through it.
    pub fn discard(&mut self, id: BatchId) {
        self.close_children(id);
        let node = self.close(id);
        trace!(
            "[mr-01] Discarded batch {id} ({} keys dropped)",
            node.values.len()
        );
    }

    fn close(&mut self, id: BatchId) -> BatchNode {
        let node = match self.nodes.remove(&id.0) {
            Some(node) => node,
            None => panic!("batch {id} used after it was closed"),
        };
        if let Some(parent) = node.parent {
            if let Some(p) = self.nodes.get_mut(&parent.0) {
                p.open_children = p.open_children.saturating_sub(1);
            }
        }
        node
    }

    fn close_children(&mut self, id: BatchId) {
        if self.node(id).open_children == 0 {
            return;
        }
        let children: Vec<BatchId> = self
            .nodes
            .iter()
            .filter(|(_, n)| n.parent == Some(id))
            .map(|(k, _)| BatchId(*k))
            .collect();
        for child in children {
            self.discard(child);
        }
    }

    // =========================================================================
    // READS AND WRITES
    // =========================================================================

    /// Read a key through the batch and its ancestors.
    pub fn get(&self, id: BatchId, key: &[u8]) -> Result<Option<Vec<u8>>, BatchError> {
        for (node, bound) in self.layers(id) {
            if let Some(version) = node.visible(key, bound) {
                return Ok(version.value.clone());
            }
        }
        Ok(self.store.get(key)?)
    }

    /// All visible entries whose key starts with `prefix`, in key order.
    pub fn scan(&self, id: BatchId, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, BatchError> {
        let mut merged: BTreeMap<Vec<u8>, Option<Vec<u8>>> = self
            .store
            .prefix_scan(prefix)?
            .into_iter()
            .map(|(k, v)| (k, Some(v)))
            .collect();
        for (node, bound) in self.layers(id).into_iter().rev() {
            for key in node.values.keys().filter(|k| k.starts_with(prefix)) {
                if let Some(version) = node.visible(key, bound) {
                    merged.insert(key.clone(), version.value.clone());
                }
            }
        }
        Ok(merged
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k, v)))
            .collect())
    }

    /// The batch followed by its ancestors, each with the stamp bound
    /// under which it is visible.
    fn layers(&self, id: BatchId) -> Vec<(&BatchNode, u64)> {
        let mut layers = Vec::new();
        let mut node = self.node(id);
        let mut bound = u64::MAX;
        loop {
            layers.push((node, bound));
            bound = bound.min(node.created_at);
            match node.parent {
                Some(parent) => node = self.node(parent),
                None => return layers,
            }
        }
    }

    /// Write a key.
    pub fn put(&mut self, id: BatchId, key: Vec<u8>, value: Vec<u8>) -> Result<(), BatchError> {
        self.write(id, key, Some(value))
    }

    /// Delete a key.
    pub fn delete(&mut self, id: BatchId, key: Vec<u8>) -> Result<(), BatchError> {
        self.write(id, key, None)
    }

    fn write(&mut self, id: BatchId, key: Vec<u8>, value: Option<Vec<u8>>) -> Result<(), BatchError> {
        if !self.node(id).writable {
            return Err(BatchError::ReadOnly(id.0));
        }
        let stamp = self.tick();
        self.node_mut(id).record(key, Version { stamp, value });
        Ok(())
    }

    // =========================================================================
    // STATE TREE UPDATES
    // =========================================================================

    /// Buffer a state-tree entry. Entries travel up with commits and must
    /// be taken from the root before it commits.
    pub fn put_state_entry(&mut self, id: BatchId, key: Hash, value: Hash) -> Result<(), BatchError> {
        let node = self.node_mut(id);
        if !node.writable {
            return Err(BatchError::ReadOnly(id.0));
        }
        node.state_updates.insert(key, value);
        Ok(())
    }

    /// Buffered state-tree entries of this batch.
    pub fn state_updates(&self, id: BatchId) -> &BTreeMap<Hash, Hash> {
        &self.node(id).state_updates
    }

    /// Remove and return the buffered state-tree entries.
    pub fn take_state_updates(&mut self, id: BatchId) -> BTreeMap<Hash, Hash> {
        std::mem::take(&mut self.node_mut(id).state_updates)
    }
}

fn op_key(op: &BatchOperation) -> &[u8] {
    match op {
        BatchOperation::Put { key, .. } | BatchOperation::Delete { key } => key,
    }
}

impl fmt::Debug for LayeredBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayeredBatch")
            .field("open", &self.nodes.len())
            .field("clock", &self.clock)
            .finish()
    }
}
