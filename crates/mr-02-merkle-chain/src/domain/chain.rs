//! # Merkle Chain
//!
//! An append-only list of hashes with a Merkle anchor. A chain is a
//! descriptor (record prefix plus mark power); the records live in a
//! [`ChainStore`] passed to each call.
//!
//! ## Records
//!
//! | Record | Key suffix | Value |
//! |--------|------------|-------|
//! | head | `head` | current [`MerkleState`] |
//! | entry | `element/<i>` | entry hash |
//! | reverse index | `index/<hash>` | entry index |
//! | subtree | `subtree/<level>/<start>` | root of a complete subtree, levels ≥ mark power |
//! | mark | `mark/<k>` | state after `k * 2^markPower` entries |
//!
//! A receipt touches at most `2^markPower` entries for the part of the
//! path below the mark level, plus one stored subtree per level above it.

use super::errors::ChainError;
use super::state::MerkleState;
use crate::ports::outbound::ChainStore;
use mr_01_layered_batch::Key;
use shared_types::encoding::{decode, encode};
use shared_types::{Hash, Receipt, ReceiptEntry};
use shared_crypto::combine;

/// Default mark power: a checkpoint every 256 entries.
pub const DEFAULT_MARK_POWER: u32 = 8;

/// Largest supported mark power.
pub const MAX_MARK_POWER: u32 = 16;

/// Descriptor of one chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleChain {
    prefix: Key,
    mark_power: u32,
}

impl MerkleChain {
    /// Chain stored under `prefix`. The mark power is clamped to
    /// [`MAX_MARK_POWER`].
    pub fn new(prefix: Key, mark_power: u32) -> Self {
        Self {
            prefix,
            mark_power: mark_power.min(MAX_MARK_POWER),
        }
    }

    /// Record prefix.
    pub fn prefix(&self) -> &Key {
        &self.prefix
    }

    /// Entries between marks.
    pub fn mark_frequency(&self) -> u64 {
        1 << self.mark_power
    }

    fn key(&self, part: &str) -> Key {
        self.prefix.clone().push(part)
    }

    fn head_key(&self) -> Key {
        self.key("head")
    }

    fn element_key(&self, index: u64) -> Key {
        self.key("element").push(index)
    }

    fn index_key(&self, hash: &Hash) -> Key {
        self.key("index").push(hash)
    }

    fn subtree_key(&self, level: u32, start: u64) -> Key {
        self.key("subtree").push(level as u64).push(start)
    }

    fn mark_key(&self, mark: u64) -> Key {
        self.key("mark").push(mark)
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// Current state.
    pub fn head<S: ChainStore + ?Sized>(&self, store: &S) -> Result<MerkleState, ChainError> {
        match store.get(self.head_key().as_bytes())? {
            Some(bytes) => Ok(decode("merkle state", &bytes)?),
            None => Ok(MerkleState::new()),
        }
    }

    /// Number of entries.
    pub fn height<S: ChainStore + ?Sized>(&self, store: &S) -> Result<u64, ChainError> {
        Ok(self.head(store)?.count)
    }

    /// Current anchor.
    pub fn anchor<S: ChainStore + ?Sized>(&self, store: &S) -> Result<Hash, ChainError> {
        Ok(self.head(store)?.anchor())
    }

    /// Entry at `index`.
    pub fn entry<S: ChainStore + ?Sized>(&self, store: &S, index: u64) -> Result<Hash, ChainError> {
        match store.get(self.element_key(index).as_bytes())? {
            Some(bytes) => Ok(decode("chain entry", &bytes)?),
            None => {
                let height = self.height(store)?;
                if index >= height {
                    Err(ChainError::OutOfRange { index, height })
                } else {
                    Err(ChainError::Missing(format!("entry {index}")))
                }
            }
        }
    }

    /// Entries in `[start, end)`, clipped to the chain height.
    pub fn entries<S: ChainStore + ?Sized>(
        &self,
        store: &S,
        start: u64,
        end: u64,
    ) -> Result<Vec<Hash>, ChainError> {
        let end = end.min(self.height(store)?);
        (start..end).map(|i| self.entry(store, i)).collect()
    }

    /// Index of the first occurrence of `hash`.
    pub fn height_of<S: ChainStore + ?Sized>(
        &self,
        store: &S,
        hash: &Hash,
    ) -> Result<Option<u64>, ChainError> {
        match store.get(self.index_key(hash).as_bytes())? {
            Some(bytes) => Ok(Some(decode("chain index", &bytes)?)),
            None => Ok(None),
        }
    }

    /// State after the first `height` entries.
    pub fn state_at<S: ChainStore + ?Sized>(
        &self,
        store: &S,
        height: u64,
    ) -> Result<MerkleState, ChainError> {
        let head = self.head(store)?;
        if height == head.count {
            return Ok(head);
        }
        if height > head.count {
            return Err(ChainError::OutOfRange {
                index: height,
                height: head.count,
            });
        }
        let mark = height >> self.mark_power;
        let mut state = if mark == 0 {
            MerkleState::new()
        } else {
            match store.get(self.mark_key(mark).as_bytes())? {
                Some(bytes) => decode("merkle mark", &bytes)?,
                None => return Err(ChainError::Missing(format!("mark {mark}"))),
            }
        };
        for i in state.count..height {
            state.add(self.entry(store, i)?);
        }
        Ok(state)
    }

    /// Anchor after the first `height` entries.
    pub fn anchor_at<S: ChainStore + ?Sized>(&self, store: &S, height: u64) -> Result<Hash, ChainError> {
        Ok(self.state_at(store, height)?.anchor())
    }

    /// Root of the complete subtree of `2^level` entries starting at
    /// `start`.
    fn subtree_root<S: ChainStore + ?Sized>(
        &self,
        store: &S,
        level: u32,
        start: u64,
    ) -> Result<Hash, ChainError> {
        if level == 0 {
            return self.entry(store, start);
        }
        if level >= self.mark_power {
            return match store.get(self.subtree_key(level, start).as_bytes())? {
                Some(bytes) => Ok(decode("subtree root", &bytes)?),
                None => Err(ChainError::Missing(format!("subtree {level}/{start}"))),
            };
        }
        let half = 1u64 << (level - 1);
        let left = self.subtree_root(store, level - 1, start)?;
        let right = self.subtree_root(store, level - 1, start + half)?;
        Ok(combine(&left, &right))
    }

    /// Proof that entry `from` is included in the anchor at height
    /// `to + 1`.
    pub fn receipt<S: ChainStore + ?Sized>(
        &self,
        store: &S,
        from: u64,
        to: u64,
    ) -> Result<Receipt, ChainError> {
        if from > to {
            return Err(ChainError::InvalidRange { from, to });
        }
        let height = self.height(store)?;
        if to >= height {
            return Err(ChainError::OutOfRange { index: to, height });
        }

        let start = self.entry(store, from)?;
        let size = to + 1;
        let state = self.state_at(store, size)?;
        let peaks = state.peaks();

        // The peak containing `from`: peaks are laid out highest level
        // first from index zero.
        let mut offset = 0u64;
        let mut target = None;
        for (i, (level, _)) in peaks.iter().enumerate().rev() {
            let width = 1u64 << level;
            if from < offset + width {
                target = Some((i, *level, offset));
                break;
            }
            offset += width;
        }
        let Some((peak_index, peak_level, peak_start)) = target else {
            return Err(ChainError::OutOfRange { index: from, height: size });
        };

        let mut entries = Vec::new();
        for level in 0..peak_level {
            let node = from >> level;
            let sibling_start = (node ^ 1) << level;
            debug_assert!(sibling_start >= peak_start);
            let sibling = self.subtree_root(store, level, sibling_start)?;
            if node & 1 == 0 {
                entries.push(ReceiptEntry::right(sibling));
            } else {
                entries.push(ReceiptEntry::left(sibling));
            }
        }

        if peak_index > 0 {
            let lower = peaks[..peak_index]
                .iter()
                .map(|(_, h)| *h)
                .reduce(|acc, peak| combine(&peak, &acc));
            if let Some(lower) = lower {
                entries.push(ReceiptEntry::right(lower));
            }
        }
        for (_, peak) in &peaks[peak_index + 1..] {
            entries.push(ReceiptEntry::left(*peak));
        }

        Ok(Receipt::from_entries(start, entries))
    }

    // =========================================================================
    // WRITES
    // =========================================================================

    /// Append an entry. Returns its index.
    pub fn add<S: ChainStore + ?Sized>(&self, store: &mut S, hash: Hash) -> Result<u64, ChainError> {
        let mut state = self.head(store)?;
        let index = state.count;
        let completed = state.add(hash);

        store.put(self.element_key(index).into_bytes(), encode("chain entry", &hash)?)?;
        if self.height_of(store, &hash)?.is_none() {
            store.put(self.index_key(&hash).into_bytes(), encode("chain index", &index)?)?;
        }
        for (level, root) in completed {
            if level >= self.mark_power && level > 0 {
                let start = state.count - (1u64 << level);
                store.put(
                    self.subtree_key(level, start).into_bytes(),
                    encode("subtree root", &root)?,
                )?;
            }
        }
        if state.count % self.mark_frequency() == 0 {
            let mark = state.count >> self.mark_power;
            store.put(self.mark_key(mark).into_bytes(), encode("merkle mark", &state)?)?;
        }
        store.put(self.head_key().into_bytes(), encode("merkle state", &state)?)?;
        Ok(index)
    }

    /// Replace the head with a compact state. Entries before the restored
    /// count are not available afterwards; appending continues normally.
    pub fn restore_head<S: ChainStore + ?Sized>(
        &self,
        store: &mut S,
        state: &MerkleState,
    ) -> Result<(), ChainError> {
        store.put(self.head_key().into_bytes(), encode("merkle state", state)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryChainStore;
    use shared_crypto::sha256;

    fn h(i: u64) -> Hash {
        sha256(&i.to_be_bytes())
    }

    fn chain(mark_power: u32) -> MerkleChain {
        MerkleChain::new(Key::new("chain").push("test"), mark_power)
    }

    fn filled(mark_power: u32, n: u64) -> (MerkleChain, MemoryChainStore) {
        let chain = chain(mark_power);
        let mut store = MemoryChainStore::new();
        for i in 0..n {
            assert_eq!(chain.add(&mut store, h(i)).unwrap(), i);
        }
        (chain, store)
    }

    #[test]
    fn test_height_entries_and_lookup() {
        let (chain, store) = filled(2, 10);
        assert_eq!(chain.height(&store).unwrap(), 10);
        assert_eq!(chain.entry(&store, 4).unwrap(), h(4));
        assert_eq!(chain.entries(&store, 8, 20).unwrap(), vec![h(8), h(9)]);
        assert_eq!(chain.height_of(&store, &h(7)).unwrap(), Some(7));
        assert_eq!(chain.height_of(&store, &h(70)).unwrap(), None);
        assert!(matches!(
            chain.entry(&store, 10),
            Err(ChainError::OutOfRange { index: 10, height: 10 })
        ));
    }

    #[test]
    fn test_state_at_matches_incremental_anchor() {
        let (chain, store) = filled(2, 23);
        let mut state = MerkleState::new();
        for i in 0..23 {
            assert_eq!(chain.anchor_at(&store, i).unwrap(), state.anchor());
            state.add(h(i));
        }
        assert_eq!(chain.anchor(&store).unwrap(), state.anchor());
    }

    #[test]
    fn test_every_receipt_proves_against_its_anchor() {
        let (chain, store) = filled(2, 37);
        for to in 0..37 {
            let anchor = chain.anchor_at(&store, to + 1).unwrap();
            for from in 0..=to {
                let receipt = chain.receipt(&store, from, to).unwrap();
                assert_eq!(receipt.start, h(from));
                assert_eq!(receipt.anchor, anchor, "from {from} to {to}");
                assert!(receipt.is_valid());
            }
        }
    }

    #[test]
    fn test_receipt_reads_are_bounded_by_mark() {
        let (chain, store) = filled(3, 300);
        store.reset_reads();
        let receipt = chain.receipt(&store, 5, 299).unwrap();
        assert!(receipt.is_valid());
        // 8 entries per mark, one stored subtree per higher level, a
        // handful of head/mark reads.
        assert!(store.reads() < 64, "reads: {}", store.reads());
    }

    #[test]
    fn test_receipt_rejects_bad_ranges() {
        let (chain, store) = filled(2, 4);
        assert!(matches!(
            chain.receipt(&store, 3, 2),
            Err(ChainError::InvalidRange { from: 3, to: 2 })
        ));
        assert!(matches!(
            chain.receipt(&store, 0, 4),
            Err(ChainError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_duplicate_entry_keeps_first_index() {
        let chain = chain(2);
        let mut store = MemoryChainStore::new();
        chain.add(&mut store, h(1)).unwrap();
        chain.add(&mut store, h(1)).unwrap();
        assert_eq!(chain.height_of(&store, &h(1)).unwrap(), Some(0));
        assert_eq!(chain.height(&store).unwrap(), 2);
    }

    #[test]
    fn test_restore_head_continues_anchor() {
        let (full_chain, full) = filled(2, 13);
        let head = full_chain.head(&full).unwrap();

        let restored_chain = chain(2);
        let mut restored = MemoryChainStore::new();
        restored_chain.restore_head(&mut restored, &head).unwrap();
        assert_eq!(restored_chain.height(&restored).unwrap(), 13);
        assert!(matches!(
            restored_chain.entry(&restored, 3),
            Err(ChainError::Missing(_))
        ));

        let mut full = full;
        full_chain.add(&mut full, h(99)).unwrap();
        restored_chain.add(&mut restored, h(99)).unwrap();
        assert_eq!(
            full_chain.anchor(&full).unwrap(),
            restored_chain.anchor(&restored).unwrap()
        );
    }
}
