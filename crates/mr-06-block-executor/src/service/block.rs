//! Block lifecycle.

use super::anchors::{self, BlockAnchor};
use super::context::ExecContext;
use super::{drain_queue, synthetic, Executor};
use crate::domain::entities::{BlockOutcome, BlockState};
use crate::domain::errors::ExecutorError;
use mr_02_merkle_chain::{is_index_chain, IndexEntry, ROOT_CHAIN};
use mr_04_ledger_database::LedgerReader;
use shared_types::{Account, Hash};
use tracing::{debug, info, warn};

impl Executor {
    /// Open block `index` at `time`.
    pub fn begin_block(&mut self, index: u64, time: u64) -> Result<(), ExecutorError> {
        if let Some(block) = &self.block {
            return Err(ExecutorError::BlockInProgress(block.index));
        }
        let last = {
            let view = self.db.view(None);
            match view.account(&self.node.id().ledger_url())? {
                Some(Account::SystemLedger(ledger)) => ledger.index,
                _ => 0,
            }
        };
        if index <= last {
            return Err(ExecutorError::BlockOutOfOrder { index, last });
        }
        let batch = self.db.begin(true);
        self.block = Some(BlockState::new(batch, index, time));
        debug!("[mr-06] {} block {} opened", self.node.id(), index);
        Ok(())
    }

    /// Drop the open block and everything delivered into it.
    pub fn abort_block(&mut self) -> Result<(), ExecutorError> {
        let block = self.block.take().ok_or(ExecutorError::NoBlock)?;
        self.db.discard(block.batch);
        warn!("[mr-06] {} block {} aborted", self.node.id(), block.index);
        Ok(())
    }

    /// Anchor, commit and dispatch the open block.
    pub fn end_block(&mut self) -> Result<BlockOutcome, ExecutorError> {
        let mut block = self.block.take().ok_or(ExecutorError::NoBlock)?;
        let prior_state = self.db.bpt_root();
        let root_anchor = {
            let mut ctx = ExecContext::new(&self.node, &mut self.db, block.batch, &mut block);
            seal(&mut ctx, prior_state)
        };
        let root_anchor = match root_anchor {
            Ok(anchor) => anchor,
            Err(e) => {
                self.db.discard(block.batch);
                warn!("[mr-06] {} block {} failed to seal: {}", self.node.id(), block.index, e);
                return Err(e);
            }
        };
        self.db.commit(block.batch)?;

        let dispatched = block.outbound.len();
        for (destination, envelope) in block.outbound.drain(..) {
            self.dispatcher.submit(&destination, envelope);
        }

        let state_root = self.db.bpt_root();
        self.maybe_snapshot(block.index);
        info!(
            "[mr-06] {} block {} committed: {} executed, {} produced, {} dispatched, root {}",
            self.node.id(),
            block.index,
            block.executed,
            block.produced.len(),
            dispatched,
            hex::encode(&state_root[..8])
        );
        Ok(BlockOutcome {
            index: block.index,
            state_root,
            root_anchor,
            executed: block.executed,
            produced: block.produced.len(),
            dispatched,
            major_block: block.major_block,
        })
    }

    fn maybe_snapshot(&self, index: u64) {
        let interval = self.node.config.snapshot_interval;
        let Some(queue) = &self.background else {
            return;
        };
        if interval == 0 || index % interval != 0 {
            return;
        }
        match self.db.collect(self.node.id(), index, self.node.config.preserve_history) {
            Ok(bytes) => {
                if !queue.export_snapshot(self.node.id().clone(), index, bytes) {
                    warn!("[mr-06] Background queue closed, snapshot at {index} dropped");
                }
            }
            Err(e) => warn!("[mr-06] Snapshot at {index} failed: {e}"),
        }
    }
}

/// Everything between the last delivery and the commit. Returns the
/// block's root anchor.
fn seal(ctx: &mut ExecContext<'_>, prior_state: Hash) -> Result<Hash, ExecutorError> {
    drain_queue(ctx)?;
    let make_major_block = schedule_major_block(ctx)?;

    let mut ledger = ctx.system_ledger()?;
    ledger.index = ctx.block.index;
    ledger.timestamp = ctx.block.time;
    ctx.put_account(&Account::SystemLedger(ledger))?;

    let (root_anchor, root_index) = anchor_chains(ctx)?;
    synthetic::send_produced(ctx, &root_anchor)?;
    anchors::emit(
        ctx,
        BlockAnchor {
            root_anchor,
            root_index,
            state_root: prior_state,
            make_major_block,
        },
    )?;
    Ok(root_anchor)
}

/// On the directory, open a major block every `major_block_interval`
/// blocks. Partitions open the one the directory asked for.
fn schedule_major_block(ctx: &mut ExecContext<'_>) -> Result<u64, ExecutorError> {
    let mut ledger = ctx.anchor_ledger()?;
    let index = ctx.block.index;
    let opened = if ctx.node.is_directory() {
        let interval = ctx.node.config.major_block_interval;
        if interval == 0 || index % interval != 0 {
            return Ok(0);
        }
        ledger.major_block_index + 1
    } else {
        match ledger.pending_major_block.take() {
            Some(major) => major,
            None => return Ok(0),
        }
    };
    ledger.major_block_index = opened;
    ledger.major_block_start = index;
    ctx.put_account(&Account::AnchorLedger(ledger))?;
    info!("[mr-06] {} opened major block {} at {}", ctx.node.id(), opened, index);
    Ok(if ctx.node.is_directory() { opened } else { 0 })
}

/// Anchor every chain that grew into the root chain and write the index
/// entries. Returns the root anchor and the index of the last root entry.
fn anchor_chains(ctx: &mut ExecContext<'_>) -> Result<(Hash, u64), ExecutorError> {
    let ledger_url = ctx.node.id().ledger_url();
    let (index, time) = (ctx.block.index, ctx.block.time);
    let touched: Vec<_> = ctx.block.touched.iter().cloned().collect();
    let mut anchored = 0usize;

    for (account, chain) in touched {
        if is_index_chain(&chain) || (account == ledger_url && chain == ROOT_CHAIN) {
            continue;
        }
        let (height, last, anchor) = {
            let view = ctx.view();
            let height = view.chain_height(&account, &chain)?;
            let last = view.last_index_entry(&account, &chain)?;
            (height, last, view.chain_anchor(&account, &chain)?)
        };
        if height == 0 || last.is_some_and(|l| l.source + 1 >= height) {
            continue;
        }
        let root_index = ctx.add_chain_entry(&ledger_url, ROOT_CHAIN, anchor)?;
        ctx.batch().add_index_entry(
            &account,
            &chain,
            IndexEntry {
                source: height - 1,
                anchor: root_index,
                block_index: index,
                block_time: time,
            },
        )?;
        anchored += 1;
    }

    let (root_height, last_root, root_anchor) = {
        let view = ctx.view();
        (
            view.chain_height(&ledger_url, ROOT_CHAIN)?,
            view.last_index_entry(&ledger_url, ROOT_CHAIN)?,
            view.chain_anchor(&ledger_url, ROOT_CHAIN)?,
        )
    };
    let root_index = root_height.saturating_sub(1);
    if root_height > 0 && !last_root.is_some_and(|l| l.source + 1 >= root_height) {
        ctx.batch().add_index_entry(
            &ledger_url,
            ROOT_CHAIN,
            IndexEntry {
                source: root_index,
                anchor: root_index,
                block_index: index,
                block_time: time,
            },
        )?;
    }
    debug!(
        "[mr-06] {} anchored {} chains, root {} at {}",
        ctx.node.id(),
        anchored,
        hex::encode(&root_anchor[..8]),
        root_index
    );
    Ok((root_anchor, root_index))
}

