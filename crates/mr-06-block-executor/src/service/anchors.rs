//! # Anchor Processor
//!
//! Block-validator partitions send a [`PartitionAnchor`] to the directory
//! at the end of every block. The directory records each one on its
//! anchor pool and, at the end of its own block, sends a
//! [`DirectoryAnchor`] to every partition (itself included) carrying a
//! receipt for every partition anchor it received.
//!
//! | Step | Where | Effect |
//! |------|-------|--------|
//! | Record | both | anchor appended to `anchor(source)-root` and `-bpt` |
//! | Acknowledge | both | outbound synthetic and anchor ledgers catch up |
//! | Release | both | inbound synthetic transactions held for an anchored root run in this block |
//! | Updates | partitions | network updates replayed as internal transactions |
//! | Major block | partitions | opened when this block ends |

use super::context::ExecContext;
use super::synthetic;
use crate::domain::entities::{Queued, ReceivedAnchor};
use crate::domain::errors::ExecutorError;
use crate::domain::receipts::ReceiptBuilder;
use mr_02_merkle_chain::{anchor_bpt_chain, anchor_root_chain};
use mr_04_ledger_database::LedgerReader;
use shared_types::{
    count_for, Account, DirectoryAnchor, Envelope, Hash, PartitionAnchor, PartitionAnchorReceipt,
    PartitionCount, PartitionId, PartitionSignature, Receipt, Signature, Status, SyntheticLedger,
    Transaction, TransactionBody, TransactionStatus, Url,
};
use tracing::{debug, info, warn};

// =============================================================================
// RECEIVING
// =============================================================================

/// Apply a directory anchor.
pub(crate) fn apply_directory_anchor(
    ctx: &mut ExecContext<'_>,
    status: &TransactionStatus,
    anchor: &DirectoryAnchor,
) -> Result<(), ExecutorError> {
    let node = ctx.node;
    let dn = PartitionId::directory();
    if PartitionId::from_url(&anchor.source).as_ref() != Some(&dn) {
        return Err(ExecutorError::BadRequest(format!(
            "directory anchor from {}",
            anchor.source
        )));
    }
    let pool = node.id().anchor_pool_url();
    ctx.add_chain_entry(&pool, &anchor_root_chain(&dn), anchor.root_chain_anchor)?;
    ctx.add_chain_entry(&pool, &anchor_bpt_chain(&dn), anchor.state_tree_anchor)?;

    let me = node.url();
    let mut synthetic = ctx.synthetic_ledger()?;
    let mut anchors = ctx.anchor_ledger()?;
    let mut proven: Vec<Receipt> = Vec::with_capacity(anchor.receipts.len() + 1);
    for receipt in &anchor.receipts {
        let Some(from) = PartitionId::from_url(&receipt.anchor.source) else {
            warn!("[mr-06] Receipt from unknown partition {}", receipt.anchor.source);
            continue;
        };
        if let Some(count) = count_for(&receipt.anchor.synthetic_executed, &me) {
            synthetic.partition_mut(&from).acknowledge(count);
        }
        if &from == node.id() {
            anchors.partition_mut(&dn).acknowledge(receipt.sequence_number);
        }
        proven.push(receipt.root_chain_receipt.clone());
    }
    proven.push(Receipt::identity(anchor.root_chain_anchor));
    if let Some(count) = count_for(&anchor.synthetic_executed, &me) {
        synthetic.partition_mut(&dn).acknowledge(count);
    }
    if node.is_directory() {
        let own = anchors.partition_mut(&dn);
        let executed = own.executed;
        own.acknowledge(executed + 1);
    } else if anchor.make_major_block > 0 {
        anchors.pending_major_block = Some(anchor.make_major_block);
    }
    ctx.put_account(&Account::SyntheticLedger(synthetic))?;
    ctx.put_account(&Account::AnchorLedger(anchors))?;

    for receipt in &proven {
        ctx.batch().put_directory_receipt(receipt)?;
        synthetic::release_held(ctx, receipt)?;
    }
    if !node.is_directory() {
        for update in &anchor.updates {
            ctx.block.queue.push_back(Queued::Internal(Transaction::new(
                me.join(&update.name),
                [0u8; 32],
                update.body.clone(),
            )));
        }
    }
    if anchor.make_major_block > 0 {
        ctx.block.major_block = Some(anchor.make_major_block);
    }
    debug!(
        "[mr-06] Directory block {} applied ({} receipts, sequence {})",
        anchor.minor_block_index,
        anchor.receipts.len(),
        status.sequence_number
    );
    Ok(())
}

/// Apply a partition anchor on the directory.
pub(crate) fn apply_partition_anchor(
    ctx: &mut ExecContext<'_>,
    status: &TransactionStatus,
    anchor: &PartitionAnchor,
) -> Result<(), ExecutorError> {
    let node = ctx.node;
    if !node.is_directory() {
        return Err(ExecutorError::BadRequest(
            "partition anchors are only accepted by the directory".into(),
        ));
    }
    let source = PartitionId::from_url(&anchor.source)
        .filter(|p| !p.is_directory())
        .ok_or_else(|| ExecutorError::BadRequest(format!("partition anchor from {}", anchor.source)))?;
    if status.source_network.as_ref() != Some(&anchor.source) {
        return Err(ExecutorError::BadRequest(format!(
            "anchor from {} arrived from {:?}",
            anchor.source, status.source_network
        )));
    }

    let pool = node.id().anchor_pool_url();
    let chain_index = ctx.add_chain_entry(&pool, &anchor_root_chain(&source), anchor.root_chain_anchor)?;
    ctx.add_chain_entry(&pool, &anchor_bpt_chain(&source), anchor.state_tree_anchor)?;

    let mut synthetic = ctx.synthetic_ledger()?;
    if let Some(count) = count_for(&anchor.synthetic_executed, &node.url()) {
        synthetic.partition_mut(&source).acknowledge(count);
    }
    let mut anchors = ctx.anchor_ledger()?;
    anchors.partition_mut(&source).acknowledge(anchor.anchors_executed);
    ctx.put_account(&Account::SyntheticLedger(synthetic))?;
    ctx.put_account(&Account::AnchorLedger(anchors))?;

    ctx.block.anchors.push(ReceivedAnchor {
        transaction: status.txid,
        partition: source.clone(),
        chain_index,
        sequence: status.sequence_number,
    });
    debug!(
        "[mr-06] Anchor for {} block {} recorded at {}",
        source, anchor.minor_block_index, chain_index
    );
    Ok(())
}

// =============================================================================
// SENDING
// =============================================================================

/// Root chain state of a block that is about to commit.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BlockAnchor {
    /// Root chain anchor.
    pub root_anchor: Hash,
    /// Index of the last root chain entry.
    pub root_index: u64,
    /// BPT root before the block's writes.
    pub state_root: Hash,
    /// Major block the directory opens in this block, or zero.
    pub make_major_block: u64,
}

/// Build and queue this block's anchors.
pub(crate) fn emit(ctx: &mut ExecContext<'_>, block: BlockAnchor) -> Result<usize, ExecutorError> {
    if ctx.node.is_directory() {
        emit_directory_anchor(ctx, block)
    } else {
        emit_partition_anchor(ctx, block).map(|()| 1)
    }
}

fn executed_counts(ledger: &SyntheticLedger) -> Vec<PartitionCount> {
    ledger
        .sequence
        .iter()
        .filter(|p| p.executed > 0)
        .map(|p| PartitionCount {
            partition: p.partition.url(),
            count: p.executed,
        })
        .collect()
}

fn emit_partition_anchor(ctx: &mut ExecContext<'_>, block: BlockAnchor) -> Result<(), ExecutorError> {
    let dn = PartitionId::directory();
    let synthetic = ctx.synthetic_ledger()?;
    let mut anchors = ctx.anchor_ledger()?;
    let body = PartitionAnchor {
        source: ctx.node.url(),
        major_block_index: anchors.major_block_index,
        minor_block_index: ctx.block.index,
        root_chain_index: block.root_index,
        root_chain_anchor: block.root_anchor,
        state_tree_anchor: block.state_root,
        synthetic_executed: executed_counts(&synthetic),
        anchors_executed: anchors.partition(&dn).map_or(0, |p| p.executed),
    };
    let sequence = next_sequence(anchors.partition_mut(&dn));
    ctx.put_account(&Account::AnchorLedger(anchors))?;
    send_system(
        ctx,
        &dn,
        dn.anchor_pool_url(),
        TransactionBody::PartitionAnchor(Box::new(body)),
        sequence,
    )
}

fn emit_directory_anchor(ctx: &mut ExecContext<'_>, block: BlockAnchor) -> Result<usize, ExecutorError> {
    let node = ctx.node;
    let pool = node.id().anchor_pool_url();
    let mut receipts = Vec::with_capacity(ctx.block.anchors.len());
    {
        let view = ctx.view();
        let builder = ReceiptBuilder::new(&view, node.id());
        for received in &ctx.block.anchors {
            let txn = view
                .transaction(&received.transaction)?
                .ok_or(ExecutorError::TransactionNotFound(received.transaction))?;
            let TransactionBody::PartitionAnchor(anchor) = txn.body else {
                continue;
            };
            let root_chain_receipt = builder.build(&pool, &anchor_root_chain(&received.partition), received.chain_index)?;
            receipts.push(PartitionAnchorReceipt {
                anchor: *anchor,
                sequence_number: received.sequence,
                root_chain_receipt,
            });
        }
    }

    let synthetic = ctx.synthetic_ledger()?;
    let body = DirectoryAnchor {
        source: node.url(),
        minor_block_index: ctx.block.index,
        root_chain_index: block.root_index,
        root_chain_anchor: block.root_anchor,
        state_tree_anchor: block.state_root,
        updates: std::mem::take(&mut ctx.block.updates),
        receipts,
        make_major_block: block.make_major_block,
        make_major_block_time: if block.make_major_block > 0 { ctx.block.time } else { 0 },
        synthetic_executed: executed_counts(&synthetic),
    };

    let mut anchors = ctx.anchor_ledger()?;
    let routes: Vec<(PartitionId, u64)> = node
        .network
        .partition_ids()
        .into_iter()
        .map(|p| {
            let sequence = next_sequence(anchors.partition_mut(&p));
            (p, sequence)
        })
        .collect();
    ctx.put_account(&Account::AnchorLedger(anchors))?;

    for (partition, sequence) in &routes {
        send_system(
            ctx,
            partition,
            partition.anchor_pool_url(),
            TransactionBody::DirectoryAnchor(Box::new(body.clone())),
            *sequence,
        )?;
    }
    info!(
        "[mr-06] Directory block {} anchored with {} receipts",
        body.minor_block_index,
        body.receipts.len()
    );
    Ok(routes.len())
}

fn next_sequence(ledger: &mut shared_types::PartitionLedger) -> u64 {
    let sequence = ledger.produce();
    ledger.deliver(1);
    sequence
}

/// Store and queue a system transaction for `destination`.
fn send_system(
    ctx: &mut ExecContext<'_>,
    destination: &PartitionId,
    principal: Url,
    body: TransactionBody,
    sequence: u64,
) -> Result<(), ExecutorError> {
    let node = ctx.node;
    let route = PartitionSignature {
        source_network: node.url(),
        destination_network: destination.url(),
        sequence_number: sequence,
    };
    let txn = Transaction::new(principal, Signature::Partition(route.clone()).metadata_hash(), body);
    let hash = ctx.batch().put_transaction(&txn)?;

    let mut status = TransactionStatus::new(hash);
    status.code = Status::Remote;
    status.received = ctx.block.index;
    status.set_route(&route.source_network, &route.destination_network, sequence);
    ctx.batch().put_status(&status)?;

    let signatures = vec![Signature::Partition(route), node.node_key.sign(ctx.block.time, &hash)];
    ctx.block
        .outbound
        .push((destination.clone(), Envelope::new(txn, signatures)));
    Ok(())
}
