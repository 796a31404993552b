//! # Synthetic Producer
//!
//! Turns handler outputs into synthetic transactions:
//!
//! 1. Fill in the origin (cause, source, initiator, refund share).
//! 2. Route the principal. Accounts under this partition's own authority
//!    are executed internally in the same block.
//! 3. Everything else takes the next sequence number for its destination,
//!    is stored with a `Remote` status, and is appended to the synthetic
//!    account's main chain and per-destination sequence chain.
//!
//! At end of block each produced transaction gets its proof to the block's
//! root anchor and is sent with a partition, a key and a receipt signature.
//! The destination holds it until a directory anchor proves that root, then
//! [`release_held`] extends the receipt and runs it.

use super::context::ExecContext;
use crate::domain::entities::Queued;
use crate::domain::errors::ExecutorError;
use crate::domain::receipts::ReceiptBuilder;
use mr_02_merkle_chain::{synthetic_sequence_chain, MAIN_CHAIN};
use mr_04_ledger_database::{ChainIndexEntry, LedgerReader};
use shared_types::{
    Account, Envelope, Hash, PartitionId, PartitionSignature, Receipt, ReceiptSignature, Signature,
    Status, SyntheticOrigin, Transaction, TransactionStatus,
};
use tracing::{debug, error, warn};

/// Produce `outputs` on behalf of `cause`, whose status is `status`.
pub(crate) fn produce(
    ctx: &mut ExecContext<'_>,
    cause: &Transaction,
    status: &mut TransactionStatus,
    outputs: Vec<Transaction>,
) -> Result<(), ExecutorError> {
    if outputs.is_empty() {
        return Ok(());
    }
    let node = ctx.node;
    let cause_type = cause.transaction_type();
    let refund = node.config.fees.refund_share(cause_type, outputs.len());
    let synthetic_url = node.id().synthetic_url();
    let mut ledger = ctx.synthetic_ledger()?;

    for mut txn in outputs {
        if let Some(origin) = txn.body.origin_mut() {
            *origin = SyntheticOrigin {
                cause: status.txid,
                source: cause.principal().clone(),
                initiator: status.initiator.clone(),
                fee_refund: refund,
            };
        }

        if node.is_system_account(txn.principal()) {
            debug!("[mr-06] Queued internal {} for {}", txn.transaction_type(), txn.principal());
            ctx.block.queue.push_back(Queued::Internal(txn));
            continue;
        }

        let destination = node.route(txn.principal())?;
        let sequence = ledger.partition_mut(&destination).produce();
        let route = PartitionSignature {
            source_network: node.url(),
            destination_network: destination.url(),
            sequence_number: sequence,
        };
        txn.header.initiator = Signature::Partition(route).metadata_hash();

        let hash = ctx.batch().put_transaction(&txn)?;
        let mut produced = TransactionStatus::new(hash);
        produced.code = Status::Remote;
        produced.received = ctx.block.index;
        produced.set_route(&node.url(), &destination.url(), sequence);
        ctx.batch().put_status(&produced)?;

        let index = ctx.add_chain_entry(&synthetic_url, MAIN_CHAIN, hash)?;
        ctx.batch().add_transaction_chain(
            &hash,
            ChainIndexEntry {
                account: synthetic_url.clone(),
                chain: MAIN_CHAIN.to_string(),
                index,
            },
        )?;
        let position = ctx.add_chain_entry(&synthetic_url, &synthetic_sequence_chain(&destination), hash)?;
        if position + 1 != sequence {
            let err = ExecutorError::SequenceMismatch {
                destination: destination.clone(),
                sequence,
                index: position,
            };
            if node.config.strict_sequence_check {
                return Err(err);
            }
            error!("[mr-06] {err}");
        }

        ctx.block.produced.push(hash);
        if !cause_type.is_system() {
            status.add_produced(hash);
        }
        debug!(
            "[mr-06] Produced {} #{} for {} ({})",
            txn.transaction_type(),
            sequence,
            destination,
            hex::encode(&hash[..8])
        );
    }

    ctx.put_account(&Account::SyntheticLedger(ledger))
}

/// Prove and send everything produced in the block. The block's root chain
/// must already be anchored; `root_anchor` is that anchor.
pub(crate) fn send_produced(ctx: &mut ExecContext<'_>, root_anchor: &Hash) -> Result<(), ExecutorError> {
    if ctx.block.produced.is_empty() {
        return Ok(());
    }
    let node = ctx.node;
    let produced = ctx.block.produced.clone();
    let synthetic_url = node.id().synthetic_url();
    let mut ledger = ctx.synthetic_ledger()?;
    let mut outbound = Vec::with_capacity(produced.len());

    for hash in &produced {
        let (txn, status, proof) = {
            let view = ctx.view();
            let index = view
                .chain_height_of(&synthetic_url, MAIN_CHAIN, hash)?
                .ok_or(ExecutorError::TransactionNotFound(*hash))?;
            let proof = ReceiptBuilder::new(&view, node.id()).build(&synthetic_url, MAIN_CHAIN, index)?;
            if &proof.anchor != root_anchor {
                warn!("[mr-06] Proof for {} ends at an older anchor", hex::encode(&hash[..8]));
            }
            let txn = view.transaction(hash)?.ok_or(ExecutorError::TransactionNotFound(*hash))?;
            let mut status = view.status_or_new(hash)?;
            status.proof = Some(proof.clone());
            (txn, status, proof)
        };
        ctx.batch().put_status(&status)?;

        let Some(destination) = status.destination_network.as_ref().and_then(PartitionId::from_url) else {
            warn!("[mr-06] {} has no destination", hex::encode(&hash[..8]));
            continue;
        };
        ledger.partition_mut(&destination).deliver(1);
        let signatures = vec![
            Signature::Partition(route_of(ctx, &destination, &status)),
            node.node_key.sign(ctx.block.time, hash),
            Signature::Receipt(ReceiptSignature {
                source_network: node.url(),
                proof,
                transaction_hash: *hash,
            }),
        ];
        outbound.push((destination, Envelope::new(txn, signatures)));
    }

    ctx.put_account(&Account::SyntheticLedger(ledger))?;
    debug!("[mr-06] Sending {} synthetic transactions", outbound.len());
    ctx.block.outbound.extend(outbound);
    Ok(())
}

/// Run the synthetic transactions held here for the partition root anchor
/// `directory_receipt` starts from. Each gets its proof extended to the
/// directory anchor and is queued, in sequence order, behind the delivery
/// that applied it.
pub(crate) fn release_held(ctx: &mut ExecContext<'_>, directory_receipt: &Receipt) -> Result<usize, ExecutorError> {
    let held = ctx.batch().take_synthetic_for_anchor(&directory_receipt.start)?;
    let mut ready = Vec::with_capacity(held.len());
    for hash in held {
        let mut status = ctx.view().status_or_new(&hash)?;
        if status.is_final() {
            continue;
        }
        let (Some(partial), Some(source)) = (status.proof.as_ref(), status.source_network.clone()) else {
            warn!("[mr-06] {} cannot be released", hex::encode(&hash[..8]));
            continue;
        };
        let proof = match partial.combine(directory_receipt) {
            Ok(proof) => proof,
            Err(e) => {
                warn!("[mr-06] {} cannot be released: {}", hex::encode(&hash[..8]), e);
                continue;
            }
        };
        let receipt = Signature::Receipt(ReceiptSignature {
            source_network: source.clone(),
            proof: proof.clone(),
            transaction_hash: hash,
        });
        ctx.batch().add_signatures(&hash, &[receipt])?;
        status.proof = Some(proof);
        ctx.batch().put_status(&status)?;
        ready.push((source, status.sequence_number, hash));
    }
    ready.sort();
    let released = ready.len();
    if released > 0 {
        debug!("[mr-06] Released {released} synthetic transactions");
    }
    ctx.block
        .queue
        .extend(ready.into_iter().map(|(_, _, hash)| Queued::Execute(hash)));
    Ok(released)
}

fn route_of(ctx: &ExecContext<'_>, destination: &PartitionId, status: &TransactionStatus) -> PartitionSignature {
    PartitionSignature {
        source_network: ctx.node.url(),
        destination_network: destination.url(),
        sequence_number: status.sequence_number,
    }
}
