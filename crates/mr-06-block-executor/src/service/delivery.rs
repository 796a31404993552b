//! # Delivery Pipeline
//!
//! ```text
//! received → type checked → signatures validated → recorded → ready? → executed → applied
//!                                                       │
//!                                                       └─ not ready: pending / remote
//! ```
//!
//! Every delivery runs in its own child of the block batch, created by the
//! caller. A rejected delivery leaves nothing behind. A handler failure is
//! a recorded outcome: the handler's own child scope is dropped while the
//! failed status, the fee and the main chain entry are kept.
//!
//! ## Readiness
//!
//! | Kind | Ready when |
//! |------|------------|
//! | User | some signer has `threshold` distinct keys recorded (remote signers count as threshold 1) |
//! | Synthetic | partition, key and receipt signatures held; threshold of source validators; next in sequence |
//! | Anchor | partition and key signatures held; threshold of source validators; next in sequence |
//!
//! A synthetic transaction usually arrives proven only to its source's
//! root anchor. It is held under that anchor until a directory anchor
//! extends the proof, and then runs in the block that applied the anchor.

use super::context::ExecContext;
use super::synthetic;
use crate::domain::entities::Queued;
use crate::domain::errors::ExecutorError;
use crate::handlers::{unset_origin, HandlerInput};
use mr_02_merkle_chain::MAIN_CHAIN;
use mr_04_ledger_database::{ChainIndexEntry, LedgerReader};
use mr_05_signature_validation::{Accepted, Delivery, LedgerState, SignatureValidator, ValidationState};
use shared_types::{
    Account, Envelope, Hash, InboundDisposition, PartitionId, PartitionLedger, Receipt, ReceiptSignature,
    RemoteSignature, Signature, Status, Transaction, TransactionBody, TransactionStatus,
};
use tracing::{debug, trace, warn};

/// How far an envelope is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    /// Full delivery.
    Deliver,
    /// Validation only: system and remote deliveries stop after their
    /// signatures are checked.
    Check,
}

fn short(hash: &Hash) -> String {
    hex::encode(&hash[..8])
}

/// True if every signature was forwarded from another partition.
fn is_forwarded(signatures: &[Signature]) -> bool {
    !signatures.is_empty() && signatures.iter().all(|s| matches!(s, Signature::Remote(_)))
}

// =============================================================================
// ENTRY POINTS
// =============================================================================

/// Take one envelope as far as it can go.
pub(crate) fn process_envelope(
    ctx: &mut ExecContext<'_>,
    envelope: &Envelope,
    preverified: bool,
    mode: Mode,
) -> Result<TransactionStatus, ExecutorError> {
    if let TransactionBody::Remote { hash } = &envelope.transaction.body {
        return process_remote(ctx, *hash, envelope, preverified, mode);
    }
    let txn = &envelope.transaction;
    let txn_type = txn.transaction_type();
    let hash = txn.hash();

    let mut status = ctx.view().status_or_new(&hash)?;
    if status.is_final() {
        debug!("[mr-06] {} is already final", short(&hash));
        return Ok(status);
    }
    let first_seen = ctx.view().transaction(&hash)?.is_none();
    let forwarded = is_forwarded(&envelope.signatures);
    let (signatures, held) = split_source_receipts(ctx, txn, &envelope.signatures)?;
    let accepted = validate(ctx, txn, &signatures, &status, first_seen, forwarded, preverified)?;

    if mode == Mode::Check && !txn_type.is_user() {
        SignatureValidator::require_complete(txn_type, &envelope.signatures)?;
        return Ok(TransactionStatus::new(hash));
    }

    if first_seen {
        ctx.batch().put_transaction(txn)?;
        status.received = ctx.block.index;
    }
    ctx.batch().add_signatures(&hash, &signatures)?;
    record_accepted(&mut status, &accepted);
    if let Some(proof) = held {
        debug!(
            "[mr-06] {} waits for anchor {}",
            short(&hash),
            short(&proof.anchor)
        );
        ctx.batch().add_synthetic_for_anchor(&proof.anchor, &[hash])?;
        status.proof = Some(proof);
    }

    if txn_type.is_user() {
        let destination = ctx.node.route(txn.principal())?;
        if &destination != ctx.node.id() {
            return forward(ctx, txn, status, envelope, destination, first_seen, forwarded);
        }
        if first_seen && ctx.account(txn.principal())?.is_some() {
            ctx.batch().add_pending(txn.principal(), hash)?;
        }
    }
    advance(ctx, txn, status)
}

/// Re-check a known transaction: new signatures arrived, or its turn in
/// sequence has come.
pub(crate) fn process_queued(ctx: &mut ExecContext<'_>, hash: Hash) -> Result<TransactionStatus, ExecutorError> {
    let txn = ctx
        .view()
        .transaction(&hash)?
        .ok_or(ExecutorError::TransactionNotFound(hash))?;
    let status = ctx.view().status_or_new(&hash)?;
    if status.is_final() {
        return Ok(status);
    }
    advance(ctx, &txn, status)
}

/// Execute an internal transaction, without signatures or sequencing.
pub(crate) fn process_internal(ctx: &mut ExecContext<'_>, txn: &Transaction) -> Result<TransactionStatus, ExecutorError> {
    let hash = ctx.batch().put_transaction(txn)?;
    let mut status = ctx.view().status_or_new(&hash)?;
    if status.is_final() {
        return Ok(status);
    }
    status.received = ctx.block.index;
    execute(ctx, txn, status)
}

// =============================================================================
// VALIDATION AND RECORDING
// =============================================================================

fn validate(
    ctx: &ExecContext<'_>,
    txn: &Transaction,
    signatures: &[Signature],
    status: &TransactionStatus,
    first_seen: bool,
    forwarded: bool,
    preverified: bool,
) -> Result<Vec<Accepted>, ExecutorError> {
    let view = ctx.view();
    let state = LedgerState::new(&view, ctx.node.id());
    let delivery = Delivery {
        transaction: txn,
        signatures,
        forwarded,
        first_seen,
        preverified,
        source: status.source_network.as_ref().and_then(PartitionId::from_url),
    };
    Ok(ctx.node.validator.validate_delivery(&state, &delivery)?)
}

/// Separate receipts that only reach the source partition's root anchor.
///
/// When a directory anchor has already proven that root, the receipt is
/// extended here and validated like any other. Otherwise its proof is
/// returned to be held until one does.
fn split_source_receipts(
    ctx: &ExecContext<'_>,
    txn: &Transaction,
    signatures: &[Signature],
) -> Result<(Vec<Signature>, Option<Receipt>), ExecutorError> {
    if !txn.transaction_type().is_synthetic() {
        return Ok((signatures.to_vec(), None));
    }
    let view = ctx.view();
    let state = LedgerState::new(&view, ctx.node.id());
    let mut kept = Vec::with_capacity(signatures.len());
    let mut held = None;
    for signature in signatures {
        let Signature::Receipt(receipt) = signature else {
            kept.push(signature.clone());
            continue;
        };
        if state.is_directory_anchor(&receipt.proof.anchor)? {
            kept.push(signature.clone());
            continue;
        }
        let anchor = ctx.node.validator.validate_source_receipt(txn, receipt)?;
        match view.directory_receipt(&anchor)? {
            Some(directory) => kept.push(Signature::Receipt(ReceiptSignature {
                proof: receipt.proof.combine(&directory)?,
                ..receipt.clone()
            })),
            None => held = Some(receipt.proof.clone()),
        }
    }
    Ok((kept, held))
}

fn record_accepted(status: &mut TransactionStatus, accepted: &[Accepted]) {
    for outcome in accepted {
        match outcome {
            Accepted::Key(key) => {
                status.add_signer_key(&key.signer, key.version, key.key_hash);
                if key.initiator && status.initiator.is_none() {
                    status.initiator = Some(key.signer.clone());
                }
            }
            Accepted::Partition(route) => status.set_route(&route.source, &route.destination, route.sequence),
            Accepted::Receipt { .. } => {}
            Accepted::Unresolved { signer } => trace!("[mr-06] Signature of {} kept unresolved", signer),
        }
    }
}

/// Signatures for a transaction already known by hash.
fn process_remote(
    ctx: &mut ExecContext<'_>,
    hash: Hash,
    envelope: &Envelope,
    preverified: bool,
    mode: Mode,
) -> Result<TransactionStatus, ExecutorError> {
    let known = ctx
        .view()
        .transaction(&hash)?
        .ok_or(ExecutorError::TransactionNotFound(hash))?;
    let mut status = ctx.view().status_or_new(&hash)?;
    if status.is_final() {
        return Ok(status);
    }
    let forwarded = is_forwarded(&envelope.signatures);
    let accepted = validate(ctx, &known, &envelope.signatures, &status, false, forwarded, preverified)?;
    if mode == Mode::Check {
        return Ok(TransactionStatus::new(hash));
    }

    ctx.batch().add_signatures(&hash, &envelope.signatures)?;
    record_accepted(&mut status, &accepted);
    ctx.batch().put_status(&status)?;

    if known.transaction_type().is_user() {
        let destination = ctx.node.route(known.principal())?;
        if &destination != ctx.node.id() {
            let late = Envelope::new(known, envelope.signatures.clone());
            return forward(ctx, &late.transaction, status, &late, destination, false, forwarded);
        }
    }
    ctx.block.queue.push_back(Queued::Evaluate(hash));
    Ok(status)
}

/// Send a user transaction on to the partition of its principal.
fn forward(
    ctx: &mut ExecContext<'_>,
    txn: &Transaction,
    mut status: TransactionStatus,
    envelope: &Envelope,
    destination: PartitionId,
    first_seen: bool,
    forwarded: bool,
) -> Result<TransactionStatus, ExecutorError> {
    if forwarded {
        return Err(ExecutorError::BadRequest(format!(
            "{} was forwarded to the wrong partition",
            txn.principal()
        )));
    }
    if first_seen {
        if let Err(e) = charge_fee(ctx, txn, &status) {
            if e.is_fatal() {
                return Err(e);
            }
            status.fail(e.status(), e.to_string());
            ctx.batch().put_status(&status)?;
            return Ok(status);
        }
    }
    status.code = Status::Remote;
    ctx.batch().put_status(&status)?;

    let to = destination.url();
    let signatures = envelope
        .signatures
        .iter()
        .map(|s| {
            Signature::Remote(RemoteSignature {
                destination: to.clone(),
                signature: Box::new(s.clone()),
            })
        })
        .collect();
    debug!("[mr-06] Forwarding {} to {}", short(&status.txid), destination);
    ctx.block
        .outbound
        .push((destination, Envelope::new(txn.clone(), signatures)));
    Ok(status)
}

// =============================================================================
// READINESS
// =============================================================================

/// Move a recorded transaction forward if it is ready.
fn advance(ctx: &mut ExecContext<'_>, txn: &Transaction, mut status: TransactionStatus) -> Result<TransactionStatus, ExecutorError> {
    let txn_type = txn.transaction_type();
    if txn_type.is_user() {
        if !ctx.node.is_local(txn.principal())? {
            ctx.batch().put_status(&status)?;
            return Ok(status);
        }
        if !user_ready(ctx, &status)? {
            status.code = Status::Pending;
            ctx.batch().put_status(&status)?;
            return Ok(status);
        }
        if let Err(e) = charge_fee(ctx, txn, &status) {
            if e.is_fatal() {
                return Err(e);
            }
            debug!("[mr-06] {} cannot pay: {}", short(&status.txid), e);
            status.fail(e.status(), e.to_string());
            ctx.batch().remove_pending(txn.principal(), &status.txid)?;
            ctx.batch().put_status(&status)?;
            return Ok(status);
        }
        return execute(ctx, txn, status);
    }

    status.code = Status::Pending;
    ctx.batch().put_status(&status)?;
    let Some((source, sequence)) = route_of(&status)? else {
        return Ok(status);
    };
    let held = ctx.view().signatures(&status.txid)?;
    let complete = SignatureValidator::require_complete(txn_type, &held).is_ok();
    let votes = status.signature_count(&source.operators_page_url()) as u64;
    let needed = ctx.node.network.validator_threshold(&source);
    if !complete || votes < needed {
        trace!(
            "[mr-06] {} waits: complete={} votes={}/{}",
            short(&status.txid),
            complete,
            votes,
            needed
        );
        return Ok(status);
    }
    run_sequenced(ctx, txn, status, source, sequence)
}

fn route_of(status: &TransactionStatus) -> Result<Option<(PartitionId, u64)>, ExecutorError> {
    match status.source_network.as_ref() {
        None => Ok(None),
        Some(url) => PartitionId::from_url(url)
            .map(|p| Some((p, status.sequence_number)))
            .ok_or_else(|| ExecutorError::BadRequest(format!("{url} is not a partition"))),
    }
}

/// True if some signer has collected enough keys.
fn user_ready(ctx: &ExecContext<'_>, status: &TransactionStatus) -> Result<bool, ExecutorError> {
    for record in &status.signers {
        let threshold = if ctx.node.is_local(&record.url)? {
            match ctx.account(&record.url)?.as_ref().and_then(Account::as_signer) {
                Some(signer) if signer.version() == record.version => signer.threshold(),
                _ => continue,
            }
        } else {
            1
        };
        if record.key_hashes.len() as u64 >= threshold {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Apply `f` to the inbound ledger `txn` is sequenced on.
fn with_inbound<T>(
    ctx: &mut ExecContext<'_>,
    txn: &Transaction,
    source: &PartitionId,
    f: impl FnOnce(&mut PartitionLedger) -> T,
) -> Result<T, ExecutorError> {
    if txn.transaction_type().is_anchor() {
        let mut ledger = ctx.anchor_ledger()?;
        let out = f(ledger.partition_mut(source));
        ctx.put_account(&Account::AnchorLedger(ledger))?;
        Ok(out)
    } else {
        let mut ledger = ctx.synthetic_ledger()?;
        let out = f(ledger.partition_mut(source));
        ctx.put_account(&Account::SyntheticLedger(ledger))?;
        Ok(out)
    }
}

/// Execute a sequenced transaction if it is next from `source`.
fn run_sequenced(
    ctx: &mut ExecContext<'_>,
    txn: &Transaction,
    status: TransactionStatus,
    source: PartitionId,
    sequence: u64,
) -> Result<TransactionStatus, ExecutorError> {
    let hash = status.txid;
    match with_inbound(ctx, txn, &source, |ledger| ledger.receive(sequence, hash))? {
        InboundDisposition::Duplicate => {
            warn!("[mr-06] {} repeats sequence {} from {}", short(&hash), sequence, source);
            Ok(status)
        }
        InboundDisposition::Parked => {
            debug!("[mr-06] {} parked at sequence {} from {}", short(&hash), sequence, source);
            Ok(status)
        }
        InboundDisposition::Ready => {
            let status = execute(ctx, txn, status)?;
            let next = with_inbound(ctx, txn, &source, |ledger| {
                ledger.mark_executed(sequence);
                ledger.next_ready()
            })?;
            if let Some((_, next)) = next {
                ctx.block.queue.push_back(Queued::Execute(next));
            }
            Ok(status)
        }
    }
}

// =============================================================================
// EXECUTION
// =============================================================================

/// Debit the fee from the initiator when it lives here.
fn charge_fee(ctx: &mut ExecContext<'_>, txn: &Transaction, status: &TransactionStatus) -> Result<(), ExecutorError> {
    let fee = ctx.node.config.fees.fee(txn.transaction_type());
    let Some(initiator) = status.initiator.as_ref() else {
        return Ok(());
    };
    if fee == 0 || !ctx.node.is_local(initiator)? {
        return Ok(());
    }
    let mut account = ctx.view().require_account(initiator)?;
    let Some(signer) = account.as_signer_mut() else {
        return Err(ExecutorError::WrongPrincipal {
            principal: initiator.clone(),
            expected: "signer",
        });
    };
    let balance = signer.credit_balance();
    if !signer.debit_credits(fee) {
        return Err(ExecutorError::InsufficientCredits {
            signer: initiator.clone(),
            balance,
            fee,
        });
    }
    ctx.put_account(&account)?;
    trace!("[mr-06] Charged {} credits to {}", fee, initiator);
    Ok(())
}

/// Run the handler and apply the outcome.
fn execute(ctx: &mut ExecContext<'_>, txn: &Transaction, mut status: TransactionStatus) -> Result<TransactionStatus, ExecutorError> {
    let node = ctx.node;
    let txn_type = txn.transaction_type();
    let handler = node
        .handlers
        .get(txn_type)
        .ok_or(ExecutorError::MissingHandler(txn_type))?;
    let principal = ctx.account(txn.principal())?;
    let principal_exists = principal.is_some();

    let outcome = if principal.is_none() && !handler.allows_missing_principal() {
        Err(ExecutorError::PrincipalNotFound(txn.principal().clone()))
    } else {
        let mut body = ctx.child();
        let input = HandlerInput {
            transaction: txn,
            status: &status,
            principal,
        };
        match handler.execute(&mut body, input) {
            Ok(output) => body.commit().map(|()| output),
            Err(e) => {
                body.discard();
                Err(e)
            }
        }
    };

    match outcome {
        Ok(output) => {
            status.code = Status::Delivered;
            status.error = None;
            status.result = output.result;
            record_on_chain(ctx, txn, &status, principal_exists)?;
            synthetic::produce(ctx, txn, &mut status, output.produced)?;
        }
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => {
            debug!("[mr-06] {} {} failed: {}", txn_type, short(&status.txid), e);
            status.fail(e.status(), e.to_string());
            record_on_chain(ctx, txn, &status, principal_exists)?;
            refund(ctx, txn, &mut status)?;
        }
    }

    ctx.block.executed += 1;
    if principal_exists {
        ctx.batch().remove_pending(txn.principal(), &status.txid)?;
    }
    ctx.batch().put_status(&status)?;
    Ok(status)
}

fn record_on_chain(
    ctx: &mut ExecContext<'_>,
    txn: &Transaction,
    status: &TransactionStatus,
    principal_existed: bool,
) -> Result<(), ExecutorError> {
    if !principal_existed && ctx.account(txn.principal())?.is_none() {
        return Ok(());
    }
    let index = ctx.add_chain_entry(txn.principal(), MAIN_CHAIN, status.txid)?;
    ctx.batch().add_transaction_chain(
        &status.txid,
        ChainIndexEntry {
            account: txn.principal().clone(),
            chain: MAIN_CHAIN.to_string(),
            index,
        },
    )?;
    Ok(())
}

/// Return what a failed synthetic transaction carried: credits to the
/// initiator and tokens to the sender.
fn refund(ctx: &mut ExecContext<'_>, txn: &Transaction, status: &mut TransactionStatus) -> Result<(), ExecutorError> {
    let Some(origin) = txn.body.origin() else {
        return Ok(());
    };
    let mut refunds = Vec::new();
    if let (true, Some(initiator)) = (origin.fee_refund > 0, origin.initiator.as_ref()) {
        refunds.push(Transaction::new(
            initiator.clone(),
            [0u8; 32],
            TransactionBody::SyntheticDepositCredits {
                origin: unset_origin(txn.principal()),
                amount: origin.fee_refund,
                is_refund: true,
            },
        ));
    }
    if let TransactionBody::SyntheticDepositTokens {
        token,
        amount,
        is_refund: false,
        ..
    } = &txn.body
    {
        refunds.push(Transaction::new(
            origin.source.clone(),
            [0u8; 32],
            TransactionBody::SyntheticDepositTokens {
                origin: unset_origin(txn.principal()),
                token: token.clone(),
                amount: *amount,
                is_refund: true,
            },
        ));
    }
    if !refunds.is_empty() {
        debug!("[mr-06] Refunding {} for {}", refunds.len(), short(&status.txid));
    }
    synthetic::produce(ctx, txn, status, refunds)
}
