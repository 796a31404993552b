//! # Block Executor Service
//!
//! One [`Executor`] per node. Blocks are driven from outside:
//!
//! ```text
//! begin_block(index, time)
//!   deliver(envelope)*        each in its own child batch
//! end_block()                 drain → anchor chains → send synthetic → anchor → commit → dispatch
//! ```
//!
//! `check` runs the same validation against a scratch batch that is
//! always discarded.

pub(crate) mod anchors;
mod block;
mod bootstrap;
pub mod context;
pub(crate) mod delivery;
mod queries;
pub(crate) mod synthetic;

use crate::adapters::{BackgroundQueue, RendezvousRouter};
use crate::config::{ExecutorConfig, PartitionDescriptor};
use crate::domain::entities::{BlockState, Queued};
use crate::domain::errors::ExecutorError;
use crate::handlers::HandlerTable;
use crate::ports::Dispatcher;
use context::{ExecContext, NodeContext};
use delivery::Mode;
use mr_01_layered_batch::KeyValueStore;
use mr_04_ledger_database::Database;
use mr_05_signature_validation::{preverify, signed_hash, AccountRouter, SignatureValidator, SigningKey};
use shared_types::{
    Envelope, Hash, NetworkAccountUpdate, NetworkDefinition, PartitionId, TransactionStatus, TransactionType,
};
use std::sync::Arc;
use tracing::{debug, error, info, trace};

/// Executes blocks for one node of a partition.
pub struct Executor {
    node: NodeContext,
    db: Database,
    dispatcher: Arc<dyn Dispatcher>,
    block: Option<BlockState>,
    background: Option<BackgroundQueue>,
}

impl Executor {
    /// Open an executor over `store` with the built-in handlers and
    /// rendezvous routing.
    pub fn new(
        partition: PartitionDescriptor,
        config: ExecutorConfig,
        network: Arc<NetworkDefinition>,
        store: Box<dyn KeyValueStore>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Result<Self, ExecutorError> {
        let db = Database::open(store, config.mark_power)?;
        let router: Arc<dyn AccountRouter> = Arc::new(RendezvousRouter::new(network.clone()));
        let validator = SignatureValidator::new(partition.id.clone(), network.clone(), router.clone());
        let node_key = SigningKey::ed25519(partition.node_key(), partition.id.operators_page_url(), 1);
        info!(
            "[mr-06] Executor for {} opened (mark power {})",
            partition.id, config.mark_power
        );
        Ok(Self {
            node: NodeContext {
                partition,
                config,
                network,
                router,
                handlers: Arc::new(HandlerTable::standard()),
                validator,
                node_key,
            },
            db,
            dispatcher,
            block: None,
            background: None,
        })
    }

    /// Replace the account router.
    #[must_use]
    pub fn with_router(mut self, router: Arc<dyn AccountRouter>) -> Self {
        self.node.validator =
            SignatureValidator::new(self.node.id().clone(), self.node.network.clone(), router.clone());
        self.node.router = router;
        self
    }

    /// Replace the handler table.
    #[must_use]
    pub fn with_handlers(mut self, handlers: Arc<HandlerTable>) -> Self {
        self.node.handlers = handlers;
        self
    }

    /// Export snapshots through `queue`.
    #[must_use]
    pub fn with_background(mut self, queue: BackgroundQueue) -> Self {
        self.background = Some(queue);
        self
    }

    /// Detach the background queue, e.g. to shut it down.
    pub fn take_background(&mut self) -> Option<BackgroundQueue> {
        self.background.take()
    }

    /// Partition id.
    pub fn partition(&self) -> &PartitionId {
        self.node.id()
    }

    /// Node configuration.
    pub fn node(&self) -> &NodeContext {
        &self.node
    }

    /// Index of the open block.
    pub fn current_block(&self) -> Option<u64> {
        self.block.as_ref().map(|b| b.index)
    }

    // =========================================================================
    // DELIVERY
    // =========================================================================

    /// Validate an envelope against the open block without keeping anything.
    pub fn check(&mut self, envelope: &Envelope) -> Result<TransactionStatus, ExecutorError> {
        let Executor { node, db, block, .. } = self;
        let block = block.as_ref().ok_or(ExecutorError::NoBlock)?;
        if let Some(rejected) = type_check(node, envelope) {
            return Ok(rejected);
        }
        let scratch_id = db.begin_child(block.batch, true);
        let mut scratch = BlockState::new(scratch_id, block.index, block.time);
        let result = {
            let mut ctx = ExecContext::new(node, db, scratch_id, &mut scratch);
            delivery::process_envelope(&mut ctx, envelope, false, Mode::Check)
        };
        db.discard(scratch_id);
        settle(signed_hash(&envelope.transaction), result)
    }

    /// Deliver an envelope into the open block.
    pub fn deliver(&mut self, envelope: &Envelope) -> Result<TransactionStatus, ExecutorError> {
        self.deliver_with(envelope, false)
    }

    /// Deliver a batch of envelopes. Key signatures are verified in
    /// parallel first; delivery itself stays sequential.
    pub fn deliver_all(&mut self, envelopes: &[Envelope]) -> Result<Vec<TransactionStatus>, ExecutorError> {
        let verified = preverify(envelopes);
        envelopes
            .iter()
            .zip(verified)
            .map(|(envelope, result)| match result {
                Ok(()) => self.deliver_with(envelope, true),
                Err(e) => settle(signed_hash(&envelope.transaction), Err(e.into())),
            })
            .collect()
    }

    /// Queue a network update for the next directory anchor.
    pub fn submit_network_update(&mut self, update: NetworkAccountUpdate) -> Result<(), ExecutorError> {
        if !self.node.is_directory() {
            return Err(ExecutorError::BadRequest(
                "network updates are submitted to the directory".into(),
            ));
        }
        let block = self.block.as_mut().ok_or(ExecutorError::NoBlock)?;
        debug!("[mr-06] Network update for {} queued", update.name);
        block.updates.push(update);
        Ok(())
    }

    fn deliver_with(&mut self, envelope: &Envelope, preverified: bool) -> Result<TransactionStatus, ExecutorError> {
        let Executor { node, db, block, .. } = self;
        let block = block.as_mut().ok_or(ExecutorError::NoBlock)?;
        if let Some(rejected) = type_check(node, envelope) {
            return Ok(rejected);
        }
        let root = block.batch;
        let mut ctx = ExecContext::new(node, db, root, block);
        let hash = signed_hash(&envelope.transaction);
        let status = scoped(&mut ctx, hash, |c| {
            delivery::process_envelope(c, envelope, preverified, Mode::Deliver)
        })?;
        drain_queue(&mut ctx)?;
        Ok(status)
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("partition", self.node.id())
            .field("block", &self.current_block())
            .finish_non_exhaustive()
    }
}

/// Reject envelopes that can never be delivered from outside.
fn type_check(node: &NodeContext, envelope: &Envelope) -> Option<TransactionStatus> {
    let txn_type = envelope.transaction.transaction_type();
    let err = if txn_type == TransactionType::SystemWriteData {
        ExecutorError::InternalOnly(txn_type)
    } else if txn_type != TransactionType::Remote && !node.handlers.contains(txn_type) {
        ExecutorError::MissingHandler(txn_type)
    } else {
        return None;
    };
    debug!("[mr-06] Rejected {}: {}", txn_type, err);
    Some(rejected(signed_hash(&envelope.transaction), &err))
}

fn rejected(hash: Hash, err: &ExecutorError) -> TransactionStatus {
    let mut status = TransactionStatus::new(hash);
    status.fail(err.status(), err.to_string());
    status
}

/// Fatal errors propagate; anything else becomes a rejected status.
fn settle(hash: Hash, result: Result<TransactionStatus, ExecutorError>) -> Result<TransactionStatus, ExecutorError> {
    match result {
        Ok(status) => Ok(status),
        Err(e) if e.is_fatal() => {
            error!("[mr-06] Fatal error on {}: {}", hex::encode(&hash[..8]), e);
            Err(e)
        }
        Err(e) => {
            debug!("[mr-06] {} rejected: {}", hex::encode(&hash[..8]), e);
            Ok(rejected(hash, &e))
        }
    }
}

/// Run `f` in a child of `ctx`, keeping its writes only on success.
fn scoped(
    ctx: &mut ExecContext<'_>,
    hash: Hash,
    f: impl FnOnce(&mut ExecContext<'_>) -> Result<TransactionStatus, ExecutorError>,
) -> Result<TransactionStatus, ExecutorError> {
    let mut child = ctx.child();
    let result = f(&mut child);
    match result {
        Ok(status) => {
            child.commit()?;
            Ok(status)
        }
        Err(e) => {
            child.discard();
            settle(hash, Err(e))
        }
    }
}

/// Run everything queued behind the current delivery.
fn drain_queue(ctx: &mut ExecContext<'_>) -> Result<(), ExecutorError> {
    while let Some(next) = ctx.block.queue.pop_front() {
        let status = match next {
            Queued::Execute(hash) | Queued::Evaluate(hash) => {
                scoped(ctx, hash, |c| delivery::process_queued(c, hash))?
            }
            Queued::Internal(txn) => {
                let hash = txn.hash();
                scoped(ctx, hash, |c| delivery::process_internal(c, &txn))?
            }
        };
        trace!(
            "[mr-06] Queued {} finished as {:?}",
            hex::encode(&status.txid[..8]),
            status.code
        );
    }
    Ok(())
}
