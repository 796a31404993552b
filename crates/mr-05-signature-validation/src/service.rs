//! # Signature Validator
//!
//! Stateful validation of the signatures of one delivery.
//!
//! ## Rules
//!
//! | Signature | Accepted when | Contributes |
//! |-----------|---------------|-------------|
//! | key | key is on the signer at the named version, or a source validator for synthetic/system | signer key |
//! | delegated | inner signature valid, delegator lists the inner signer | delegator key |
//! | partition | synthetic/system transaction addressed here | route |
//! | receipt | synthetic/system transaction, proof ends at a recorded directory anchor | nothing |
//!
//! A receipt that ends at the source partition's root anchor instead is
//! checked with [`SignatureValidator::validate_source_receipt`] and held by
//! the executor until a directory anchor extends it.
//! | remote, set | never as a terminal signature | |
//!
//! User signatures must route here unless the delivery was forwarded;
//! forwarded signers that live elsewhere are accepted with threshold one.

use crate::domain::crypto::{signed_hash, verify_key};
use crate::domain::entities::{Accepted, PartitionRoute, SignerKey};
use crate::domain::errors::ValidationError;
use crate::domain::metadata::{SignatureMetadata, MAX_DELEGATION_DEPTH};
use crate::ports::outbound::{AccountRouter, ValidationState};
use shared_types::{
    DelegatedSignature, Hash, KeySignature, NetworkDefinition, PartitionId, PartitionSignature,
    ReceiptSignature, Signature, Transaction, TransactionType, Url,
};
use std::sync::Arc;
use tracing::{debug, trace};

/// One delivery of signatures for a transaction.
#[derive(Debug, Clone)]
pub struct Delivery<'a> {
    /// Transaction being signed.
    pub transaction: &'a Transaction,
    /// Signatures delivered.
    pub signatures: &'a [Signature],
    /// Forwarded by another partition.
    pub forwarded: bool,
    /// Transaction has not been seen before.
    pub first_seen: bool,
    /// Key signatures were already verified cryptographically.
    pub preverified: bool,
    /// Source partition already recorded for the transaction.
    pub source: Option<PartitionId>,
}

struct Context<'a> {
    transaction: &'a Transaction,
    txn_type: TransactionType,
    hash: Hash,
    source: Option<PartitionId>,
    preverified: bool,
}

impl Context<'_> {
    fn is_system(&self) -> bool {
        self.txn_type.is_synthetic() || self.txn_type.is_system()
    }
}

/// Validates signatures against signer state and routing.
pub struct SignatureValidator {
    partition: PartitionId,
    network: Arc<NetworkDefinition>,
    router: Arc<dyn AccountRouter>,
}

impl SignatureValidator {
    /// Validator for the partition `partition`.
    pub fn new(partition: PartitionId, network: Arc<NetworkDefinition>, router: Arc<dyn AccountRouter>) -> Self {
        Self {
            partition,
            network,
            router,
        }
    }

    /// Partition executing.
    pub fn partition(&self) -> &PartitionId {
        &self.partition
    }

    /// Validate every signature of a delivery. Fails on the first
    /// rejected signature.
    pub fn validate_delivery<S: ValidationState + ?Sized>(
        &self,
        state: &S,
        delivery: &Delivery<'_>,
    ) -> Result<Vec<Accepted>, ValidationError> {
        let transaction = delivery.transaction;
        let initiator = transaction.header.initiator;
        let flags: Vec<bool> = delivery
            .signatures
            .iter()
            .map(|s| s.metadata_hash() == initiator)
            .collect();
        let initiators = flags.iter().filter(|f| **f).count();
        if initiators > 1 {
            return Err(ValidationError::MultipleInitiators(initiators));
        }
        if delivery.first_seen && initiators == 0 {
            return Err(ValidationError::MissingInitiator);
        }

        let source = delivery.source.clone().or_else(|| {
            delivery.signatures.iter().find_map(|s| match s {
                Signature::Partition(p) => PartitionId::from_url(&p.source_network),
                _ => None,
            })
        });
        let ctx = Context {
            transaction,
            txn_type: transaction.transaction_type(),
            hash: signed_hash(transaction),
            source,
            preverified: delivery.preverified,
        };

        let mut terminal = Vec::with_capacity(delivery.signatures.len());
        for (signature, initiator) in delivery.signatures.iter().zip(flags) {
            if delivery.forwarded {
                unwrap_forwarded(signature, initiator, &mut terminal);
            } else {
                terminal.push((signature, initiator));
            }
        }

        let mut accepted = Vec::with_capacity(terminal.len());
        for (signature, initiator) in terminal {
            let metadata = SignatureMetadata::top(signature.signer_url(), initiator, delivery.forwarded);
            self.check_routing(&ctx, signature, &metadata)?;
            accepted.push(self.validate(state, &ctx, signature, &metadata)?);
        }
        debug!(
            "[mr-05] {} signatures accepted for {}",
            accepted.len(),
            hex::encode(&ctx.hash[..8])
        );
        Ok(accepted)
    }

    /// Check that a synthetic or system signature set has every kind it
    /// needs: a partition signature, a key signature and, except for
    /// anchors, a receipt.
    pub fn require_complete<'s>(
        txn_type: TransactionType,
        signatures: impl IntoIterator<Item = &'s Signature>,
    ) -> Result<(), ValidationError> {
        if !(txn_type.is_synthetic() || txn_type.is_system()) {
            return Ok(());
        }
        let (mut partition, mut key, mut receipt) = (false, false, false);
        for signature in signatures {
            match signature {
                Signature::Partition(_) => partition = true,
                Signature::Key(_) => key = true,
                Signature::Receipt(_) => receipt = true,
                _ => {}
            }
        }
        if !partition {
            return Err(ValidationError::Incomplete("partition"));
        }
        if !key {
            return Err(ValidationError::Incomplete("key"));
        }
        if !txn_type.is_anchor() && !receipt {
            return Err(ValidationError::Incomplete("receipt"));
        }
        Ok(())
    }

    /// Check a receipt that proves a synthetic transaction only as far as
    /// its source partition's root anchor. Returns that anchor; the
    /// transaction waits on it until a directory anchor extends the proof.
    pub fn validate_source_receipt(
        &self,
        transaction: &Transaction,
        signature: &ReceiptSignature,
    ) -> Result<Hash, ValidationError> {
        if !transaction.transaction_type().is_synthetic() {
            return Err(ValidationError::NotAllowed(
                "receipt signatures are only valid on synthetic and system transactions",
            ));
        }
        let hash = signed_hash(transaction);
        if signature.transaction_hash != hash || signature.proof.start != hash {
            return Err(ValidationError::InvalidReceipt(
                "receipt does not start at the transaction".into(),
            ));
        }
        signature
            .proof
            .validate()
            .map_err(|e| ValidationError::InvalidReceipt(e.to_string()))?;
        trace!(
            "[mr-05] {} proven to source anchor {}",
            hex::encode(&hash[..8]),
            hex::encode(&signature.proof.anchor[..8])
        );
        Ok(signature.proof.anchor)
    }

    // =========================================================================
    // PER-SIGNATURE RULES
    // =========================================================================

    fn check_routing(
        &self,
        ctx: &Context<'_>,
        signature: &Signature,
        metadata: &SignatureMetadata,
    ) -> Result<(), ValidationError> {
        if ctx.is_system() || signature.is_system() || metadata.forwarded {
            return Ok(());
        }
        if matches!(signature, Signature::Remote(_) | Signature::Set(_)) {
            return Ok(());
        }
        let location = signer_account(&metadata.location);
        let expected = self.router.route_account(&location)?;
        if expected != self.partition {
            return Err(ValidationError::WrongPartition {
                signer: metadata.location.clone(),
                expected,
                actual: self.partition.clone(),
            });
        }
        Ok(())
    }

    fn validate<S: ValidationState + ?Sized>(
        &self,
        state: &S,
        ctx: &Context<'_>,
        signature: &Signature,
        metadata: &SignatureMetadata,
    ) -> Result<Accepted, ValidationError> {
        match signature {
            Signature::Key(key) => self.validate_key(state, ctx, key, metadata),
            Signature::Delegated(delegated) => {
                if ctx.is_system() {
                    return Err(ValidationError::NotAllowed(
                        "delegated signatures are not valid on synthetic or system transactions",
                    ));
                }
                let inner = metadata.nested(signature.metadata_hash());
                if inner.depth > MAX_DELEGATION_DEPTH {
                    return Err(ValidationError::DepthExceeded(inner.depth));
                }
                let accepted = self.validate(state, ctx, &delegated.signature, &inner)?;
                self.validate_delegator(state, ctx, delegated, &accepted, metadata)
            }
            Signature::Partition(partition) => self.validate_partition(ctx, partition, metadata),
            Signature::Receipt(receipt) => self.validate_receipt(state, ctx, receipt),
            Signature::Remote(_) | Signature::Set(_) => Err(ValidationError::NotAllowed(
                "remote and set signatures are not allowed outside of a forwarded transaction",
            )),
        }
    }

    fn validate_key<S: ValidationState + ?Sized>(
        &self,
        state: &S,
        ctx: &Context<'_>,
        key: &KeySignature,
        metadata: &SignatureMetadata,
    ) -> Result<Accepted, ValidationError> {
        if !ctx.preverified {
            verify_key(key, metadata.outer_hash.as_ref(), &ctx.hash)?;
        }
        let key_hash = key.public_key_hash();

        if ctx.is_system() {
            let source = ctx.source.clone().ok_or(ValidationError::UnknownSource)?;
            if !self.network.is_validator(&source, &key_hash) {
                return Err(ValidationError::NotValidator(source));
            }
            trace!("[mr-05] validator key of {source} accepted");
            return Ok(Accepted::Key(SignerKey {
                signer: source.operators_page_url(),
                version: 1,
                key_hash,
                threshold: self.network.validator_threshold(&source),
                authority: source.operators_book_url(),
                remote: source != self.partition,
                initiator: metadata.initiator,
            }));
        }

        let signer_url = signer_account(&key.signer);
        let routed = self.router.route_account(&signer_url)?;
        if routed != self.partition {
            if !(metadata.forwarded || metadata.nested) {
                return Err(ValidationError::WrongPartition {
                    signer: signer_url,
                    expected: routed,
                    actual: self.partition.clone(),
                });
            }
            let authority = authority_of(&signer_url);
            if metadata.is_first_level() {
                self.check_authority(state, ctx, &signer_url, &authority)?;
            }
            return Ok(Accepted::Key(SignerKey {
                signer: signer_url,
                version: key.signer_version,
                key_hash,
                threshold: 1,
                authority,
                remote: true,
                initiator: metadata.initiator,
            }));
        }

        let account = state
            .load_account(&signer_url)?
            .ok_or_else(|| ValidationError::SignerNotFound(signer_url.clone()))?;
        let signer = account
            .as_signer()
            .ok_or_else(|| ValidationError::SignerNotFound(signer_url.clone()))?;
        if signer.entry_by_key_hash(&key_hash).is_none() {
            return Err(ValidationError::KeyNotFound(signer_url));
        }
        if key.signer_version != signer.version() {
            return Err(ValidationError::VersionMismatch {
                signer: signer_url,
                current: signer.version(),
                signed: key.signer_version,
            });
        }
        if signer.threshold() > signer.entry_count() as u64 {
            return Err(ValidationError::ThresholdUnsatisfiable {
                signer: signer_url,
                threshold: signer.threshold(),
                entries: signer.entry_count(),
            });
        }
        let authority = signer.authority_url();
        if metadata.is_first_level() {
            self.check_authority(state, ctx, &signer_url, &authority)?;
        }
        Ok(Accepted::Key(SignerKey {
            signer: signer_url,
            version: signer.version(),
            key_hash,
            threshold: signer.threshold(),
            authority,
            remote: false,
            initiator: metadata.initiator,
        }))
    }

    fn validate_delegator<S: ValidationState + ?Sized>(
        &self,
        state: &S,
        ctx: &Context<'_>,
        delegated: &DelegatedSignature,
        inner: &Accepted,
        metadata: &SignatureMetadata,
    ) -> Result<Accepted, ValidationError> {
        let delegate = match inner {
            Accepted::Key(key) => key.signer.clone(),
            Accepted::Unresolved { signer } => signer.clone(),
            _ => delegated.signature.signer_url(),
        };
        let delegator = &delegated.delegator;
        if self.router.route_account(delegator)? != self.partition {
            trace!("[mr-05] delegator {delegator} is not local");
            return Ok(Accepted::Unresolved {
                signer: delegator.clone(),
            });
        }

        let account = state
            .load_account(delegator)?
            .ok_or_else(|| ValidationError::SignerNotFound(delegator.clone()))?;
        let signer = account
            .as_signer()
            .ok_or_else(|| ValidationError::SignerNotFound(delegator.clone()))?;
        if signer.entry_by_delegate(&delegate).is_none() {
            return Err(ValidationError::NotDelegate {
                delegator: delegator.clone(),
                delegate,
            });
        }
        let authority = signer.authority_url();
        if metadata.is_first_level() {
            self.check_authority(state, ctx, delegator, &authority)?;
        }
        Ok(Accepted::Key(SignerKey {
            signer: delegator.clone(),
            version: signer.version(),
            key_hash: delegate.account_id(),
            threshold: signer.threshold(),
            authority,
            remote: false,
            initiator: metadata.initiator,
        }))
    }

    fn validate_partition(
        &self,
        ctx: &Context<'_>,
        signature: &PartitionSignature,
        metadata: &SignatureMetadata,
    ) -> Result<Accepted, ValidationError> {
        if !ctx.is_system() {
            return Err(ValidationError::NotAllowed(
                "partition signatures are only valid on synthetic and system transactions",
            ));
        }
        if PartitionId::from_url(&signature.destination_network).as_ref() != Some(&self.partition) {
            return Err(ValidationError::WrongDestination {
                destination: signature.destination_network.clone(),
                actual: self.partition.clone(),
            });
        }
        Ok(Accepted::Partition(PartitionRoute {
            source: signature.source_network.clone(),
            destination: signature.destination_network.clone(),
            sequence: signature.sequence_number,
            initiator: metadata.initiator,
        }))
    }

    fn validate_receipt<S: ValidationState + ?Sized>(
        &self,
        state: &S,
        ctx: &Context<'_>,
        signature: &ReceiptSignature,
    ) -> Result<Accepted, ValidationError> {
        if !ctx.is_system() {
            return Err(ValidationError::NotAllowed(
                "receipt signatures are only valid on synthetic and system transactions",
            ));
        }
        if signature.transaction_hash != ctx.hash || signature.proof.start != ctx.hash {
            return Err(ValidationError::InvalidReceipt(
                "receipt does not start at the transaction".into(),
            ));
        }
        signature
            .proof
            .validate()
            .map_err(|e| ValidationError::InvalidReceipt(e.to_string()))?;
        let anchor = signature.proof.anchor;
        if !state.is_directory_anchor(&anchor)? {
            return Err(ValidationError::UnknownAnchor(hex::encode(anchor)));
        }
        Ok(Accepted::Receipt {
            source: signature.source_network.clone(),
            anchor,
        })
    }

    fn check_authority<S: ValidationState + ?Sized>(
        &self,
        state: &S,
        ctx: &Context<'_>,
        signer: &Url,
        authority: &Url,
    ) -> Result<(), ValidationError> {
        let principal = ctx.transaction.principal();
        match state.load_account(principal)? {
            Some(account) if &account.governing_authority() != authority => {
                Err(ValidationError::NotAuthorized {
                    signer: signer.clone(),
                    principal: principal.clone(),
                })
            }
            _ => Ok(()),
        }
    }
}

/// Remote and set wrappers carry signatures validated elsewhere; a
/// forwarded delivery is checked against what they wrap.
fn unwrap_forwarded<'s>(signature: &'s Signature, initiator: bool, out: &mut Vec<(&'s Signature, bool)>) {
    match signature {
        Signature::Remote(remote) => unwrap_forwarded(&remote.signature, initiator, out),
        Signature::Set(set) => {
            for inner in &set.signatures {
                unwrap_forwarded(inner, initiator, out);
            }
        }
        _ => out.push((signature, initiator)),
    }
}

/// Account that signs for `url`: the lite identity for lite addresses,
/// otherwise the URL itself.
pub fn signer_account(url: &Url) -> Url {
    if url.is_lite() {
        url.root_identity()
    } else {
        url.clone()
    }
}

fn authority_of(signer: &Url) -> Url {
    if signer.is_lite() {
        signer.root_identity()
    } else {
        signer.parent().unwrap_or_else(|| signer.clone())
    }
}
