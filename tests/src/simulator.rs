//! # Network Simulator
//!
//! A directory and `bvns` block-validator partitions, each run by `nodes`
//! executors with their own store and dispatcher. Every round opens the
//! same block on every node, delivers the partition's inbox to each node,
//! commits, and moves whatever the nodes dispatched into next round's
//! inboxes.
//!
//! Anchors are delivered ahead of other envelopes so that a released
//! synthetic transaction always finds the directory anchor its receipt
//! ends at.

use mr_01_layered_batch::InMemoryKVStore;
use mr_05_signature_validation::{AccountRouter, SigningKey};
use mr_06_block_executor::{
    BlockOutcome, Executor, ExecutorConfig, ExecutorError, PartitionDescriptor, QueueDispatcher,
    RendezvousRouter,
};
use shared_crypto::Ed25519KeyPair;
use shared_types::{
    acme_url, Account, DataAccount, Envelope, Hash, Identity, KeyBook, KeyEntry, KeyPage,
    NetworkAccountUpdate, NetworkDefinition, PartitionId, PartitionInfo, PartitionKind,
    TokenAccount, TokenAmount, Transaction, TransactionBody, TransactionStatus, Url,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Once};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Decides whether a dispatched envelope reaches its destination.
pub type DeliveryFilter = Box<dyn Fn(&PartitionId, &Envelope) -> bool>;

/// Route `RUST_LOG` output to the test harness once per process.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Parse a URL literal.
pub fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

// =============================================================================
// FIXTURES
// =============================================================================

/// A user key for `page`.
pub fn user_key(seed: u8, page: &str) -> SigningKey {
    SigningKey::ed25519(Ed25519KeyPair::from_seed([seed; 32]), url(page), 1)
}

/// An identity with a single key page at `<name>/book/1`, a data account
/// at `<name>/data` and an ACME account at `<name>/tokens`.
pub fn identity(name: &str, keys: &[&SigningKey], threshold: u64, credits: u64, balance: TokenAmount) -> Vec<Account> {
    let root = url(name);
    let book = root.join("book");
    vec![
        Account::Identity(Identity {
            url: root.clone(),
            authority: book.clone(),
        }),
        Account::KeyBook(KeyBook {
            url: book.clone(),
            page_count: 1,
        }),
        Account::KeyPage(KeyPage {
            url: book.join("1"),
            version: 1,
            accept_threshold: threshold,
            credit_balance: credits,
            keys: keys.iter().map(|k| KeyEntry::key(k.key_hash())).collect(),
        }),
        Account::DataAccount(DataAccount {
            url: root.join("data"),
            authority: book.clone(),
        }),
        Account::TokenAccount(TokenAccount {
            url: root.join("tokens"),
            authority: book,
            token_url: acme_url(),
            balance,
        }),
    ]
}

/// Sign a transaction with one key at timestamp `timestamp`.
pub fn signed(signer: &SigningKey, timestamp: u64, principal: &Url, body: TransactionBody) -> Envelope {
    let unsigned = signer.unsigned(timestamp, &[]);
    let txn = Transaction::new(principal.clone(), unsigned.metadata_hash(), body);
    let signature = signer.complete(unsigned, &txn.hash());
    Envelope::new(txn, vec![signature])
}

// =============================================================================
// SIMULATOR
// =============================================================================

/// Shape of the simulated network.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Block-validator partitions.
    pub bvns: usize,
    /// Nodes per partition.
    pub nodes: usize,
    /// Configuration shared by every executor.
    pub executor: ExecutorConfig,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            bvns: 2,
            nodes: 3,
            executor: ExecutorConfig::default(),
        }
    }
}

/// One executor and the queue its outbound envelopes land in.
pub struct Node {
    /// Descriptor the executor was opened with.
    pub descriptor: PartitionDescriptor,
    /// The executor.
    pub executor: Executor,
    dispatcher: Arc<QueueDispatcher>,
}

/// Result of one round, as seen by the first node of each partition.
#[derive(Debug, Default)]
pub struct Round {
    /// Block index.
    pub height: u64,
    /// Outcome per partition.
    pub outcomes: BTreeMap<PartitionId, BlockOutcome>,
    /// Delivery statuses per partition, in inbox order.
    pub statuses: Vec<(PartitionId, TransactionStatus)>,
}

impl Round {
    /// Status of the first delivery of `hash`.
    pub fn status_of(&self, hash: &Hash) -> Option<&TransactionStatus> {
        self.statuses.iter().map(|(_, s)| s).find(|s| &s.txid == hash)
    }
}

/// The simulated network.
pub struct Simulator {
    config: SimulatorConfig,
    network: Arc<NetworkDefinition>,
    router: RendezvousRouter,
    partitions: BTreeMap<PartitionId, Vec<Node>>,
    inbox: BTreeMap<PartitionId, Vec<Envelope>>,
    updates: Vec<NetworkAccountUpdate>,
    history: Vec<(PartitionId, Envelope)>,
    filter: Option<DeliveryFilter>,
    height: u64,
}

impl Simulator {
    /// Build and bootstrap every node with `genesis`.
    pub fn new(config: SimulatorConfig, genesis: &[Account]) -> Self {
        init_tracing();
        let mut descriptors: Vec<(PartitionKind, Vec<PartitionDescriptor>)> = Vec::new();
        let ids = std::iter::once((PartitionId::directory(), PartitionKind::Directory)).chain(
            (0..config.bvns).map(|i| (PartitionId::new(&format!("bvn{i}")), PartitionKind::BlockValidator)),
        );
        for (p, (id, kind)) in ids.enumerate() {
            let nodes = (0..config.nodes)
                .map(|n| PartitionDescriptor::new(id.clone(), kind, [(p * 16 + n + 1) as u8; 32]))
                .collect();
            descriptors.push((kind, nodes));
        }

        let network = Arc::new(NetworkDefinition {
            partitions: descriptors
                .iter()
                .map(|(kind, nodes)| PartitionInfo {
                    id: nodes[0].id.clone(),
                    kind: *kind,
                    validators: nodes.iter().map(|d| d.node_key_hash()).collect(),
                })
                .collect(),
        });

        let mut partitions = BTreeMap::new();
        for (_, nodes) in descriptors {
            let id = nodes[0].id.clone();
            let nodes: Vec<Node> = nodes
                .into_iter()
                .map(|descriptor| {
                    let dispatcher = Arc::new(QueueDispatcher::new());
                    let mut executor = Executor::new(
                        descriptor.clone(),
                        config.executor.clone(),
                        network.clone(),
                        Box::new(InMemoryKVStore::new()),
                        dispatcher.clone(),
                    )
                    .unwrap();
                    executor.bootstrap(genesis).unwrap();
                    Node {
                        descriptor,
                        executor,
                        dispatcher,
                    }
                })
                .collect();
            partitions.insert(id, nodes);
        }

        Self {
            router: RendezvousRouter::new(network.clone()),
            config,
            network,
            partitions,
            inbox: BTreeMap::new(),
            updates: Vec::new(),
            history: Vec::new(),
            filter: None,
            height: 0,
        }
    }

    /// The network definition every node shares.
    pub fn network(&self) -> Arc<NetworkDefinition> {
        self.network.clone()
    }

    /// Block-validator partition ids.
    pub fn bvns(&self) -> Vec<PartitionId> {
        self.network.block_validators()
    }

    /// Partition owning `url`.
    pub fn route(&self, url: &Url) -> PartitionId {
        self.router.route_account(url).unwrap()
    }

    /// First `acc://<prefix><n>` that routes to `partition`.
    pub fn name_on(&self, prefix: &str, partition: &PartitionId) -> String {
        (0..1024)
            .map(|i| format!("acc://{prefix}{i}"))
            .find(|name| &self.route(&url(name)) == partition)
            .unwrap()
    }

    /// Drop dispatched envelopes for which `filter` returns false.
    pub fn set_filter(&mut self, filter: impl Fn(&PartitionId, &Envelope) -> bool + 'static) {
        self.filter = Some(Box::new(filter));
    }

    /// Deliver everything again.
    pub fn clear_filter(&mut self) {
        self.filter = None;
    }

    /// Node `index` of `partition`.
    pub fn node(&self, partition: &PartitionId, index: usize) -> &Executor {
        &self.partitions[partition][index].executor
    }

    /// Mutable node `index` of `partition`.
    pub fn node_mut(&mut self, partition: &PartitionId, index: usize) -> &mut Executor {
        &mut self.partitions.get_mut(partition).unwrap()[index].executor
    }

    /// Descriptor of node `index` of `partition`.
    pub fn descriptor(&self, partition: &PartitionId, index: usize) -> PartitionDescriptor {
        self.partitions[partition][index].descriptor.clone()
    }

    /// An unbootstrapped executor with the same identity as node `index`.
    pub fn fresh_node(&self, partition: &PartitionId, index: usize) -> (Executor, Arc<QueueDispatcher>) {
        let dispatcher = Arc::new(QueueDispatcher::new());
        let executor = Executor::new(
            self.descriptor(partition, index),
            self.config.executor.clone(),
            self.network.clone(),
            Box::new(InMemoryKVStore::new()),
            dispatcher.clone(),
        )
        .unwrap();
        (executor, dispatcher)
    }

    /// Height of the next round.
    pub fn next_height(&self) -> u64 {
        self.height + 1
    }

    /// Queue an envelope for its principal's partition.
    pub fn submit(&mut self, envelope: Envelope) -> PartitionId {
        let partition = self.route(envelope.transaction.principal());
        self.submit_to(&partition, envelope);
        partition
    }

    /// Queue an envelope for `partition`.
    pub fn submit_to(&mut self, partition: &PartitionId, envelope: Envelope) {
        self.inbox.entry(partition.clone()).or_default().push(envelope);
    }

    /// Queue a network update on every directory node for the next round.
    pub fn submit_network_update(&mut self, update: NetworkAccountUpdate) {
        self.updates.push(update);
    }

    /// Take what is waiting for `partition`.
    pub fn take_inbox(&mut self, partition: &PartitionId) -> Vec<Envelope> {
        self.inbox.remove(partition).unwrap_or_default()
    }

    /// Every envelope dispatched so far that passed the filter.
    pub fn history(&self) -> &[(PartitionId, Envelope)] {
        &self.history
    }

    /// Run one round.
    pub fn step(&mut self) -> Result<Round, ExecutorError> {
        self.height += 1;
        let height = self.height;
        let time = height * 1_000;
        let mut round = Round {
            height,
            ..Round::default()
        };

        for (id, nodes) in &mut self.partitions {
            let mut inbox = self.inbox.remove(id).unwrap_or_default();
            inbox.sort_by_key(|e| !e.transaction.transaction_type().is_anchor());
            for (n, node) in nodes.iter_mut().enumerate() {
                node.executor.begin_block(height, time)?;
                if id.is_directory() {
                    for update in &self.updates {
                        node.executor.submit_network_update(update.clone())?;
                    }
                }
                let statuses = node.executor.deliver_all(&inbox)?;
                let outcome = node.executor.end_block()?;
                if n == 0 {
                    round
                        .statuses
                        .extend(statuses.into_iter().map(|s| (id.clone(), s)));
                    round.outcomes.insert(id.clone(), outcome);
                }
            }
        }
        self.updates.clear();

        for nodes in self.partitions.values() {
            for node in nodes {
                for (destination, envelope) in node.dispatcher.drain() {
                    if self.filter.as_ref().is_some_and(|keep| !keep(&destination, &envelope)) {
                        continue;
                    }
                    self.history.push((destination.clone(), envelope.clone()));
                    self.inbox.entry(destination).or_default().push(envelope);
                }
            }
        }
        debug!(
            "[sim] round {} done, {} envelopes in flight",
            height,
            self.inbox.values().map(Vec::len).sum::<usize>()
        );
        Ok(round)
    }

    /// Run `rounds` rounds.
    pub fn run(&mut self, rounds: usize) -> Result<Vec<Round>, ExecutorError> {
        (0..rounds).map(|_| self.step()).collect()
    }

    /// Committed state roots of every node of `partition`.
    pub fn state_roots(&self, partition: &PartitionId) -> Vec<Hash> {
        self.partitions[partition]
            .iter()
            .map(|n| n.executor.state_root())
            .collect()
    }

    /// Panic unless every node of every partition agrees on its state root.
    pub fn assert_converged(&self) {
        for id in self.partitions.keys() {
            let roots = self.state_roots(id);
            assert!(
                roots.windows(2).all(|w| w[0] == w[1]),
                "{id} nodes disagree: {:?}",
                roots.iter().map(|r| hex::encode(&r[..8])).collect::<Vec<_>>()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_rounds_keep_nodes_in_step() {
        let mut sim = Simulator::new(SimulatorConfig::default(), &[]);
        let rounds = sim.run(4).unwrap();
        assert_eq!(rounds.len(), 4);
        for id in sim.bvns() {
            assert_eq!(sim.node(&id, 2).system_ledger().unwrap().index, 4);
            assert_eq!(rounds[3].outcomes[&id].index, 4);
        }
        sim.assert_converged();
    }

    #[test]
    fn test_names_route_where_asked() {
        let sim = Simulator::new(SimulatorConfig::default(), &[]);
        for id in sim.bvns() {
            let name = sim.name_on("user", &id);
            assert_eq!(sim.route(&url(&name)), id);
        }
    }
}
