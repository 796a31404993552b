//! # Meridian Subsystem Benchmarks
//!
//! | Subsystem | Operation | Expectation |
//! |-----------|-----------|-------------|
//! | mr-02 Merkle Chain | append | constant per entry, amortized |
//! | mr-02 Merkle Chain | receipt | bounded by the mark interval |
//! | mr-03 State Trie | root after inserts | linear in updated leaves |
//! | mr-05 Signature Validation | preverify | scales with cores |
//! | mr-06 Block Executor | empty block | dominated by anchoring |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mr_01_layered_batch::{InMemoryKVStore, Key};
use mr_02_merkle_chain::{MemoryChainStore, MerkleChain};
use mr_03_state_trie::StateTrie;
use mr_05_signature_validation::{preverify, SigningKey};
use mr_06_block_executor::{Executor, ExecutorConfig, PartitionDescriptor, QueueDispatcher};
use rand::Rng;
use shared_crypto::{sha256, Ed25519KeyPair};
use shared_types::{
    DataEntry, Envelope, Hash, NetworkDefinition, PartitionId, PartitionInfo, PartitionKind,
    Transaction, TransactionBody, Url,
};
use std::sync::Arc;
use std::time::Duration;

fn random_hashes(n: usize) -> Vec<Hash> {
    let mut rng = rand::thread_rng();
    (0..n).map(|_| rng.gen::<[u8; 32]>()).collect()
}

// ============================================================================
// MR-02: Merkle Chain
// ============================================================================

fn bench_merkle_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("mr-02-merkle-chain");
    group.measurement_time(Duration::from_secs(5));

    for mark_power in [4u32, 8] {
        let hashes = random_hashes(1_024);
        group.throughput(Throughput::Elements(hashes.len() as u64));
        group.bench_with_input(BenchmarkId::new("append_1024", mark_power), &hashes, |b, hashes| {
            b.iter(|| {
                let chain = MerkleChain::new(Key::new("bench"), mark_power);
                let mut store = MemoryChainStore::new();
                for hash in hashes {
                    chain.add(&mut store, *hash).unwrap();
                }
                black_box(chain.anchor(&store).unwrap())
            })
        });

        let chain = MerkleChain::new(Key::new("bench"), mark_power);
        let mut store = MemoryChainStore::new();
        for hash in random_hashes(10_000) {
            chain.add(&mut store, hash).unwrap();
        }
        group.bench_with_input(BenchmarkId::new("receipt", mark_power), &chain, |b, chain| {
            b.iter(|| black_box(chain.receipt(&store, 1_234, 9_999).unwrap()))
        });
    }
    group.finish();
}

// ============================================================================
// MR-03: State Trie
// ============================================================================

fn bench_state_trie(c: &mut Criterion) {
    let mut group = c.benchmark_group("mr-03-state-trie");

    for size in [100usize, 1_000, 10_000] {
        let leaves: Vec<(Hash, Hash)> = random_hashes(size)
            .into_iter()
            .zip(random_hashes(size))
            .collect();
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("insert_then_root", size), &leaves, |b, leaves| {
            b.iter(|| {
                let mut trie = StateTrie::new();
                for (key, value) in leaves {
                    trie.insert(*key, *value);
                }
                black_box(trie.root())
            })
        });
    }

    let trie = StateTrie::from_leaves(random_hashes(10_000).into_iter().map(|h| (h, sha256(&h))));
    let target = trie.leaves()[5_000].0;
    group.bench_function("proof_10000", |b| b.iter(|| black_box(trie.proof(&target))));
    group.finish();
}

// ============================================================================
// MR-05: Signature Validation
// ============================================================================

fn signed_envelopes(n: usize) -> Vec<Envelope> {
    let key = SigningKey::ed25519(
        Ed25519KeyPair::from_seed([3u8; 32]),
        Url::parse("acc://bench/book/1").unwrap(),
        1,
    );
    let principal = Url::parse("acc://bench/data").unwrap();
    (0..n)
        .map(|i| {
            let unsigned = key.unsigned(i as u64 + 1, &[]);
            let txn = Transaction::new(
                principal.clone(),
                unsigned.metadata_hash(),
                TransactionBody::WriteData {
                    entry: DataEntry {
                        data: vec![format!("entry {i}").into_bytes()],
                    },
                },
            );
            let signature = key.complete(unsigned, &txn.hash());
            Envelope::new(txn, vec![signature])
        })
        .collect()
}

fn bench_preverify(c: &mut Criterion) {
    let mut group = c.benchmark_group("mr-05-signature-validation");
    group.measurement_time(Duration::from_secs(10));

    for size in [1usize, 50, 500] {
        let envelopes = signed_envelopes(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("preverify", size), &envelopes, |b, envelopes| {
            b.iter(|| {
                let results = preverify(envelopes);
                assert!(results.iter().all(Result::is_ok));
                black_box(results)
            })
        });
    }
    group.finish();
}

// ============================================================================
// MR-06: Block Executor
// ============================================================================

fn bench_empty_blocks(c: &mut Criterion) {
    let descriptor = PartitionDescriptor::new(PartitionId::new("bvn0"), PartitionKind::BlockValidator, [5u8; 32]);
    let network = Arc::new(NetworkDefinition {
        partitions: vec![
            PartitionInfo {
                id: PartitionId::directory(),
                kind: PartitionKind::Directory,
                validators: Vec::new(),
            },
            PartitionInfo {
                id: descriptor.id.clone(),
                kind: PartitionKind::BlockValidator,
                validators: vec![descriptor.node_key_hash()],
            },
        ],
    });
    let dispatcher = Arc::new(QueueDispatcher::new());
    let mut executor = Executor::new(
        descriptor,
        ExecutorConfig::default(),
        network,
        Box::new(InMemoryKVStore::new()),
        dispatcher.clone(),
    )
    .unwrap();
    executor.bootstrap(&[]).unwrap();

    let mut height = 0u64;
    c.bench_function("mr-06-block-executor/empty_block", |b| {
        b.iter(|| {
            height += 1;
            executor.begin_block(height, height * 1_000).unwrap();
            let outcome = executor.end_block().unwrap();
            dispatcher.drain();
            black_box(outcome)
        })
    });
}

criterion_group!(
    benches,
    bench_merkle_chain,
    bench_state_trie,
    bench_preverify,
    bench_empty_blocks
);
criterion_main!(benches);
