//! # Snapshot Scenarios
//!
//! A node's committed state is collected into a snapshot and restored
//! into an empty node of the same partition. Periodic snapshots go
//! through the background queue to a sink.

#[cfg(test)]
mod tests {
    use crate::simulator::{identity, signed, url, user_key, Simulator, SimulatorConfig};
    use mr_02_merkle_chain::{DATA_CHAIN, MAIN_CHAIN, ROOT_CHAIN};
    use mr_06_block_executor::{
        BackgroundQueue, ExecutorConfig, ExecutorError, FileSnapshotSink, MemorySnapshotSink,
        SnapshotSink,
    };
    use shared_types::{DataEntry, PartitionId, TransactionBody};
    use std::sync::Arc;

    /// A network where one identity has written `writes` entries.
    fn written(writes: u64, config: SimulatorConfig) -> (Simulator, PartitionId, String) {
        let layout = Simulator::new(SimulatorConfig::default(), &[]);
        let bvn = layout.bvns()[0].clone();
        let name = layout.name_on("eve", &bvn);
        let key = user_key(41, &format!("{name}/book/1"));
        let mut sim = Simulator::new(config, &identity(&name, &[&key], 1, 1_000, 0));

        let data = url(&format!("{name}/data"));
        for i in 0..writes {
            sim.submit(signed(
                &key,
                i + 1,
                &data,
                TransactionBody::WriteData {
                    entry: DataEntry {
                        data: vec![format!("entry {i}").into_bytes()],
                    },
                },
            ));
        }
        sim.run(3).unwrap();
        (sim, bvn, name)
    }

    #[test]
    fn test_restore_reproduces_state() {
        let (sim, bvn, name) = written(4, SimulatorConfig::default());
        let source = sim.node(&bvn, 0);
        let bytes = source.collect_snapshot().unwrap();

        let (mut restored, _) = sim.fresh_node(&bvn, 2);
        let header = restored.restore_snapshot(&bytes).unwrap();
        assert_eq!(header.partition, bvn);
        assert_eq!(header.height, 3);
        assert_eq!(header.root_hash, source.state_root());
        assert_eq!(restored.state_root(), source.state_root());

        let data = url(&format!("{name}/data"));
        assert_eq!(restored.account(&data).unwrap(), source.account(&data).unwrap());
        for chain in [MAIN_CHAIN, DATA_CHAIN] {
            assert_eq!(restored.chain_height(&data, chain).unwrap(), 4);
        }
        let ledger = bvn.ledger_url();
        assert_eq!(
            restored.chain_height(&ledger, ROOT_CHAIN).unwrap(),
            source.chain_height(&ledger, ROOT_CHAIN).unwrap()
        );
        assert_eq!(restored.system_ledger().unwrap(), source.system_ledger().unwrap());
        assert_eq!(restored.anchor_ledger().unwrap(), source.anchor_ledger().unwrap());

        let first = source.chain_entry(&data, MAIN_CHAIN, 0).unwrap();
        let receipts = restored.receipts(&first).unwrap();
        assert!(receipts.iter().all(|r| r.receipt.as_ref().is_ok_and(|r| r.is_valid())));
        assert_eq!(restored.transaction(&first).unwrap(), source.transaction(&first).unwrap());
    }

    #[test]
    fn test_restore_needs_an_empty_node_of_the_same_partition() {
        let (sim, bvn, _) = written(1, SimulatorConfig::default());
        let bytes = sim.node(&bvn, 0).collect_snapshot().unwrap();

        let (mut bootstrapped, _) = sim.fresh_node(&bvn, 1);
        bootstrapped.bootstrap(&[]).unwrap();
        assert!(bootstrapped.restore_snapshot(&bytes).is_err());

        let other = sim.bvns()[1].clone();
        let (mut elsewhere, _) = sim.fresh_node(&other, 0);
        assert!(matches!(
            elsewhere.restore_snapshot(&bytes),
            Err(ExecutorError::BadRequest(_))
        ));

        let (mut busy, _) = sim.fresh_node(&bvn, 1);
        busy.begin_block(1, 0).unwrap();
        assert_eq!(busy.restore_snapshot(&bytes).unwrap_err(), ExecutorError::BlockInProgress(1));
    }

    // =========================================================================
    // BACKGROUND EXPORT
    // =========================================================================

    #[tokio::test]
    async fn test_periodic_snapshots_reach_the_sink() {
        let config = SimulatorConfig {
            executor: ExecutorConfig::default().with_snapshots(2, false),
            ..SimulatorConfig::default()
        };
        let sim = Simulator::new(config, &[]);
        let bvn = sim.bvns()[0].clone();

        let sink = Arc::new(MemorySnapshotSink::new());
        let (executor, _) = sim.fresh_node(&bvn, 0);
        let mut executor = executor.with_background(BackgroundQueue::spawn(sink.clone()));
        executor.bootstrap(&[]).unwrap();
        for height in 1..=5 {
            executor.begin_block(height, height * 1_000).unwrap();
            executor.end_block().unwrap();
        }

        let queue = executor.take_background().unwrap();
        assert_eq!(queue.shutdown().await, 2);
        let heights: Vec<u64> = sink.snapshots().iter().map(|(_, h, _)| *h).collect();
        assert_eq!(heights, vec![2, 4]);

        let (mut restored, _) = sim.fresh_node(&bvn, 1);
        let header = restored.restore_snapshot(&sink.latest().unwrap()).unwrap();
        assert_eq!(header.height, 4);
        assert_eq!(restored.system_ledger().unwrap().index, 4);
    }

    #[tokio::test]
    async fn test_file_sink_writes_one_file_per_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let config = SimulatorConfig {
            executor: ExecutorConfig::default().with_snapshots(3, true),
            ..SimulatorConfig::default()
        };
        let sim = Simulator::new(config, &[]);
        let bvn = sim.bvns()[1].clone();

        let sink = Arc::new(FileSnapshotSink::new(dir.path()));
        let (executor, _) = sim.fresh_node(&bvn, 0);
        let mut executor = executor.with_background(BackgroundQueue::spawn(sink.clone()));
        executor.bootstrap(&[]).unwrap();
        for height in 1..=6 {
            executor.begin_block(height, height * 1_000).unwrap();
            executor.end_block().unwrap();
        }
        assert_eq!(executor.take_background().unwrap().shutdown().await, 2);

        for height in [3, 6] {
            assert!(sink.path(&bvn, height).exists());
        }
        assert!(!sink.path(&bvn, 4).exists());

        let bytes = std::fs::read(sink.path(&bvn, 6)).unwrap();
        let (mut restored, _) = sim.fresh_node(&bvn, 2);
        restored.restore_snapshot(&bytes).unwrap();
        assert_eq!(restored.state_root(), executor.state_root());
    }
}
