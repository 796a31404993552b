//! # Anchoring Scenarios
//!
//! Partition anchors flow to the directory every block; directory anchors
//! flow back with receipts. These scenarios check the vote threshold on
//! anchors, the acknowledgement counters, and what happens when directory
//! anchors are lost or replayed.

#[cfg(test)]
mod tests {
    use crate::simulator::{url, Simulator, SimulatorConfig};
    use mr_02_merkle_chain::DATA_CHAIN;
    use mr_06_block_executor::ExecutorConfig;
    use shared_types::{
        Account, DataEntry, Envelope, NetworkAccountUpdate, PartitionId, PartitionLedger, Status,
        TransactionBody, TransactionType,
    };

    fn directory_anchors(envelopes: &[Envelope]) -> Vec<Envelope> {
        envelopes
            .iter()
            .filter(|e| e.transaction.transaction_type() == TransactionType::DirectoryAnchor)
            .cloned()
            .collect()
    }

    fn from_directory(sim: &Simulator, partition: &PartitionId, node: usize) -> PartitionLedger {
        sim.node(partition, node)
            .anchor_ledger()
            .unwrap()
            .partition(&PartitionId::directory())
            .cloned()
            .unwrap_or_else(|| PartitionLedger::new(PartitionId::directory()))
    }

    // =========================================================================
    // VOTES
    // =========================================================================

    /// A directory anchor runs once two of the three directory validators
    /// have signed it; a repeated signature does not count twice.
    #[test]
    fn test_directory_anchor_needs_two_of_three() {
        let mut sim = Simulator::new(SimulatorConfig::default(), &[]);
        sim.step().unwrap();

        let bvn = sim.bvns()[0].clone();
        let inbox = sim.take_inbox(&bvn);
        let anchors = directory_anchors(&inbox);
        assert_eq!(anchors.len(), 3);
        let hash = anchors[0].transaction.hash();
        assert!(anchors.iter().all(|e| e.transaction.hash() == hash));

        let executor = sim.node_mut(&bvn, 0);
        executor.begin_block(2, 2_000).unwrap();
        assert_eq!(executor.deliver(&anchors[0]).unwrap().code, Status::Pending);
        assert_eq!(executor.deliver(&anchors[0]).unwrap().code, Status::Pending);
        assert_eq!(executor.deliver(&anchors[1]).unwrap().code, Status::Delivered);
        executor.deliver(&anchors[2]).unwrap();
        let outcome = executor.end_block().unwrap();

        assert_eq!(outcome.executed, 1);
        let ledger = from_directory(&sim, &bvn, 0);
        assert_eq!((ledger.received, ledger.executed), (1, 1));
    }

    // =========================================================================
    // ACKNOWLEDGEMENTS
    // =========================================================================

    #[test]
    fn test_partition_anchors_are_acknowledged() {
        let mut sim = Simulator::new(SimulatorConfig::default(), &[]);
        sim.run(8).unwrap();

        for bvn in sim.bvns() {
            for node in 0..3 {
                let outbound = from_directory(&sim, &bvn, node);
                assert!(outbound.is_consistent());
                assert_eq!(outbound.produced, 8);
                assert_eq!(outbound.delivered, 8);
                // Block h is acknowledged by the directory anchor applied in h + 2.
                assert_eq!(outbound.acknowledged, 6);
                assert_eq!(outbound.executed, 7);
            }
        }

        let dn = PartitionId::directory();
        let directory = sim.node(&dn, 0).anchor_ledger().unwrap();
        for bvn in sim.bvns() {
            let ledger = directory.partition(&bvn).unwrap();
            assert!(ledger.is_consistent());
            assert_eq!(ledger.received, 7);
            assert_eq!(ledger.executed, 7);
            assert!(ledger.acknowledged >= 5);
        }
        sim.assert_converged();
    }

    /// Losing every directory anchor for one partition stalls its
    /// acknowledgements without disturbing anyone else.
    #[test]
    fn test_dropped_directory_anchors_stall_acknowledgements() {
        let mut sim = Simulator::new(SimulatorConfig::default(), &[]);
        let (kept, starved) = (sim.bvns()[0].clone(), sim.bvns()[1].clone());
        let blocked = starved.clone();
        sim.set_filter(move |destination, envelope| {
            !(destination == &blocked
                && envelope.transaction.transaction_type() == TransactionType::DirectoryAnchor)
        });
        sim.run(6).unwrap();

        let healthy = from_directory(&sim, &kept, 0);
        let stalled = from_directory(&sim, &starved, 0);
        assert_eq!(healthy.acknowledged, 4);
        assert_eq!((stalled.produced, stalled.delivered, stalled.acknowledged), (6, 6, 0));
        assert_eq!(stalled.executed, 0);

        let dn = PartitionId::directory();
        let recorded = sim.node(&dn, 0).anchor_ledger().unwrap();
        assert_eq!(recorded.partition(&starved).unwrap().executed, 5);
        sim.assert_converged();
    }

    #[test]
    fn test_replayed_directory_anchors_change_nothing() {
        let mut sim = Simulator::new(SimulatorConfig::default(), &[]);
        sim.run(4).unwrap();
        let bvn = sim.bvns()[0].clone();
        let before = from_directory(&sim, &bvn, 0);

        for id in sim.network().partition_ids() {
            sim.take_inbox(&id);
        }
        let replayed: Vec<Envelope> = sim
            .history()
            .iter()
            .filter(|(destination, e)| {
                destination == &bvn && e.transaction.transaction_type() == TransactionType::DirectoryAnchor
            })
            .map(|(_, e)| e.clone())
            .take(3)
            .collect();
        assert_eq!(replayed.len(), 3);
        for envelope in replayed {
            sim.submit_to(&bvn, envelope);
        }
        let round = sim.step().unwrap();

        assert_eq!(round.outcomes[&bvn].executed, 0);
        let after = from_directory(&sim, &bvn, 0);
        assert_eq!((after.received, after.executed), (before.received, before.executed));
        assert!(after.pending.is_empty());
        sim.assert_converged();
    }

    // =========================================================================
    // MAJOR BLOCKS AND NETWORK UPDATES
    // =========================================================================

    #[test]
    fn test_major_blocks_follow_the_directory() {
        let config = SimulatorConfig {
            executor: ExecutorConfig::default().with_major_block_interval(2),
            ..SimulatorConfig::default()
        };
        let mut sim = Simulator::new(config, &[]);
        let rounds = sim.run(4).unwrap();
        let dn = PartitionId::directory();
        let bvn = sim.bvns()[0].clone();

        assert_eq!(rounds[1].outcomes[&bvn].major_block, None);
        assert_eq!(rounds[2].outcomes[&bvn].major_block, Some(1));
        assert_eq!(sim.node(&dn, 0).anchor_ledger().unwrap().major_block_index, 2);

        let ledger = sim.node(&bvn, 1).anchor_ledger().unwrap();
        assert_eq!((ledger.major_block_index, ledger.major_block_start), (1, 3));
        assert_eq!(ledger.pending_major_block, None);
    }

    #[test]
    fn test_network_updates_reach_every_partition() {
        let mut sim = Simulator::new(SimulatorConfig::default(), &[]);
        sim.submit_network_update(NetworkAccountUpdate {
            name: "globals".into(),
            body: TransactionBody::SystemWriteData {
                entry: DataEntry {
                    data: vec![b"threshold=2/3".to_vec()],
                },
            },
        });
        sim.run(2).unwrap();

        for bvn in sim.bvns() {
            let globals = bvn.url().join("globals");
            for node in 0..3 {
                let executor = sim.node(&bvn, node);
                assert!(matches!(
                    executor.account(&globals).unwrap(),
                    Some(Account::DataAccount(_))
                ));
                assert_eq!(executor.chain_height(&globals, DATA_CHAIN).unwrap(), 1);
            }
        }
        let dn = PartitionId::directory();
        assert!(sim.node(&dn, 0).account(&dn.url().join("globals")).unwrap().is_none());
        sim.assert_converged();
    }
}
