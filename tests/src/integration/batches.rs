//! # Batch Isolation
//!
//! Nothing reaches the store until a root batch commits, and an aborted
//! block or a failed delivery leaves no trace in committed state.

#[cfg(test)]
mod tests {
    use crate::simulator::{identity, signed, url, user_key, Simulator, SimulatorConfig};
    use mr_01_layered_batch::{KeyValueStore, LayeredBatch, SharedKVStore};
    use mr_02_merkle_chain::DATA_CHAIN;
    use mr_06_block_executor::{Executor, QueueDispatcher};
    use shared_types::{Account, DataEntry, Status, TransactionBody};
    use std::sync::Arc;

    #[test]
    fn test_sibling_sees_commits_made_before_it_opened() {
        let store = SharedKVStore::new();
        let mut arena = LayeredBatch::new(Box::new(store.clone()));
        let root = arena.begin(true);

        let writer = arena.begin_child(root, true);
        let early = arena.begin_child(root, false);
        arena.put(writer, b"k".to_vec(), b"v".to_vec()).unwrap();
        arena.commit(writer).unwrap();
        let late = arena.begin_child(root, false);

        assert_eq!(arena.get(late, b"k").unwrap(), Some(b"v".to_vec()));
        assert_eq!(arena.get(early, b"k").unwrap(), None);
        assert!(store.is_empty());

        arena.discard(early);
        arena.discard(late);
        arena.commit(root).unwrap();
        assert_eq!(store.get(b"k").unwrap(), Some(b"v".to_vec()));
    }

    /// An executor over a shared store, so the test can look underneath it.
    fn observed(sim: &Simulator, genesis: &[Account]) -> (Executor, SharedKVStore) {
        let bvn = sim.bvns()[0].clone();
        let store = SharedKVStore::new();
        let mut executor = Executor::new(
            sim.descriptor(&bvn, 0),
            Default::default(),
            sim.network(),
            Box::new(store.clone()),
            Arc::new(QueueDispatcher::new()),
        )
        .unwrap();
        executor.bootstrap(genesis).unwrap();
        (executor, store)
    }

    #[test]
    fn test_aborted_block_leaves_store_untouched() {
        let sim = Simulator::new(SimulatorConfig::default(), &[]);
        let name = sim.name_on("grace", &sim.bvns()[0]);
        let key = user_key(52, &format!("{name}/book/1"));
        let (mut executor, store) = observed(&sim, &identity(&name, &[&key], 1, 1_000, 0));
        let before = (store.len(), executor.state_root());

        let data = url(&format!("{name}/data"));
        let envelope = signed(
            &key,
            1,
            &data,
            TransactionBody::WriteData {
                entry: DataEntry { data: vec![b"never".to_vec()] },
            },
        );
        executor.begin_block(1, 1_000).unwrap();
        assert_eq!(executor.deliver(&envelope).unwrap().code, Status::Delivered);
        executor.abort_block().unwrap();
        assert_eq!((store.len(), executor.state_root()), before);
        assert!(executor.transaction(&envelope.transaction.hash()).unwrap().is_none());

        executor.begin_block(1, 1_000).unwrap();
        assert_eq!(executor.deliver(&envelope).unwrap().code, Status::Delivered);
        executor.end_block().unwrap();
        assert!(store.len() > before.0);
        assert_ne!(executor.state_root(), before.1);
        assert_eq!(executor.chain_height(&data, DATA_CHAIN).unwrap(), 1);
    }

    /// A failing transaction in a block keeps only its failure record;
    /// its own writes are rolled back while its neighbours commit.
    #[test]
    fn test_failed_delivery_rolls_back_its_writes() {
        let layout = Simulator::new(SimulatorConfig::default(), &[]);
        let bvn = layout.bvns()[0].clone();
        let name = layout.name_on("frank", &bvn);
        let key = user_key(51, &format!("{name}/book/1"));
        let mut sim = Simulator::new(SimulatorConfig::default(), &identity(&name, &[&key], 1, 1_000, 100));

        let tokens = url(&format!("{name}/tokens"));
        let burn = |amount, timestamp| {
            signed(&key, timestamp, &tokens, TransactionBody::BurnTokens { amount })
        };
        let (good, bad) = (burn(40, 1), burn(500, 2));
        let write = signed(
            &key,
            3,
            &url(&format!("{name}/data")),
            TransactionBody::WriteData {
                entry: DataEntry { data: vec![b"after".to_vec()] },
            },
        );
        let (good_hash, bad_hash) = (good.transaction.hash(), bad.transaction.hash());
        for envelope in [good, bad, write] {
            sim.submit(envelope);
        }
        let round = sim.step().unwrap();

        assert_eq!(round.status_of(&good_hash).unwrap().code, Status::Delivered);
        let failed = round.status_of(&bad_hash).unwrap();
        assert_ne!(failed.code, Status::Delivered);
        assert!(failed.error.is_some());

        let executor = sim.node(&bvn, 0);
        let balance = executor
            .account(&tokens)
            .unwrap()
            .and_then(|a| a.token_balance().map(|(_, b)| b));
        assert_eq!(balance, Some(60));
        assert_eq!(round.outcomes[&bvn].executed, 3);
        sim.assert_converged();
    }
}
