//! # Delegated Signing
//!
//! A key page entry may delegate to another key book. A signature can pass
//! through at most five delegating pages before it reaches the page that
//! authorizes the principal.

#[cfg(test)]
mod tests {
    use crate::simulator::{identity, url, user_key, Simulator, SimulatorConfig};
    use mr_02_merkle_chain::DATA_CHAIN;
    use mr_05_signature_validation::{AccountRouter, SigningKey, ValidationError, MAX_DELEGATION_DEPTH};
    use mr_06_block_executor::Executor;
    use shared_types::{
        Account, DataEntry, Envelope, KeyEntry, KeyPage, PartitionId, Status, Transaction,
        TransactionBody, Url,
    };
    use std::sync::Arc;

    /// Keeps every user account on one partition.
    struct SinglePartition(PartitionId);

    impl AccountRouter for SinglePartition {
        fn route_account(&self, url: &Url) -> Result<PartitionId, ValidationError> {
            Ok(PartitionId::from_url(url).unwrap_or_else(|| self.0.clone()))
        }
    }

    /// `acc://d0` holds the key; each `acc://d<i>` delegates to `d<i-1>`.
    /// Returns the genesis and the delegators, innermost first.
    fn delegation_chain(layers: usize, key: &SigningKey) -> (Vec<Account>, Vec<Url>) {
        let mut genesis = identity("acc://d0", &[key], 1, 1_000, 0);
        let mut delegators = Vec::new();
        for i in 1..=layers {
            let name = format!("acc://d{i}");
            let mut accounts = identity(&name, &[], 1, 1_000, 0);
            for account in &mut accounts {
                if let Account::KeyPage(KeyPage { keys, .. }) = account {
                    *keys = vec![KeyEntry::delegate(url(&format!("acc://d{}/book", i - 1)))];
                }
            }
            genesis.extend(accounts);
            delegators.push(url(&name).join("book").join("1"));
        }
        (genesis, delegators)
    }

    fn executor(genesis: &[Account]) -> Executor {
        let sim = Simulator::new(SimulatorConfig::default(), &[]);
        let bvn = sim.bvns()[0].clone();
        let (executor, _) = sim.fresh_node(&bvn, 0);
        let mut executor = executor.with_router(Arc::new(SinglePartition(bvn)));
        executor.bootstrap(genesis).unwrap();
        executor
    }

    fn delegated_write(key: &SigningKey, delegators: &[Url], principal: &Url) -> Envelope {
        let unsigned = key.unsigned(10, delegators);
        let txn = Transaction::new(
            principal.clone(),
            unsigned.metadata_hash(),
            TransactionBody::WriteData {
                entry: DataEntry {
                    data: vec![b"delegated".to_vec()],
                },
            },
        );
        let signature = key.complete(unsigned, &txn.hash());
        Envelope::new(txn, vec![signature])
    }

    #[test]
    fn test_five_layers_execute() {
        let key = user_key(40, "acc://d0/book/1");
        let (genesis, delegators) = delegation_chain(MAX_DELEGATION_DEPTH, &key);
        let mut executor = executor(&genesis);
        let principal = url("acc://d5/data");

        executor.begin_block(1, 1_000).unwrap();
        let status = executor.deliver(&delegated_write(&key, &delegators, &principal)).unwrap();
        assert_eq!(status.code, Status::Delivered);
        executor.end_block().unwrap();
        assert_eq!(executor.chain_height(&principal, DATA_CHAIN).unwrap(), 1);
    }

    #[test]
    fn test_sixth_layer_is_rejected() {
        let key = user_key(40, "acc://d0/book/1");
        let (genesis, delegators) = delegation_chain(MAX_DELEGATION_DEPTH + 1, &key);
        let mut executor = executor(&genesis);
        let principal = url("acc://d6/data");
        let envelope = delegated_write(&key, &delegators, &principal);

        executor.begin_block(1, 1_000).unwrap();
        let status = executor.deliver(&envelope).unwrap();
        assert_eq!(status.code, Status::BadRequest);
        executor.end_block().unwrap();
        assert_eq!(executor.chain_height(&principal, DATA_CHAIN).unwrap(), 0);
        assert!(executor.transaction(&envelope.transaction.hash()).unwrap().is_none());
    }
}
