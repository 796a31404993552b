//! # Synthetic Transaction Scenarios
//!
//! A transaction on one partition produces synthetic transactions for
//! another. They are proven to the producer's root anchor, wait for the
//! directory to anchor that root, and then run on the destination in
//! sequence order.

#[cfg(test)]
mod tests {
    use crate::simulator::{identity, signed, url, user_key, Simulator, SimulatorConfig};
    use mr_02_merkle_chain::{synthetic_sequence_chain, MAIN_CHAIN};
    use mr_05_signature_validation::SigningKey;
    use mr_06_block_executor::Executor;
    use shared_crypto::sha256;
    use shared_types::{
        acme_url, lite_token_address, Account, Envelope, PartitionId, PartitionLedger, Status,
        TokenAmount, TokenRecipient, TransactionBody, Url,
    };

    struct Pair {
        sim: Simulator,
        alice: String,
        bob: String,
        alice_key: SigningKey,
        home: PartitionId,
        away: PartitionId,
    }

    /// Alice holds 1000 ACME on one partition, Bob an empty account on
    /// the other.
    fn pair() -> Pair {
        let layout = Simulator::new(SimulatorConfig::default(), &[]);
        let (home, away) = (layout.bvns()[0].clone(), layout.bvns()[1].clone());
        let alice = layout.name_on("alice", &home);
        let bob = layout.name_on("bob", &away);

        let alice_key = user_key(7, &format!("{alice}/book/1"));
        let bob_key = user_key(8, &format!("{bob}/book/1"));
        let mut genesis = identity(&alice, &[&alice_key], 1, 1_000, 1_000);
        genesis.extend(identity(&bob, &[&bob_key], 1, 1_000, 0));
        Pair {
            sim: Simulator::new(SimulatorConfig::default(), &genesis),
            alice,
            bob,
            alice_key,
            home,
            away,
        }
    }

    fn send(pair: &Pair, timestamp: u64, to: Vec<(Url, TokenAmount)>) -> Envelope {
        signed(
            &pair.alice_key,
            timestamp,
            &url(&format!("{}/tokens", pair.alice)),
            TransactionBody::SendTokens {
                to: to
                    .into_iter()
                    .map(|(url, amount)| TokenRecipient { url, amount })
                    .collect(),
            },
        )
    }

    fn balance(executor: &Executor, account: &str) -> TokenAmount {
        executor
            .account(&url(account))
            .unwrap()
            .and_then(|a| a.token_balance().map(|(_, b)| b))
            .unwrap()
    }

    fn credits(executor: &Executor, page: &str) -> u64 {
        match executor.account(&url(page)).unwrap() {
            Some(Account::KeyPage(page)) => page.credit_balance,
            other => panic!("not a key page: {other:?}"),
        }
    }

    fn toward(executor: &Executor, partition: &PartitionId) -> PartitionLedger {
        executor
            .synthetic_ledger()
            .unwrap()
            .partition(partition)
            .cloned()
            .unwrap_or_else(|| PartitionLedger::new(partition.clone()))
    }

    // =========================================================================
    // DEPOSITS
    // =========================================================================

    #[test]
    fn test_tokens_cross_partitions() {
        let mut pair = pair();
        let envelope = send(&pair, 10, vec![(url(&format!("{}/tokens", pair.bob)), 250)]);
        assert_eq!(pair.sim.submit(envelope), pair.home);

        let first = pair.sim.step().unwrap();
        assert_eq!(first.outcomes[&pair.home].produced, 1);
        pair.sim.run(7).unwrap();

        let (home, away) = (pair.home.clone(), pair.away.clone());
        for node in 0..3 {
            let sender = pair.sim.node(&home, node);
            assert_eq!(balance(sender, &format!("{}/tokens", pair.alice)), 750);
            assert_eq!(credits(sender, &format!("{}/book/1", pair.alice)), 997);
            let outbound = toward(sender, &away);
            assert_eq!((outbound.produced, outbound.delivered, outbound.acknowledged), (1, 1, 1));

            let receiver = pair.sim.node(&away, node);
            assert_eq!(balance(receiver, &format!("{}/tokens", pair.bob)), 250);
            let inbound = toward(receiver, &home);
            assert_eq!((inbound.received, inbound.executed), (1, 1));
            assert!(inbound.pending.is_empty());
        }
        pair.sim.assert_converged();
    }

    /// The receiving partition holds a deposit until the directory anchors
    /// the sender's root, then runs it in the block that applies that
    /// directory anchor.
    #[test]
    fn test_deposit_runs_in_the_block_that_anchors_its_root() {
        let mut pair = pair();
        let envelope = send(&pair, 10, vec![(url(&format!("{}/tokens", pair.bob)), 250)]);
        let cause = envelope.transaction.hash();
        pair.sim.submit(envelope);
        let (home, away) = (pair.home.clone(), pair.away.clone());

        let first = pair.sim.step().unwrap();
        let root = first.outcomes[&home].root_anchor;
        let produced = pair.sim.node(&home, 0).transaction(&cause).unwrap().unwrap().status.produced;
        assert_eq!(produced.len(), 1);
        let deposit = produced[0];

        let second = pair.sim.step().unwrap();
        assert_eq!(second.status_of(&deposit).unwrap().code, Status::Pending);
        let held = pair.sim.node(&away, 0).transaction(&deposit).unwrap().unwrap();
        assert_eq!(held.status.code, Status::Pending);
        assert!(held.status.proof.is_some());

        let mut inbox = pair.sim.take_inbox(&away);
        inbox.sort_by_key(|e| !e.transaction.transaction_type().is_anchor());
        let carries_root = inbox.iter().any(|e| match &e.transaction.body {
            TransactionBody::DirectoryAnchor(anchor) => anchor
                .receipts
                .iter()
                .any(|r| r.root_chain_receipt.start == root),
            _ => false,
        });
        assert!(carries_root);

        let height = pair.sim.next_height();
        let executor = pair.sim.node_mut(&away, 0);
        executor.begin_block(height, height * 1_000).unwrap();
        executor.deliver_all(&inbox).unwrap();
        let outcome = executor.end_block().unwrap();

        let ran = executor.transaction(&deposit).unwrap().unwrap().status;
        assert_eq!(ran.code, Status::Delivered);
        assert_eq!(ran.sequence_number, 1);
        assert!(outcome.executed >= 2);
        assert_eq!(balance(executor, &format!("{}/tokens", pair.bob)), 250);
    }

    /// Several deposits from one transaction take consecutive sequence
    /// numbers that match their position on the sequence chain.
    #[test]
    fn test_sequence_numbers_are_gapless() {
        let mut pair = pair();
        let bob_tokens = format!("{}/tokens", pair.bob);
        let envelope = send(
            &pair,
            10,
            vec![(url(&bob_tokens), 10), (url(&bob_tokens), 20), (url(&bob_tokens), 30)],
        );
        let cause = envelope.transaction.hash();
        pair.sim.submit(envelope);
        pair.sim.run(6).unwrap();

        let (home, away) = (pair.home.clone(), pair.away.clone());
        let sender = pair.sim.node(&home, 0);
        let produced = sender.transaction(&cause).unwrap().unwrap().status.produced;
        assert_eq!(produced.len(), 3);

        let synthetic = home.synthetic_url();
        let chain = synthetic_sequence_chain(&away);
        assert_eq!(sender.chain_height(&synthetic, &chain).unwrap(), 3);
        for index in 0..3u64 {
            let hash = sender.chain_entry(&synthetic, &chain, index).unwrap();
            assert!(produced.contains(&hash));
            let local = sender.transaction(&hash).unwrap().unwrap().status;
            assert_eq!(local.sequence_number, index + 1);
            assert_eq!(local.code, Status::Remote);

            let remote = pair.sim.node(&away, 2).transaction(&hash).unwrap().unwrap().status;
            assert_eq!(remote.code, Status::Delivered);
            assert_eq!(remote.sequence_number, index + 1);
        }
        assert_eq!(balance(pair.sim.node(&away, 1), &bob_tokens), 60);
        assert_eq!(sender.chain_height(&synthetic, MAIN_CHAIN).unwrap(), 3);
    }

    #[test]
    fn test_first_deposit_opens_lite_account() {
        let mut pair = pair();
        let key_hash = sha256(b"lite owner");
        let lite = lite_token_address(&key_hash, &acme_url());
        let destination = pair.sim.route(&lite);
        let envelope = send(&pair, 10, vec![(lite.clone(), 40)]);
        pair.sim.submit(envelope);
        pair.sim.run(6).unwrap();

        let executor = pair.sim.node(&destination, 0);
        match executor.account(&lite).unwrap() {
            Some(Account::LiteTokenAccount(account)) => {
                assert_eq!(account.balance, 40);
                assert_eq!(account.token_url, acme_url());
            }
            other => panic!("expected a lite token account, got {other:?}"),
        }
        assert!(matches!(
            executor.account(&lite.root_identity()).unwrap(),
            Some(Account::LiteIdentity(_))
        ));
        pair.sim.assert_converged();
    }

    /// A deposit to an account that does not exist fails on arrival and
    /// sends the tokens and the fee back.
    #[test]
    fn test_failed_deposit_is_refunded() {
        let mut pair = pair();
        let missing = format!("{}/missing", pair.bob);
        let envelope = send(&pair, 10, vec![(url(&missing), 300)]);
        pair.sim.submit(envelope);

        pair.sim.run(3).unwrap();
        let alice_tokens = format!("{}/tokens", pair.alice);
        assert_eq!(balance(pair.sim.node(&pair.home, 0), &alice_tokens), 700);

        pair.sim.run(7).unwrap();
        let (home, away) = (pair.home.clone(), pair.away.clone());
        for node in 0..3 {
            let sender = pair.sim.node(&home, node);
            assert_eq!(balance(sender, &alice_tokens), 1_000);
            assert_eq!(credits(sender, &format!("{}/book/1", pair.alice)), 1_000);
            assert_eq!(toward(sender, &away).executed, 2);
            assert!(pair.sim.node(&away, node).account(&url(&missing)).unwrap().is_none());
        }
        assert_eq!(toward(pair.sim.node(&away, 0), &home).produced, 2);
        pair.sim.assert_converged();
    }
}
