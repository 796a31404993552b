//! # Receipt Composition
//!
//! An entry is proven to its account chain's anchor, that anchor to the
//! partition root anchor, and the root anchor to the directory. Each hop
//! is a receipt; combining them must not depend on grouping.

#[cfg(test)]
mod tests {
    use crate::simulator::{identity, signed, url, user_key, Simulator, SimulatorConfig};
    use mr_01_layered_batch::Key;
    use mr_02_merkle_chain::{anchor_root_chain, MemoryChainStore, MerkleChain, MAIN_CHAIN};
    use shared_crypto::sha256;
    use shared_types::{
        DataEntry, Hash, PartitionId, Receipt, ReceiptError, TransactionBody, TransactionType,
    };

    fn h(i: u64) -> Hash {
        sha256(&i.to_be_bytes())
    }

    /// Three chains, each anchor appended into the next among unrelated
    /// entries. Returns the three hops and the final anchor.
    fn three_hops() -> (Receipt, Receipt, Receipt, Hash) {
        let mut store = MemoryChainStore::new();
        let chains: Vec<MerkleChain> = ["account", "root", "directory"]
            .iter()
            .map(|name| MerkleChain::new(Key::new("chain").push(*name), 2))
            .collect();

        let mut hops = Vec::new();
        let mut carried = h(1_000);
        for (n, chain) in chains.iter().enumerate() {
            let base = (n as u64 + 1) * 100;
            for i in 0..5 {
                chain.add(&mut store, h(base + i)).unwrap();
            }
            let index = chain.add(&mut store, carried).unwrap();
            for i in 5..9 {
                chain.add(&mut store, h(base + i)).unwrap();
            }
            let last = chain.height(&store).unwrap() - 1;
            hops.push(chain.receipt(&store, index, last).unwrap());
            carried = chain.anchor(&store).unwrap();
        }
        let c = hops.pop().unwrap();
        let b = hops.pop().unwrap();
        let a = hops.pop().unwrap();
        (a, b, c, carried)
    }

    #[test]
    fn test_combine_is_associative() {
        let (a, b, c, anchor) = three_hops();
        let left = a.combine(&b).unwrap().combine(&c).unwrap();
        let right = a.combine(&b.combine(&c).unwrap()).unwrap();

        assert_eq!(left, right);
        assert_eq!(left.start, h(1_000));
        assert_eq!(left.anchor, anchor);
        assert!(left.is_valid());
    }

    #[test]
    fn test_identity_is_neutral() {
        let (a, _, _, _) = three_hops();
        assert_eq!(Receipt::identity(a.start).combine(&a).unwrap(), a);
        assert_eq!(a.combine(&Receipt::identity(a.anchor)).unwrap(), a);
    }

    #[test]
    fn test_skipping_a_hop_is_rejected() {
        let (a, _, c, _) = three_hops();
        assert!(matches!(a.combine(&c), Err(ReceiptError::NotAdjacent { .. })));
    }

    // =========================================================================
    // THROUGH THE NETWORK
    // =========================================================================

    /// A data entry's receipt, extended by the directory's receipt for the
    /// block it landed in, ends at a directory root anchor the partition
    /// has recorded.
    #[test]
    fn test_entry_proves_to_directory_anchor() {
        let layout = Simulator::new(SimulatorConfig::default(), &[]);
        let bvn = layout.bvns()[0].clone();
        let name = layout.name_on("dora", &bvn);
        let key = user_key(31, &format!("{name}/book/1"));
        let mut sim = Simulator::new(SimulatorConfig::default(), &identity(&name, &[&key], 1, 100, 0));

        let data = url(&format!("{name}/data"));
        let envelope = signed(
            &key,
            10,
            &data,
            TransactionBody::WriteData {
                entry: DataEntry {
                    data: vec![b"proof me".to_vec()],
                },
            },
        );
        let hash = envelope.transaction.hash();
        sim.submit(envelope);
        let first = sim.step().unwrap();
        let root = first.outcomes[&bvn].root_anchor;
        sim.run(2).unwrap();

        let directory = sim
            .history()
            .iter()
            .filter(|(_, e)| e.transaction.transaction_type() == TransactionType::DirectoryAnchor)
            .find_map(|(_, e)| match &e.transaction.body {
                TransactionBody::DirectoryAnchor(anchor) => anchor
                    .receipts
                    .iter()
                    .find(|r| r.anchor.source == bvn.url() && r.anchor.root_chain_anchor == root)
                    .map(|r| r.root_chain_receipt.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(directory.start, root);

        let executor = sim.node(&bvn, 1);
        let full = executor.receipt(&data, MAIN_CHAIN, 0, Some(&directory)).unwrap();
        assert_eq!(full.start, hash);
        assert_eq!(full.anchor, directory.anchor);
        assert!(full.is_valid());

        let pool = bvn.anchor_pool_url();
        let dn_chain = anchor_root_chain(&PartitionId::directory());
        assert!(executor.chain_height_of(&pool, &dn_chain, &full.anchor).unwrap().is_some());
    }
}
