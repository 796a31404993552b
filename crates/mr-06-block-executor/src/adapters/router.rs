//! # Rendezvous Router
//!
//! Partition system authorities (`<id>.acme`) route to their own
//! partition. Every other authority goes to the block validator with the
//! highest `SHA-256(routing id || partition name)`, so adding a partition
//! only moves the accounts that now hash highest to it.

use mr_05_signature_validation::{AccountRouter, ValidationError};
use shared_crypto::sha256_concat;
use shared_types::{NetworkDefinition, PartitionId, Url};
use std::sync::Arc;

/// Routes accounts by rendezvous hashing over the block validators.
#[derive(Debug, Clone)]
pub struct RendezvousRouter {
    network: Arc<NetworkDefinition>,
}

impl RendezvousRouter {
    /// Router over `network`.
    pub fn new(network: Arc<NetworkDefinition>) -> Self {
        Self { network }
    }
}

impl AccountRouter for RendezvousRouter {
    fn route_account(&self, url: &Url) -> Result<PartitionId, ValidationError> {
        if let Some(id) = PartitionId::from_url(url) {
            if self.network.partition(&id).is_some() {
                return Ok(id);
            }
        }

        let routing_id = url.routing_id();
        self.network
            .block_validators()
            .into_iter()
            .map(|id| (sha256_concat(&[&routing_id, id.as_str().as_bytes()]), id))
            .max_by(|a, b| a.0.cmp(&b.0))
            .map(|(_, id)| id)
            .ok_or_else(|| ValidationError::Routing(format!("no block validator partition for {url}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{PartitionInfo, PartitionKind};

    fn network(bvns: &[&str]) -> Arc<NetworkDefinition> {
        let mut partitions = vec![PartitionInfo {
            id: PartitionId::directory(),
            kind: PartitionKind::Directory,
            validators: Vec::new(),
        }];
        partitions.extend(bvns.iter().map(|name| PartitionInfo {
            id: PartitionId::new(name),
            kind: PartitionKind::BlockValidator,
            validators: Vec::new(),
        }));
        Arc::new(NetworkDefinition { partitions })
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_system_authorities_route_home() {
        let router = RendezvousRouter::new(network(&["bvn0", "bvn1"]));
        assert_eq!(
            router.route_account(&url("acc://directory.acme/ledger")).unwrap(),
            PartitionId::directory()
        );
        assert_eq!(
            router.route_account(&url("acc://bvn1.acme/anchors")).unwrap(),
            PartitionId::new("bvn1")
        );
    }

    #[test]
    fn test_identity_accounts_share_a_partition() {
        let router = RendezvousRouter::new(network(&["bvn0", "bvn1", "bvn2"]));
        let home = router.route_account(&url("acc://alice")).unwrap();
        assert_eq!(router.route_account(&url("acc://alice/tokens")).unwrap(), home);
        assert_eq!(router.route_account(&url("acc://alice/book/1")).unwrap(), home);
        assert!(!home.is_directory());
    }

    #[test]
    fn test_every_block_validator_receives_accounts() {
        let router = RendezvousRouter::new(network(&["bvn0", "bvn1"]));
        let mut hits = std::collections::BTreeSet::new();
        for i in 0..64 {
            hits.insert(router.route_account(&url(&format!("acc://user{i}"))).unwrap());
        }
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_unknown_system_authority_falls_back_to_hashing() {
        let router = RendezvousRouter::new(network(&["bvn0"]));
        assert_eq!(
            router.route_account(&url("acc://bvn9.acme")).unwrap(),
            PartitionId::new("bvn0")
        );
    }

    #[test]
    fn test_no_block_validators_is_a_routing_error() {
        let router = RendezvousRouter::new(network(&[]));
        let err = router.route_account(&url("acc://alice")).unwrap_err();
        assert!(matches!(err, ValidationError::Routing(_)));
    }
}
