//! # Chain Names
//!
//! Every account owns a set of named chains.
//!
//! | Name | Type | Contents |
//! |------|------|----------|
//! | `main` | transaction | executed transactions for the account |
//! | `data` | transaction | data entry hashes |
//! | `synthetic-sequence(P)` | transaction | synthetic transactions produced for partition `P`, in sequence order |
//! | `root` | anchor | anchors of every chain touched in a block (system ledger) |
//! | `anchor(P)-root` | anchor | root anchors received from partition `P` (anchor pool) |
//! | `anchor(P)-bpt` | anchor | state roots received from partition `P` (anchor pool) |
//! | `<chain>-index` | index | index entries for `<chain>` |

use serde::{Deserialize, Serialize};
use shared_types::PartitionId;

/// Main transaction chain.
pub const MAIN_CHAIN: &str = "main";
/// Data entry chain.
pub const DATA_CHAIN: &str = "data";
/// Root anchor chain of the system ledger.
pub const ROOT_CHAIN: &str = "root";

const INDEX_SUFFIX: &str = "-index";

/// Kind of chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChainType {
    /// Transaction hashes.
    Transaction,
    /// Anchors.
    Anchor,
    /// Index entries.
    Index,
}

/// `synthetic-sequence(P)`
pub fn synthetic_sequence_chain(partition: &PartitionId) -> String {
    format!("synthetic-sequence({partition})")
}

/// `anchor(P)-root`
pub fn anchor_root_chain(partition: &PartitionId) -> String {
    format!("anchor({partition})-root")
}

/// `anchor(P)-bpt`
pub fn anchor_bpt_chain(partition: &PartitionId) -> String {
    format!("anchor({partition})-bpt")
}

/// Index chain of `chain`.
pub fn index_chain(chain: &str) -> String {
    format!("{chain}{INDEX_SUFFIX}")
}

/// True for index chain names.
pub fn is_index_chain(chain: &str) -> bool {
    chain.ends_with(INDEX_SUFFIX)
}

/// Type of a chain, by name.
pub fn chain_type(chain: &str) -> ChainType {
    if is_index_chain(chain) {
        ChainType::Index
    } else if chain == ROOT_CHAIN || chain.starts_with("anchor(") {
        ChainType::Anchor
    } else {
        ChainType::Transaction
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        let p = PartitionId::new("bvn1");
        assert_eq!(synthetic_sequence_chain(&p), "synthetic-sequence(bvn1)");
        assert_eq!(anchor_root_chain(&p), "anchor(bvn1)-root");
        assert_eq!(index_chain(MAIN_CHAIN), "main-index");
        assert_eq!(chain_type(&anchor_bpt_chain(&p)), ChainType::Anchor);
        assert_eq!(chain_type(ROOT_CHAIN), ChainType::Anchor);
        assert_eq!(chain_type("root-index"), ChainType::Index);
        assert_eq!(chain_type(&synthetic_sequence_chain(&p)), ChainType::Transaction);
    }
}
