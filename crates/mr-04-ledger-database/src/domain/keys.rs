//! # Record Keys
//!
//! | Record | Key |
//! |--------|-----|
//! | account state | `account/<url>/main` |
//! | pending transactions | `account/<url>/pending` |
//! | directory | `account/<url>/directory` |
//! | chain list | `account/<url>/chains` |
//! | chain records | `account/<url>/chain/<name>/...` |
//! | data entry | `account/<url>/data/<entry hash>` |
//! | transaction | `transaction/<hash>/main` |
//! | status | `transaction/<hash>/status` |
//! | signatures | `transaction/<hash>/signatures` |
//! | chain index entries | `transaction/<hash>/chains` |
//! | synthetic for anchor | `synthetic-anchor/<anchor>` |
//! | directory receipt | `directory-receipt/<partition root anchor>` |
//! | state trie leaf | `bpt/<account id>` |

use mr_01_layered_batch::Key;
use shared_types::{Hash, Url};

/// Account record root.
pub const ACCOUNT: &str = "account";
/// Transaction record root.
pub const TRANSACTION: &str = "transaction";
/// Synthetic-for-anchor root.
pub const SYNTHETIC_ANCHOR: &str = "synthetic-anchor";
/// Directory receipts by the partition anchor they start from.
pub const DIRECTORY_RECEIPT: &str = "directory-receipt";
/// State trie leaves.
pub const BPT: &str = "bpt";

/// Every record of an account.
pub fn account(url: &Url) -> Key {
    Key::new(ACCOUNT).push(url)
}

/// Account state.
pub fn account_main(url: &Url) -> Key {
    account(url).push("main")
}

/// Pending transactions of an account.
pub fn account_pending(url: &Url) -> Key {
    account(url).push("pending")
}

/// Directory of an identity.
pub fn account_directory(url: &Url) -> Key {
    account(url).push("directory")
}

/// Chain metadata of an account.
pub fn account_chains(url: &Url) -> Key {
    account(url).push("chains")
}

/// Records of one chain.
pub fn chain(url: &Url, name: &str) -> Key {
    account(url).push("chain").push(name)
}

/// Data entries of an account.
pub fn data_entries(url: &Url) -> Key {
    account(url).push("data")
}

/// One data entry.
pub fn data_entry(url: &Url, hash: &Hash) -> Key {
    data_entries(url).push(hash)
}

/// Every record of a transaction.
pub fn transaction(hash: &Hash) -> Key {
    Key::new(TRANSACTION).push(hash)
}

/// Transaction body.
pub fn transaction_main(hash: &Hash) -> Key {
    transaction(hash).push("main")
}

/// Transaction status.
pub fn transaction_status(hash: &Hash) -> Key {
    transaction(hash).push("status")
}

/// Signatures received for a transaction.
pub fn transaction_signatures(hash: &Hash) -> Key {
    transaction(hash).push("signatures")
}

/// Chains a transaction was recorded on.
pub fn transaction_chains(hash: &Hash) -> Key {
    transaction(hash).push("chains")
}

/// Synthetic transactions waiting on a root anchor.
pub fn synthetic_for_anchor(anchor: &Hash) -> Key {
    Key::new(SYNTHETIC_ANCHOR).push(anchor)
}

/// Directory receipt for a partition root anchor.
pub fn directory_receipt(anchor: &Hash) -> Key {
    Key::new(DIRECTORY_RECEIPT).push(anchor)
}

/// State trie leaf.
pub fn bpt_leaf(account_id: &Hash) -> Key {
    Key::new(BPT).push(account_id)
}
