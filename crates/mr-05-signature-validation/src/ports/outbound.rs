//! # Outbound Ports
//!
//! What the validator needs from the rest of the node.

use crate::domain::errors::ValidationError;
use shared_types::{Account, Hash, PartitionId, Url};

/// Read access to the state being validated against.
pub trait ValidationState {
    /// Load an account, if it exists on this partition.
    fn load_account(&self, url: &Url) -> Result<Option<Account>, ValidationError>;

    /// True if `anchor` is a directory root anchor recorded on this
    /// partition.
    fn is_directory_anchor(&self, anchor: &Hash) -> Result<bool, ValidationError>;
}

/// Maps accounts to the partition that owns them.
pub trait AccountRouter: Send + Sync {
    /// Partition owning `url`.
    fn route_account(&self, url: &Url) -> Result<PartitionId, ValidationError>;
}
