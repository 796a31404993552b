//! Ports of the ledger database.

pub mod inbound;
