//! Adapters.

pub mod ledger;

pub use ledger::LedgerState;
