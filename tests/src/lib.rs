//! # Meridian Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── simulator.rs      # Directory + block validators, several nodes each
//! │
//! └── integration/      # Cross-partition scenarios
//!     ├── anchoring.rs  # Anchor votes, acknowledgements, dropped anchors
//!     ├── synthetic.rs  # Deposits across partitions, sequencing
//!     ├── receipts.rs   # Receipt composition
//!     ├── snapshots.rs  # Collect, restore, background export
//!     ├── batches.rs    # Batch isolation
//!     └── delegation.rs # Delegated signing through the executor
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p mr-tests
//!
//! # By category
//! cargo test -p mr-tests integration::anchoring::
//! cargo test -p mr-tests integration::synthetic::
//!
//! # With logs
//! RUST_LOG=mr_06_block_executor=debug cargo test -p mr-tests -- --nocapture
//!
//! # Benchmarks
//! cargo bench -p mr-tests
//! ```

#![allow(unused_variables)]
#![allow(unused_imports)]
#![allow(dead_code)]

pub mod integration;
pub mod simulator;
