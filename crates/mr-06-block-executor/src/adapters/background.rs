//! # Background Queue
//!
//! Deferred work that does not touch ledger state. The executor collects
//! snapshot bytes synchronously and hands them to this queue, so a slow
//! export never holds up the next block.

use crate::ports::outbound::SnapshotSink;
use shared_types::PartitionId;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

enum Job {
    Export {
        partition: PartitionId,
        height: u64,
        bytes: Vec<u8>,
    },
}

/// Tokio task fed by an unbounded channel.
pub struct BackgroundQueue {
    tx: mpsc::UnboundedSender<Job>,
    handle: JoinHandle<usize>,
}

impl BackgroundQueue {
    /// Start the worker on the current tokio runtime.
    pub fn spawn(sink: Arc<dyn SnapshotSink>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let handle = tokio::spawn(async move {
            let mut exported = 0usize;
            while let Some(job) = rx.recv().await {
                match job {
                    Job::Export {
                        partition,
                        height,
                        bytes,
                    } => match sink.export(&partition, height, &bytes) {
                        Ok(()) => {
                            exported += 1;
                            info!("[mr-06] exported snapshot of {partition} at {height} ({} bytes)", bytes.len());
                        }
                        Err(e) => warn!("[mr-06] snapshot export of {partition} at {height} failed: {e}"),
                    },
                }
            }
            debug!("[mr-06] background queue stopped after {exported} exports");
            exported
        });
        Self { tx, handle }
    }

    /// Queue a snapshot export. Returns false if the worker has stopped.
    pub fn export_snapshot(&self, partition: PartitionId, height: u64, bytes: Vec<u8>) -> bool {
        self.tx
            .send(Job::Export {
                partition,
                height,
                bytes,
            })
            .is_ok()
    }

    /// Close the queue, wait for queued jobs, and return the number of
    /// successful exports.
    pub async fn shutdown(self) -> usize {
        drop(self.tx);
        match self.handle.await {
            Ok(exported) => exported,
            Err(e) => {
                warn!("[mr-06] background queue worker failed: {e}");
                0
            }
        }
    }
}

impl std::fmt::Debug for BackgroundQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundQueue")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}
