//! Dispatcher that queues envelopes until the embedder drains them.

use crate::ports::outbound::Dispatcher;
use parking_lot::Mutex;
use shared_types::{Envelope, PartitionId};
use tracing::trace;

/// Records outbound envelopes in submission order.
#[derive(Debug, Default)]
pub struct QueueDispatcher {
    queue: Mutex<Vec<(PartitionId, Envelope)>>,
}

impl QueueDispatcher {
    /// Empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take everything submitted so far.
    pub fn drain(&self) -> Vec<(PartitionId, Envelope)> {
        std::mem::take(&mut *self.queue.lock())
    }

    /// Envelopes waiting.
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// True if nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

impl Dispatcher for QueueDispatcher {
    fn submit(&self, destination: &PartitionId, envelope: Envelope) {
        trace!(
            "[mr-06] queued {} for {destination}",
            hex::encode(&envelope.transaction.hash()[..8])
        );
        self.queue.lock().push((destination.clone(), envelope));
    }
}
