//! Adapters: in-process stand-ins for the executor's collaborators.

pub mod background;
pub mod dispatcher;
pub mod router;
pub mod snapshots;

pub use background::BackgroundQueue;
pub use dispatcher::QueueDispatcher;
pub use router::RendezvousRouter;
pub use snapshots::{FileSnapshotSink, MemorySnapshotSink};
