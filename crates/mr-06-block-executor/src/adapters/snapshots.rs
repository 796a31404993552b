//! Snapshot sinks: a directory of files, or memory.

use crate::domain::errors::ExecutorError;
use crate::ports::outbound::SnapshotSink;
use parking_lot::Mutex;
use shared_types::PartitionId;
use std::path::{Path, PathBuf};

/// Writes `<partition>-<height>.snapshot` files into a directory.
#[derive(Debug, Clone)]
pub struct FileSnapshotSink {
    dir: PathBuf,
}

impl FileSnapshotSink {
    /// Sink writing into `dir`, which must exist.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the snapshot of `partition` at `height`.
    pub fn path(&self, partition: &PartitionId, height: u64) -> PathBuf {
        self.dir.join(format!("{partition}-{height}.snapshot"))
    }

    /// Directory written to.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl SnapshotSink for FileSnapshotSink {
    fn export(&self, partition: &PartitionId, height: u64, bytes: &[u8]) -> Result<(), ExecutorError> {
        let path = self.path(partition, height);
        std::fs::write(&path, bytes).map_err(|e| ExecutorError::Export(format!("{}: {e}", path.display())))
    }
}

/// Keeps snapshots in memory.
#[derive(Debug, Default)]
pub struct MemorySnapshotSink {
    snapshots: Mutex<Vec<(PartitionId, u64, Vec<u8>)>>,
}

impl MemorySnapshotSink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every snapshot received, in order.
    pub fn snapshots(&self) -> Vec<(PartitionId, u64, Vec<u8>)> {
        self.snapshots.lock().clone()
    }

    /// Most recent snapshot bytes.
    pub fn latest(&self) -> Option<Vec<u8>> {
        self.snapshots.lock().last().map(|s| s.2.clone())
    }
}

impl SnapshotSink for MemorySnapshotSink {
    fn export(&self, partition: &PartitionId, height: u64, bytes: &[u8]) -> Result<(), ExecutorError> {
        self.snapshots
            .lock()
            .push((partition.clone(), height, bytes.to_vec()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_sink_writes_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSnapshotSink::new(dir.path());
        let partition = PartitionId::new("bvn0");
        sink.export(&partition, 12, b"snap").unwrap();
        assert_eq!(std::fs::read(sink.path(&partition, 12)).unwrap(), b"snap");
    }

    #[test]
    fn test_file_sink_missing_dir_is_export_error() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSnapshotSink::new(dir.path().join("missing"));
        let err = sink.export(&PartitionId::new("bvn0"), 1, b"x").unwrap_err();
        assert!(matches!(err, ExecutorError::Export(_)));
    }
}
