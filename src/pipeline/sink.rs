//! Persistence sinks for processed-event records.
//!
//! A sink appends one serialized record per call. Writers are serialized by
//! a single lock per sink so concurrently completing tasks never interleave
//! partial records.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Destination for serialized processing results.
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    /// Append one record.
    async fn append(&self, record: &[u8]) -> io::Result<()>;
}

/// Appends records to a file, creating it on first write.
pub struct FileSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PersistenceSink for FileSink {
    async fn append(&self, record: &[u8]) -> io::Result<()> {
        let _guard = self.lock.lock().await;

        let mut options = tokio::fs::OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        options.mode(0o660);

        let mut file = options.open(&self.path).await?;
        file.write_all(record).await?;
        file.flush().await
    }
}

/// Keeps records in memory. Useful for tests and dry runs.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record appended so far, in write order.
    pub async fn records(&self) -> Vec<Vec<u8>> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl PersistenceSink for MemorySink {
    async fn append(&self, record: &[u8]) -> io::Result<()> {
        self.records.lock().await.push(record.to_vec());
        Ok(())
    }
}
