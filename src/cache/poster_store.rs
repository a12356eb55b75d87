use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::error::AppResult;
use crate::models::MediaType;

/// Identity of one cached poster
///
/// Movie and TV ids share a numeric space upstream, so the media kind is part
/// of the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PosterKey {
    pub media_type: MediaType,
    pub id: u64,
}

impl PosterKey {
    pub fn new(media_type: MediaType, id: u64) -> Self {
        Self { media_type, id }
    }
}

impl Display for PosterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "posters/v1/{}/{}", self.media_type.endpoint(), self.id)
    }
}

/// Write-once byte cache for poster images
///
/// Content is immutable per key, so concurrent writers of the same key are
/// harmless. There is no eviction and no TTL.
#[async_trait]
pub trait PosterStore: Send + Sync {
    /// `Ok(None)` on a miss
    async fn get(&self, key: &PosterKey) -> AppResult<Option<Vec<u8>>>;

    /// Queues a write and returns immediately
    fn put(&self, key: &PosterKey, bytes: Vec<u8>);
}

/// Message for asynchronous cache writes
struct PosterWriteMessage {
    key: String,
    bytes: Vec<u8>,
}

/// Handle for gracefully shutting down the poster writer
pub struct PosterWriterHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: tokio::task::JoinHandle<()>,
}

impl PosterWriterHandle {
    /// Signals the writer task and waits until every queued poster is on disk
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        tracing::info!("Poster writer shutdown signal sent");
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Poster writer task panicked");
        }
    }
}

/// `cacache`-backed poster store
#[derive(Clone)]
pub struct DiskPosterStore {
    root: PathBuf,
    write_tx: mpsc::UnboundedSender<PosterWriteMessage>,
}

impl DiskPosterStore {
    /// Creates the store and spawns its background writer
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(root: impl Into<PathBuf>) -> (Self, PosterWriterHandle) {
        let root = root.into();
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let writer_root = root.clone();
        let task = tokio::spawn(async move {
            Self::poster_writer_task(writer_root, write_rx, shutdown_rx).await;
        });

        (Self { root, write_tx }, PosterWriterHandle { shutdown_tx, task })
    }

    async fn poster_writer_task(
        root: PathBuf,
        mut write_rx: mpsc::UnboundedReceiver<PosterWriteMessage>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::info!(root = %root.display(), "Poster writer task started");

        loop {
            tokio::select! {
                Some(msg) = write_rx.recv() => {
                    Self::write_to_disk(&root, msg).await;
                }
                _ = shutdown_rx.recv() => {
                    write_rx.close();
                    let mut flushed = 0usize;
                    while let Some(msg) = write_rx.recv().await {
                        Self::write_to_disk(&root, msg).await;
                        flushed += 1;
                    }
                    tracing::info!(flushed, "Poster writer task stopped");
                    break;
                }
            }
        }
    }

    async fn write_to_disk(root: &Path, msg: PosterWriteMessage) {
        match cacache::write(root, &msg.key, &msg.bytes).await {
            Ok(_) => tracing::debug!(key = %msg.key, bytes = msg.bytes.len(), "Poster cached"),
            Err(e) => tracing::error!(key = %msg.key, error = %e, "Failed to write poster cache"),
        }
    }
}

#[async_trait]
impl PosterStore for DiskPosterStore {
    async fn get(&self, key: &PosterKey) -> AppResult<Option<Vec<u8>>> {
        match cacache::read(&self.root, key.to_string()).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(cacache::Error::EntryNotFound(_, _)) => Ok(None),
            // A damaged entry is re-downloaded and overwritten
            Err(e @ (cacache::Error::IntegrityError(_) | cacache::Error::SizeMismatch(_, _))) => {
                tracing::warn!(key = %key, error = %e, "Corrupt poster cache entry, treating as miss");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, key: &PosterKey, bytes: Vec<u8>) {
        let msg = PosterWriteMessage {
            key: key.to_string(),
            bytes,
        };

        if let Err(e) = self.write_tx.send(msg) {
            tracing::error!(error = %e, "Failed to queue poster cache write");
        }
    }
}

/// Process-local poster store, used by tests and when no cache dir is wanted
#[derive(Clone, Default)]
pub struct MemoryPosterStore {
    entries: Arc<Mutex<HashMap<PosterKey, Vec<u8>>>>,
}

impl MemoryPosterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PosterStore for MemoryPosterStore {
    async fn get(&self, key: &PosterKey) -> AppResult<Option<Vec<u8>>> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| crate::error::AppError::Internal(format!("Poster store lock poisoned: {}", e)))?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &PosterKey, bytes: Vec<u8>) {
        match self.entries.lock() {
            Ok(mut entries) => {
                entries.insert(*key, bytes);
            }
            Err(e) => tracing::error!(error = %e, "Poster store lock poisoned"),
        }
    }
}
