//! Durable state: the last-seen trade marker and the subscriber set.
//!
//! Both records are whole-value overwrites. The file backend writes to a
//! temporary sibling, fsyncs, then renames over the target, so a crash
//! leaves either the old value or the new one, never a truncated file.
//! The parent directory is fsynced after the rename.
//! A missing file reads as "absent" / "empty".

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::events::{RecipientId, TradeEvent};

/// File holding the last-seen trade.
pub const MARKER_FILE: &str = "last_trade.json";

/// File holding the subscriber list.
pub const SUBSCRIBERS_FILE: &str = "subscribers.json";

/// Errors raised by state persistence.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt state in {}: {source}", path.display())]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Persistence contract for the watcher's two records.
///
/// Implementations must be safe to call concurrently; each record is
/// guarded independently.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load_marker(&self) -> Result<Option<TradeEvent>, StoreError>;

    async fn save_marker(&self, event: &TradeEvent) -> Result<(), StoreError>;

    async fn load_subscribers(&self) -> Result<BTreeSet<RecipientId>, StoreError>;

    async fn save_subscribers(
        &self,
        subscribers: &BTreeSet<RecipientId>,
    ) -> Result<(), StoreError>;
}

/// JSON-file backend, one file per record inside `dir`.
#[derive(Debug)]
pub struct JsonFileStore {
    marker_path: PathBuf,
    subscribers_path: PathBuf,
    marker_lock: Mutex<()>,
    subscribers_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Creates a store rooted at `dir`. The directory must exist.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            marker_path: dir.join(MARKER_FILE),
            subscribers_path: dir.join(SUBSCRIBERS_FILE),
            marker_lock: Mutex::new(()),
            subscribers_lock: Mutex::new(()),
        }
    }

    pub fn marker_path(&self) -> &Path {
        &self.marker_path
    }

    pub fn subscribers_path(&self) -> &Path {
        &self.subscribers_path
    }
}

#[async_trait]
impl StateStore for JsonFileStore {
    async fn load_marker(&self) -> Result<Option<TradeEvent>, StoreError> {
        let _guard = self.marker_lock.lock().await;
        read_json(&self.marker_path).await
    }

    async fn save_marker(&self, event: &TradeEvent) -> Result<(), StoreError> {
        let _guard = self.marker_lock.lock().await;
        write_json_atomic(&self.marker_path, event).await
    }

    async fn load_subscribers(&self) -> Result<BTreeSet<RecipientId>, StoreError> {
        let _guard = self.subscribers_lock.lock().await;
        Ok(read_json(&self.subscribers_path).await?.unwrap_or_default())
    }

    async fn save_subscribers(
        &self,
        subscribers: &BTreeSet<RecipientId>,
    ) -> Result<(), StoreError> {
        let _guard = self.subscribers_lock.lock().await;
        write_json_atomic(&self.subscribers_path, subscribers).await
    }
}

/// Volatile backend with the same contract. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    marker: Mutex<Option<TradeEvent>>,
    subscribers: Mutex<BTreeSet<RecipientId>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load_marker(&self) -> Result<Option<TradeEvent>, StoreError> {
        Ok(self.marker.lock().await.clone())
    }

    async fn save_marker(&self, event: &TradeEvent) -> Result<(), StoreError> {
        *self.marker.lock().await = Some(event.clone());
        Ok(())
    }

    async fn load_subscribers(&self) -> Result<BTreeSet<RecipientId>, StoreError> {
        Ok(self.subscribers.lock().await.clone())
    }

    async fn save_subscribers(
        &self,
        subscribers: &BTreeSet<RecipientId>,
    ) -> Result<(), StoreError> {
        *self.subscribers.lock().await = subscribers.clone();
        Ok(())
    }
}

// ============ Helper Functions ============

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("[store] {} not found, treating as empty", path.display());
            return Ok(None);
        }
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| StoreError::Serialization {
            path: path.to_path_buf(),
            source,
        })
}

async fn write_json_atomic<T: serde::Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Serialization {
        path: path.to_path_buf(),
        source,
    })?;

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut file = fs::File::create(&tmp_path).await.map_err(io_err)?;
    file.write_all(&bytes).await.map_err(io_err)?;
    file.sync_all().await.map_err(io_err)?;
    drop(file);

    fs::rename(&tmp_path, path).await.map_err(io_err)?;
    sync_parent_dir(path).await.map_err(io_err)?;
    debug!("[store] Wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

/// Flushes the directory entry so a completed rename survives power loss.
async fn sync_parent_dir(path: &Path) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::File::open(parent).await?.sync_all().await
}
