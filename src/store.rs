//! Snapshot persistence collaborators.
//!
//! The relay treats persistence as an opaque string-keyed store: it hands
//! over an already-encoded snapshot and reads it back verbatim. Absence of a
//! key is a normal first-run state, not an error.

use async_trait::async_trait;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

pub const MAX_KEY_LENGTH: usize = 128;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: &'static str },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// String-keyed durable store for encoded snapshots.
///
/// `save` must overwrite atomically: a concurrent or crashing reader sees
/// either the prior value or the new one, never a partial write. `load`
/// returns `Ok(None)` when the key has never been saved.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn save(&self, key: &str, value: &str) -> Result<(), StoreError>;
    async fn load(&self, key: &str) -> Result<Option<String>, StoreError>;
}

fn validate_key(key: &str) -> Result<(), StoreError> {
    if key.is_empty() {
        return Err(StoreError::InvalidKey {
            key: key.to_string(),
            reason: "key cannot be empty",
        });
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(StoreError::InvalidKey {
            key: key.chars().take(32).collect(),
            reason: "key exceeds maximum length",
        });
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(StoreError::InvalidKey {
            key: key.to_string(),
            reason: "key contains invalid characters (allowed: a-z, A-Z, 0-9, -, _)",
        });
    }
    Ok(())
}

/// In-memory store for tests and ephemeral setups.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
        validate_key(key)?;
        self.values
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        validate_key(key)?;
        Ok(self.values.read().await.get(key).cloned())
    }
}

/// One file per key under a root directory.
///
/// Writes go to a sibling temp file, are fsynced, then renamed over the
/// target, so a crash mid-save leaves the previous snapshot intact.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }
}

#[async_trait]
impl SnapshotStore for FileStore {
    async fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
        validate_key(key)?;
        tokio::fs::create_dir_all(&self.root).await?;

        let path = self.path_for(key);
        let tmp_path = path.with_extension("tmp");

        let mut file = tokio::fs::File::create(&tmp_path).await?;
        file.write_all(value.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp_path, &path).await?;
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        validate_key(key)?;
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
