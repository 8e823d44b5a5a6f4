/// Attachment blob storage
///
/// Comment attachments are written through an [`AttachmentStore`] before the
/// comment transaction starts. If the transaction later fails, the caller
/// removes what it stored with [`discard`], so no blob outlives a rolled-back
/// comment and no attachment row points at a missing blob.
///
/// Keys have the shape `<task_id>/<uuid>-<sanitized file name>`.
///
/// # Example
///
/// ```no_run
/// use bytes::Bytes;
/// use teamboard_shared::storage::{attachment_key, AttachmentStore, LocalAttachmentStore};
/// use uuid::Uuid;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = LocalAttachmentStore::new("./uploads", "/uploads");
/// let key = attachment_key(Uuid::new_v4(), "Q3 report.pdf");
/// let object = store.put(&key, "Q3 report.pdf", Bytes::from_static(b"%PDF")).await?;
/// assert!(object.url.starts_with("/uploads/"));
/// # Ok(())
/// # }
/// ```

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

/// Longest kept file name, in characters
const MAX_FILE_NAME_CHARS: usize = 120;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A blob that has been written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub key: String,

    /// Public URL the blob is served from
    pub url: String,

    /// Name the uploader gave the file
    pub file_name: String,

    pub size: u64,
}

#[async_trait]
pub trait AttachmentStore: Send + Sync {
    /// Writes `bytes` under `key`, replacing any existing blob
    async fn put(&self, key: &str, file_name: &str, bytes: Bytes) -> Result<StoredObject, StorageError>;

    /// Deletes the blob; a missing blob is not an error
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Removes stored blobs, logging instead of failing
pub async fn discard(store: &dyn AttachmentStore, keys: &[String]) {
    for key in keys {
        if let Err(e) = store.remove(key).await {
            warn!(key = %key, error = %e, "Failed to remove attachment");
        }
    }
}

/// Reduces a client-supplied file name to a safe single path segment
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_FILE_NAME_CHARS)
        .collect();

    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Storage key for a new attachment on a task
pub fn attachment_key(task_id: Uuid, file_name: &str) -> String {
    format!("{}/{}-{}", task_id, Uuid::new_v4(), sanitize_file_name(file_name))
}

/// Stores blobs on the local filesystem under `root`
#[derive(Debug, Clone)]
pub struct LocalAttachmentStore {
    root: PathBuf,
    base_url: String,
}

impl LocalAttachmentStore {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Resolves a key to a path inside `root`
    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let safe = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));

        if !safe {
            return Err(StorageError::InvalidKey(key.to_string()));
        }

        Ok(self.root.join(relative))
    }

    pub fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }
}

#[async_trait]
impl AttachmentStore for LocalAttachmentStore {
    async fn put(&self, key: &str, file_name: &str, bytes: Bytes) -> Result<StoredObject, StorageError> {
        let path = self.path_for(key)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &bytes).await?;

        debug!(key = %key, size = bytes.len(), "Stored attachment");

        Ok(StoredObject {
            key: key.to_string(),
            url: self.url_for(key),
            file_name: file_name.to_string(),
            size: bytes.len() as u64,
        })
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
