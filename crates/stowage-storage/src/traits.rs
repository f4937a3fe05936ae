//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must
//! implement. Every operation takes the physical `filename` (produced by the
//! address scheme) together with the owning `hash`, which filesystem backends
//! need to locate the shard directory.

use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage abstraction trait
///
/// Backends are not transactional with record persistence: a crash between a
/// physical upload and the record save leaves an orphan object, recovered by
/// the out-of-band sweep rather than at write time.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Check if an object exists.
    async fn exists(&self, filename: &str, hash: &str) -> StorageResult<bool>;

    /// Store a local file under `filename`. With `delete_source` the source
    /// is moved into place (uploaded temp files); without it the source is
    /// copied (programmatically produced files).
    async fn upload(
        &self,
        src: &Path,
        filename: &str,
        hash: &str,
        delete_source: bool,
    ) -> StorageResult<()>;

    /// Copy an object to a local destination path.
    async fn download(&self, filename: &str, hash: &str, dest: &Path) -> StorageResult<()>;

    /// Remove one object. Deleting a missing object is not an error.
    async fn delete(&self, filename: &str, hash: &str) -> StorageResult<()>;

    /// Public URL for an object. `None` when the backend can tell the object
    /// does not exist; object stores return the URL unconditionally.
    async fn url(&self, filename: &str, hash: &str) -> StorageResult<Option<String>>;

    /// Full object body, `None` if absent.
    async fn read(&self, filename: &str, hash: &str) -> StorageResult<Option<Bytes>>;

    /// Remove every derivative of a file, keeping the bare original.
    ///
    /// `base` is the filename base derivatives were built from (the hash, or
    /// the kept original name without extension). Implementations scan the
    /// physical namespace rather than a tracked set, which makes this robust
    /// to tracker drift.
    async fn delete_derivatives(&self, hash: &str, base: &str) -> StorageResult<()>;
}
