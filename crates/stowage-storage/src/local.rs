use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;

use crate::address;
use crate::traits::{Storage, StorageError, StorageResult};

/// Local filesystem storage implementation
///
/// Objects live in a hash-sharded tree under `root`; see the crate docs for
/// the layout contract external tooling may rely on.
#[derive(Clone)]
pub struct LocalStorage {
    root: PathBuf,
    base_url: String,
    shard_depth: u8,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `root` - Root directory for file storage (e.g., "/var/lib/stowage/uploads")
    /// * `base_url` - Base URL the root is served from (e.g., "http://localhost:3000/uploads")
    /// * `shard_depth` - Number of two-character shard segments (1-4)
    pub async fn new(
        root: impl Into<PathBuf>,
        base_url: String,
        shard_depth: u8,
    ) -> StorageResult<Self> {
        let root = root.into();

        if !(1..=4).contains(&shard_depth) {
            return Err(StorageError::ConfigError(format!(
                "invalid shard depth {shard_depth}"
            )));
        }

        fs::create_dir_all(&root).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                root.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            root,
            base_url,
            shard_depth,
        })
    }

    /// Resolve a filename to its physical path, rejecting names that could
    /// escape the storage tree.
    fn resolve(&self, filename: &str, hash: &str) -> StorageResult<PathBuf> {
        if filename.contains("..")
            || filename.contains('/')
            || filename.contains('\\')
            || hash.contains("..")
            || hash.contains('/')
        {
            return Err(StorageError::InvalidKey(
                "Storage key contains invalid characters".to_string(),
            ));
        }

        let shard = address::shard_dir(hash, self.shard_depth);
        Ok(self.root.join(shard).join(filename))
    }

    fn shard_path(&self, hash: &str) -> PathBuf {
        self.root.join(address::shard_dir(hash, self.shard_depth))
    }

    fn generate_url(&self, filename: &str, hash: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            address::shard_dir(hash, self.shard_depth),
            filename
        )
    }

    /// Ensure the shard directory exists. Concurrent creators race benignly;
    /// `create_dir_all` treats "already exists" as success.
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Every physical file under the root, as paths relative to it.
    /// Used by the orphan-reconciliation sweep.
    pub async fn all_physical_files(&self) -> StorageResult<Vec<PathBuf>> {
        let mut result = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir)
                .await
                .map_err(|e| StorageError::BackendError(e.to_string()))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| StorageError::BackendError(e.to_string()))?
            {
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| StorageError::BackendError(e.to_string()))?;
                let path = entry.path();
                if file_type.is_dir() {
                    pending.push(path);
                } else if let Ok(rel) = path.strip_prefix(&self.root) {
                    result.push(rel.to_path_buf());
                }
            }
        }

        Ok(result)
    }

    /// Delete a physical file by its root-relative path. Returns whether a
    /// file was actually removed.
    pub async fn remove_by_relative_path(&self, rel: &Path) -> StorageResult<bool> {
        if rel.is_absolute() || rel.components().any(|c| c.as_os_str() == "..") {
            return Err(StorageError::InvalidKey(
                "Relative path escapes storage root".to_string(),
            ));
        }

        let path = self.root.join(rel);
        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(false);
        }

        fs::remove_file(&path).await.map_err(|e| {
            StorageError::DeleteFailed(format!("Failed to delete file {}: {}", path.display(), e))
        })?;
        Ok(true)
    }

    /// Remove shard directories left empty after deletions.
    pub async fn remove_empty_shards(&self) -> StorageResult<()> {
        let mut dirs = Vec::new();
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir)
                .await
                .map_err(|e| StorageError::BackendError(e.to_string()))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| StorageError::BackendError(e.to_string()))?
            {
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| StorageError::BackendError(e.to_string()))?;
                if file_type.is_dir() {
                    let path = entry.path();
                    dirs.push(path.clone());
                    pending.push(path);
                }
            }
        }

        // Deepest first, so a parent emptied by child removal is caught too.
        dirs.sort_by_key(|d| std::cmp::Reverse(d.components().count()));
        for dir in dirs {
            // remove_dir fails on non-empty directories; that is the filter.
            let _ = fs::remove_dir(&dir).await;
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn exists(&self, filename: &str, hash: &str) -> StorageResult<bool> {
        let path = self.resolve(filename, hash)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    async fn upload(
        &self,
        src: &Path,
        filename: &str,
        hash: &str,
        delete_source: bool,
    ) -> StorageResult<()> {
        let path = self.resolve(filename, hash)?;
        self.ensure_parent_dir(&path).await?;

        let start = std::time::Instant::now();

        if delete_source {
            // Prefer an atomic move; fall back to copy+unlink across devices.
            if fs::rename(src, &path).await.is_err() {
                fs::copy(src, &path).await.map_err(|e| {
                    StorageError::UploadFailed(format!(
                        "Failed to copy {} to {}: {}",
                        src.display(),
                        path.display(),
                        e
                    ))
                })?;
                let _ = fs::remove_file(src).await;
            }
        } else {
            fs::copy(src, &path).await.map_err(|e| {
                StorageError::UploadFailed(format!(
                    "Failed to copy {} to {}: {}",
                    src.display(),
                    path.display(),
                    e
                ))
            })?;
        }

        tracing::info!(
            path = %path.display(),
            filename = %filename,
            hash = %hash,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload successful"
        );

        Ok(())
    }

    async fn download(&self, filename: &str, hash: &str, dest: &Path) -> StorageResult<()> {
        let path = self.resolve(filename, hash)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(filename.to_string()));
        }

        fs::copy(&path, dest).await.map_err(|e| {
            StorageError::DownloadFailed(format!(
                "Failed to copy {} to {}: {}",
                path.display(),
                dest.display(),
                e
            ))
        })?;

        Ok(())
    }

    async fn delete(&self, filename: &str, hash: &str) -> StorageResult<()> {
        let path = self.resolve(filename, hash)?;
        let start = std::time::Instant::now();

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(());
        }

        fs::remove_file(&path).await.map_err(|e| {
            StorageError::DeleteFailed(format!("Failed to delete file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            filename = %filename,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage delete successful"
        );

        Ok(())
    }

    async fn url(&self, filename: &str, hash: &str) -> StorageResult<Option<String>> {
        if !self.exists(filename, hash).await? {
            return Ok(None);
        }
        Ok(Some(self.generate_url(filename, hash)))
    }

    async fn read(&self, filename: &str, hash: &str) -> StorageResult<Option<Bytes>> {
        let path = self.resolve(filename, hash)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(None);
        }

        let data = fs::read(&path).await.map_err(|e| {
            StorageError::DownloadFailed(format!("Failed to read file {}: {}", path.display(), e))
        })?;

        Ok(Some(Bytes::from(data)))
    }

    async fn delete_derivatives(&self, hash: &str, base: &str) -> StorageResult<()> {
        let shard = self.shard_path(hash);

        if !fs::try_exists(&shard).await.unwrap_or(false) {
            return Ok(());
        }

        let derivative_prefix = format!("{base}_");
        let mut removed = 0usize;

        let mut entries = fs::read_dir(&shard)
            .await
            .map_err(|e| StorageError::BackendError(e.to_string()))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::BackendError(e.to_string()))?
        {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let stem = name.rsplit_once('.').map_or(name, |(stem, _)| stem);

            if stem != base && stem.starts_with(&derivative_prefix) {
                if fs::remove_file(entry.path()).await.is_ok() {
                    removed += 1;
                }
            }
        }

        tracing::info!(
            hash = %hash,
            base = %base,
            removed = removed,
            "Local storage derivative cleanup"
        );

        Ok(())
    }
}
