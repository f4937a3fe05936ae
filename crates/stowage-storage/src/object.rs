use std::path::Path as FilePath;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::Error as ObjectStoreError;
use object_store::{ObjectStore, ObjectStoreExt, PutPayload, Result as ObjectResult};
use tokio::fs;

use crate::traits::{Storage, StorageError, StorageResult};

/// S3-compatible object storage implementation
///
/// Keys are flat under a configured prefix; derivatives are assumed publicly
/// readable and URLs are plain concatenation against `public_base_url`, never
/// signed.
#[derive(Clone)]
pub struct ObjectStorage {
    store: AmazonS3,
    bucket: String,
    path_prefix: String,
    public_base_url: String,
}

impl ObjectStorage {
    /// Create a new ObjectStorage instance
    ///
    /// # Arguments
    /// * `bucket` - Bucket name
    /// * `region` - Region (or region identifier for S3-compatible providers)
    /// * `endpoint` - Optional custom endpoint for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    /// * `path_prefix` - Key prefix all objects live under
    /// * `public_base_url` - Public base URL object links are built from
    ///
    /// Credentials come from the environment, as with the rest of the AWS
    /// tooling.
    pub fn new(
        bucket: String,
        region: String,
        endpoint: Option<String>,
        path_prefix: String,
        public_base_url: String,
    ) -> StorageResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region)
            .with_bucket_name(bucket.clone());

        if let Some(ref endpoint) = endpoint {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(ObjectStorage {
            store,
            bucket,
            path_prefix: path_prefix.trim_matches('/').to_string(),
            public_base_url,
        })
    }

    fn object_key(&self, filename: &str) -> String {
        if self.path_prefix.is_empty() {
            filename.to_string()
        } else {
            format!("{}/{}", self.path_prefix, filename)
        }
    }

    fn generate_url(&self, filename: &str) -> String {
        format!(
            "{}/{}",
            self.public_base_url.trim_end_matches('/'),
            self.object_key(filename)
        )
    }
}

#[async_trait]
impl Storage for ObjectStorage {
    async fn exists(&self, filename: &str, _hash: &str) -> StorageResult<bool> {
        let location = Path::from(self.object_key(filename));
        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    async fn upload(
        &self,
        src: &FilePath,
        filename: &str,
        _hash: &str,
        delete_source: bool,
    ) -> StorageResult<()> {
        let data = fs::read(src).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to read source {}: {}", src.display(), e))
        })?;
        let size = data.len() as u64;
        let location = Path::from(self.object_key(filename));

        let start = std::time::Instant::now();

        let result: ObjectResult<_> = self
            .store
            .put(&location, PutPayload::from(Bytes::from(data)))
            .await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %location,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Object store upload failed"
            );
            StorageError::UploadFailed(e.to_string())
        })?;

        if delete_source {
            let _ = fs::remove_file(src).await;
        }

        tracing::info!(
            bucket = %self.bucket,
            key = %location,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object store upload successful"
        );

        Ok(())
    }

    async fn download(&self, filename: &str, hash: &str, dest: &FilePath) -> StorageResult<()> {
        match self.read(filename, hash).await? {
            Some(bytes) => {
                fs::write(dest, &bytes).await.map_err(|e| {
                    StorageError::DownloadFailed(format!(
                        "Failed to write {}: {}",
                        dest.display(),
                        e
                    ))
                })?;
                Ok(())
            }
            None => Err(StorageError::NotFound(filename.to_string())),
        }
    }

    async fn delete(&self, filename: &str, _hash: &str) -> StorageResult<()> {
        let location = Path::from(self.object_key(filename));
        let start = std::time::Instant::now();

        let result: ObjectResult<_> = self.store.delete(&location).await;

        match result {
            Ok(_) | Err(ObjectStoreError::NotFound { .. }) => {}
            Err(e) => {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %location,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Object store delete failed"
                );
                return Err(StorageError::DeleteFailed(e.to_string()));
            }
        }

        tracing::info!(
            bucket = %self.bucket,
            key = %location,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object store delete successful"
        );

        Ok(())
    }

    async fn url(&self, filename: &str, _hash: &str) -> StorageResult<Option<String>> {
        Ok(Some(self.generate_url(filename)))
    }

    async fn read(&self, filename: &str, _hash: &str) -> StorageResult<Option<Bytes>> {
        let location = Path::from(self.object_key(filename));

        let result: ObjectResult<_> = self.store.get(&location).await;

        let result = match result {
            Ok(result) => result,
            Err(ObjectStoreError::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(StorageError::DownloadFailed(e.to_string())),
        };

        let bytes = result
            .bytes()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;

        Ok(Some(bytes))
    }

    async fn delete_derivatives(&self, hash: &str, base: &str) -> StorageResult<()> {
        let prefix = Path::from(self.path_prefix.clone());
        let derivative_prefix = format!("{base}_");
        let mut removed = 0usize;

        let mut listing = self.store.list(Some(&prefix));
        while let Some(meta) = listing.next().await {
            let meta = meta.map_err(|e| StorageError::BackendError(e.to_string()))?;
            let Some(name) = meta.location.filename() else {
                continue;
            };
            let stem = name.rsplit_once('.').map_or(name, |(stem, _)| stem);

            if stem != base && stem.starts_with(&derivative_prefix) {
                let result: ObjectResult<_> = self.store.delete(&meta.location).await;
                match result {
                    Ok(_) | Err(ObjectStoreError::NotFound { .. }) => removed += 1,
                    Err(e) => return Err(StorageError::DeleteFailed(e.to_string())),
                }
            }
        }

        tracing::info!(
            bucket = %self.bucket,
            hash = %hash,
            base = %base,
            removed = removed,
            "Object store derivative cleanup"
        );

        Ok(())
    }
}
