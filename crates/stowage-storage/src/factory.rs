use std::sync::Arc;

use stowage_core::StorageConfig;

use crate::local::LocalStorage;
use crate::object::ObjectStorage;
use crate::traits::{Storage, StorageResult};

/// Create a storage backend from a scenario's storage configuration.
///
/// Exhaustive matching on the config sum type; there is no runtime dispatch
/// on backend-name strings.
pub async fn create_storage(config: &StorageConfig) -> StorageResult<Arc<dyn Storage>> {
    match config {
        StorageConfig::Filesystem {
            root_dir,
            base_url,
            shard_depth,
        } => {
            let storage = LocalStorage::new(root_dir, base_url.clone(), *shard_depth).await?;
            Ok(Arc::new(storage))
        }
        StorageConfig::ObjectStore {
            bucket,
            region,
            endpoint,
            path_prefix,
            public_base_url,
        } => {
            let storage = ObjectStorage::new(
                bucket.clone(),
                region.clone(),
                endpoint.clone(),
                path_prefix.clone(),
                public_base_url.clone(),
            )?;
            Ok(Arc::new(storage))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_filesystem_storage() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig::Filesystem {
            root_dir: dir.path().to_string_lossy().to_string(),
            base_url: "http://localhost/uploads".to_string(),
            shard_depth: 2,
        };
        let storage = create_storage(&config).await.unwrap();
        assert!(!storage.exists("missing.jpg", "a1b2c3d4").await.unwrap());
    }
}
