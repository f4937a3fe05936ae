//! Repository abstraction for file records.
//!
//! Persistence is an external collaborator: the engine only needs the
//! operations below. The in-memory implementation backs tests and small
//! deployments; production systems plug in their own ORM-backed
//! implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::models::FileRecord;

pub type RepoResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait FileRepository: Send + Sync {
    async fn insert(&self, record: FileRecord) -> RepoResult<()>;

    async fn find(&self, id: Uuid) -> RepoResult<Option<FileRecord>>;

    /// Persist the record's current state (scenario, derivative set, ...).
    async fn update(&self, record: &FileRecord) -> RepoResult<()>;

    async fn soft_delete(&self, id: Uuid, at: DateTime<Utc>) -> RepoResult<()>;

    async fn all(&self) -> RepoResult<Vec<FileRecord>>;

    /// Records with an empty derivative set, for batch regeneration tooling.
    async fn all_without_derivatives(&self) -> RepoResult<Vec<FileRecord>>;
}

/// HashMap-backed repository.
#[derive(Default, Clone)]
pub struct MemoryFileRepository {
    records: Arc<RwLock<HashMap<Uuid, FileRecord>>>,
}

impl MemoryFileRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FileRepository for MemoryFileRepository {
    async fn insert(&self, record: FileRecord) -> RepoResult<()> {
        self.records.write().await.insert(record.id, record);
        Ok(())
    }

    async fn find(&self, id: Uuid) -> RepoResult<Option<FileRecord>> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn update(&self, record: &FileRecord) -> RepoResult<()> {
        let mut records = self.records.write().await;
        if !records.contains_key(&record.id) {
            return Err(RepositoryError::NotFound(record.id));
        }
        records.insert(record.id, record.clone());
        Ok(())
    }

    async fn soft_delete(&self, id: Uuid, at: DateTime<Utc>) -> RepoResult<()> {
        let mut records = self.records.write().await;
        let record = records.get_mut(&id).ok_or(RepositoryError::NotFound(id))?;
        record.deleted_at = Some(at);
        Ok(())
    }

    async fn all(&self) -> RepoResult<Vec<FileRecord>> {
        Ok(self.records.read().await.values().cloned().collect())
    }

    async fn all_without_derivatives(&self) -> RepoResult<Vec<FileRecord>> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|record| record.derivatives.is_empty() && record.deleted_at.is_none())
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derivative::{DerivativeKey, DerivativeSet};
    use crate::transform::{FitMode, Transform};

    fn record() -> FileRecord {
        FileRecord {
            id: Uuid::new_v4(),
            scenario: None,
            hash: crate::token::hash_token(),
            name: None,
            ext: "png".to_string(),
            mime: "image/png".to_string(),
            size: 10,
            width: None,
            height: None,
            derivatives: DerivativeSet::new(),
            created_at: Utc::now(),
            deleted_at: None,
        }
    }

    #[tokio::test]
    async fn test_insert_find_update() {
        let repo = MemoryFileRepository::new();
        let mut rec = record();
        repo.insert(rec.clone()).await.unwrap();

        let transform = Transform::new(100, 100, FitMode::Crop);
        rec.derivatives
            .add(DerivativeKey::new(&transform, false, false));
        repo.update(&rec).await.unwrap();

        let found = repo.find(rec.id).await.unwrap().unwrap();
        assert_eq!(found.derivatives.len(), 1);
    }

    #[tokio::test]
    async fn test_update_missing_record_fails() {
        let repo = MemoryFileRepository::new();
        let rec = record();
        assert!(matches!(
            repo.update(&rec).await,
            Err(RepositoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_all_without_derivatives_skips_tracked_and_deleted() {
        let repo = MemoryFileRepository::new();

        let untracked = record();
        repo.insert(untracked.clone()).await.unwrap();

        let mut tracked = record();
        let transform = Transform::new(50, 50, FitMode::Auto);
        tracked
            .derivatives
            .add(DerivativeKey::new(&transform, false, false));
        repo.insert(tracked).await.unwrap();

        let deleted = record();
        repo.insert(deleted.clone()).await.unwrap();
        repo.soft_delete(deleted.id, Utc::now()).await.unwrap();

        let missing = repo.all_without_derivatives().await.unwrap();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].id, untracked.id);
    }
}
