//! Maintenance sweeps: batch regeneration and orphan cleanup.
//!
//! Physical uploads are not transactional with record persistence, so
//! crashes can leave unreferenced objects behind; scenario changes leave old
//! locations populated on purpose. The orphan sweep is the out-of-band
//! reconciliation that walks a filesystem backend and removes everything no
//! live record accounts for.

use std::collections::HashSet;
use std::path::PathBuf;

use chrono::Utc;
use stowage_core::{ConfigError, FileRepository, ScenarioRegistry, StorageConfig};
use stowage_storage::{address, LocalStorage, Storage};

use crate::error::UploadError;
use crate::thumbnails::ThumbnailEngine;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    /// Physical files inspected.
    pub scanned: usize,
    /// Unreferenced files removed.
    pub removed: usize,
    /// Records soft-deleted because their original is physically gone.
    pub records_deleted: usize,
}

/// Regenerate derivatives for every live record.
///
/// With `only_untracked`, only records with an empty tracker are touched and
/// existing derivatives stay; otherwise every record is invalidated and fully
/// rebuilt. Returns the number of records processed; individual failures are
/// logged and skipped.
pub async fn regenerate_all(
    engine: &ThumbnailEngine,
    repository: &dyn FileRepository,
    only_untracked: bool,
) -> Result<usize, UploadError> {
    let records = if only_untracked {
        repository.all_without_derivatives().await?
    } else {
        repository.all().await?
    };

    let total = records.len();
    let mut processed = 0usize;

    for (index, mut record) in records.into_iter().enumerate() {
        if record.is_deleted() {
            continue;
        }

        tracing::info!(
            file_id = %record.id,
            position = index + 1,
            total = total,
            "Regenerating derivatives"
        );

        let result = if only_untracked {
            engine.reconcile(&mut record).await
        } else {
            engine.invalidate(&mut record).await
        };

        match result {
            Ok(()) => processed += 1,
            Err(e) => {
                tracing::warn!(file_id = %record.id, error = %e, "Regeneration failed");
            }
        }
    }

    Ok(processed)
}

/// Walk a filesystem-backed scenario's tree and remove every object no live
/// record references. Records whose original is physically missing are
/// soft-deleted along the way; empty shard directories are pruned at the end.
pub async fn orphan_sweep(
    registry: &ScenarioRegistry,
    scenario_name: Option<&str>,
    repository: &dyn FileRepository,
) -> Result<SweepReport, UploadError> {
    let scenario = registry.resolve(scenario_name)?;

    let StorageConfig::Filesystem {
        root_dir,
        base_url,
        shard_depth,
    } = scenario.storage()
    else {
        return Err(UploadError::Config(ConfigError::InvalidStorage(
            "orphan sweep requires a filesystem-backed scenario".to_string(),
        )));
    };
    let storage = LocalStorage::new(root_dir, base_url.clone(), *shard_depth).await?;

    let mut expected: HashSet<PathBuf> = HashSet::new();
    let mut report = SweepReport::default();

    for record in repository.all().await? {
        if record.scenario.as_deref() != scenario.name() || record.is_deleted() {
            continue;
        }

        let base = record
            .filename_base(scenario.save_original_filename())
            .to_string();
        let shard = address::shard_dir(&record.hash, *shard_depth);
        let original = address::file_name(&base, None, &record.ext);

        if !storage.exists(&original, &record.hash).await? {
            repository.soft_delete(record.id, Utc::now()).await?;
            report.records_deleted += 1;
            tracing::warn!(
                file_id = %record.id,
                filename = %original,
                "Record without physical original; soft-deleting"
            );
            continue;
        }

        expected.insert(PathBuf::from(&shard).join(&original));
        for key in record.derivatives.iter() {
            let derivative = address::file_name(&base, Some(key), &record.ext);
            expected.insert(PathBuf::from(&shard).join(derivative));
        }
    }

    for rel in storage.all_physical_files().await? {
        report.scanned += 1;
        if !expected.contains(&rel) && storage.remove_by_relative_path(&rel).await? {
            report.removed += 1;
        }
    }
    storage.remove_empty_shards().await?;

    tracing::info!(
        scenario = scenario.name().unwrap_or("<default>"),
        scanned = report.scanned,
        removed = report.removed,
        records_deleted = report.records_deleted,
        "Orphan sweep finished"
    );

    Ok(report)
}
