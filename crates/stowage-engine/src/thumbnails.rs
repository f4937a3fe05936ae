//! Derivative reconciliation and URL manifests.
//!
//! For every file the required key set is the union, over the scenario's
//! transforms, of the base key plus the supported 2x/WebP variants.
//! Reconciliation diffs that set against the tracked one: missing keys are
//! rendered and uploaded, stale keys (scenario changed) are deleted physically
//! and dropped from the tracker. The pass is idempotent; drift between
//! tracker and physical storage self-heals on the next run.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use serde::Serialize;
use stowage_core::{
    DerivativeKey, FileRecord, FileRepository, Scenario, ScenarioRegistry, Transform,
};
use stowage_processing::{geometry, renderer};
use stowage_storage::{address, create_storage, Storage};
use tempfile::NamedTempFile;

use crate::error::UploadError;

/// URL block for one transform alias, shaped for JSON clients.
///
/// Variant fields are absent when the transform does not support the variant
/// and `null` when it does but the derivative was skipped (hence the nested
/// options).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThumbnailUrls {
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_2x: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_webp: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_webp_2x: Option<Option<String>>,
}

impl ThumbnailUrls {
    fn original_only(url: Option<String>) -> Self {
        ThumbnailUrls {
            url,
            url_2x: None,
            url_webp: None,
            url_webp_2x: None,
        }
    }
}

/// Externally visible JSON shape enumerating a file's derivatives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DerivativeManifest {
    /// Single-thumbnail scenarios collapse to one unnamed block.
    Single(ThumbnailUrls),
    Named(BTreeMap<String, ThumbnailUrls>),
    /// No thumbnails configured; only the original is addressable.
    OriginalOnly { url: Option<String> },
}

/// Orchestrates derivative generation against storage and the tracker.
pub struct ThumbnailEngine {
    registry: Arc<ScenarioRegistry>,
    repository: Arc<dyn FileRepository>,
}

impl ThumbnailEngine {
    pub fn new(registry: Arc<ScenarioRegistry>, repository: Arc<dyn FileRepository>) -> Self {
        ThumbnailEngine {
            registry,
            repository,
        }
    }

    pub fn registry(&self) -> &ScenarioRegistry {
        &self.registry
    }

    fn scenario_of(&self, file: &FileRecord) -> Option<&Scenario> {
        self.registry.get(file.scenario.as_deref())
    }

    async fn storage_for(&self, scenario: &Scenario) -> Result<Arc<dyn Storage>, UploadError> {
        Ok(create_storage(scenario.storage()).await?)
    }

    fn original_filename(file: &FileRecord, scenario: &Scenario) -> String {
        address::file_name(
            file.filename_base(scenario.save_original_filename()),
            None,
            &file.ext,
        )
    }

    fn derivative_filename(file: &FileRecord, scenario: &Scenario, key: &DerivativeKey) -> String {
        address::file_name(
            file.filename_base(scenario.save_original_filename()),
            Some(key),
            &file.ext,
        )
    }

    /// Whether the engine should attempt raster derivatives at all.
    fn derivable(file: &FileRecord) -> bool {
        !file.is_svg() && file.mime.starts_with("image/")
    }

    /// Full required key set for a file under its scenario. 2x variants whose
    /// doubled box exceeds known source dimensions are omitted up front;
    /// unknown dimensions defer the decision to the renderer.
    fn required_keys(file: &FileRecord, scenario: &Scenario) -> BTreeMap<DerivativeKey, Transform> {
        let mut required = BTreeMap::new();

        if !Self::derivable(file) {
            return required;
        }

        let dims = file.width.zip(file.height);

        for transform in scenario.thumbnails().values() {
            let mut variants = vec![(false, false)];
            if transform.two_x {
                variants.push((true, false));
            }
            if transform.webp {
                variants.push((false, true));
                if transform.two_x {
                    variants.push((true, true));
                }
            }

            for (two_x, webp) in variants {
                if two_x {
                    if let Some(dims) = dims {
                        if geometry::plan_variant(dims, transform, true).is_none() {
                            continue;
                        }
                    }
                }
                required.insert(DerivativeKey::new(transform, two_x, webp), *transform);
            }
        }

        required
    }

    /// Bring the physical derivative set in line with the scenario's
    /// transforms. Missing keys are generated and tracked; stale keys are
    /// deleted and untracked. A second call with no intervening change does
    /// no storage writes.
    pub async fn reconcile(&self, file: &mut FileRecord) -> Result<(), UploadError> {
        let Some(scenario) = self.scenario_of(file) else {
            tracing::warn!(
                file_id = %file.id,
                scenario = file.scenario.as_deref().unwrap_or("<default>"),
                "Scenario not resolvable; skipping reconciliation"
            );
            return Ok(());
        };

        let storage = self.storage_for(scenario).await?;
        let required = Self::required_keys(file, scenario);

        let mut changed = false;

        // Prune keys the current configuration no longer wants.
        let stale: Vec<DerivativeKey> = file
            .derivatives
            .iter()
            .filter(|key| !required.contains_key(*key))
            .copied()
            .collect();
        for key in stale {
            let filename = Self::derivative_filename(file, scenario, &key);
            storage.delete(&filename, &file.hash).await?;
            file.derivatives.remove(&key);
            changed = true;
            tracing::debug!(file_id = %file.id, key = %key, "Pruned stale derivative");
        }

        // Drift check: a tracked derivative that is physically gone gets
        // regenerated, not trusted.
        let mut vanished = Vec::new();
        for key in file.derivatives.iter() {
            let filename = Self::derivative_filename(file, scenario, key);
            if !storage.exists(&filename, &file.hash).await? {
                vanished.push(*key);
            }
        }
        for key in vanished {
            file.derivatives.remove(&key);
            changed = true;
            tracing::warn!(file_id = %file.id, key = %key, "Tracked derivative missing from storage");
        }

        let missing: Vec<(DerivativeKey, Transform)> = required
            .into_iter()
            .filter(|(key, _)| !file.derivatives.contains(key))
            .collect();

        if !missing.is_empty() {
            let original = Self::original_filename(file, scenario);
            let Some(source) = storage.read(&original, &file.hash).await? else {
                tracing::warn!(
                    file_id = %file.id,
                    filename = %original,
                    "Original missing from storage; cannot generate derivatives"
                );
                if changed {
                    self.repository.update(file).await?;
                }
                return Ok(());
            };

            for (key, transform) in missing {
                let quality = transform.quality.unwrap_or(scenario.quality());
                match renderer::render_derivative(&source, &transform, key.two_x, key.webp, quality)
                {
                    Ok(Some(bytes)) => {
                        let temp = NamedTempFile::new()?;
                        tokio::fs::write(temp.path(), &bytes).await?;
                        let filename = Self::derivative_filename(file, scenario, &key);
                        storage
                            .upload(temp.path(), &filename, &file.hash, false)
                            .await?;
                        file.derivatives.add(key);
                        changed = true;
                        tracing::debug!(
                            file_id = %file.id,
                            key = %key,
                            size_bytes = bytes.len(),
                            "Generated derivative"
                        );
                    }
                    Ok(None) => {
                        tracing::debug!(file_id = %file.id, key = %key, "Derivative skipped");
                    }
                    Err(e) => {
                        // One bad derivative never fails the batch.
                        tracing::warn!(
                            file_id = %file.id,
                            key = %key,
                            error = %e,
                            "Derivative generation failed"
                        );
                    }
                }
            }
        }

        if changed {
            self.repository.update(file).await?;
        }

        Ok(())
    }

    /// Delete every derivative (tracked or straggler) and regenerate from an
    /// empty tracker. Used when the scenario changes or explicit regeneration
    /// is requested.
    pub async fn invalidate(&self, file: &mut FileRecord) -> Result<(), UploadError> {
        let Some(scenario) = self.scenario_of(file) else {
            return Ok(());
        };

        let storage = self.storage_for(scenario).await?;
        let base = file
            .filename_base(scenario.save_original_filename())
            .to_string();

        for key in file.derivatives.iter().copied().collect::<Vec<_>>() {
            let filename = Self::derivative_filename(file, scenario, &key);
            storage.delete(&filename, &file.hash).await?;
        }
        storage.delete_derivatives(&file.hash, &base).await?;

        file.derivatives.clear();
        self.repository.update(file).await?;

        self.reconcile(file).await
    }

    /// Public URL for the original (`alias` = None) or for a transform's base
    /// derivative. Degrades to `None` for unknown scenarios, unknown aliases
    /// and objects the backend reports missing.
    pub async fn url(
        &self,
        file: &FileRecord,
        alias: Option<&str>,
    ) -> Result<Option<String>, UploadError> {
        let Some(scenario) = self.scenario_of(file) else {
            return Ok(None);
        };

        let filename = match alias {
            None => Self::original_filename(file, scenario),
            Some(alias) => {
                let Some(transform) = scenario.thumbnail(alias) else {
                    return Ok(None);
                };
                let key = DerivativeKey::new(transform, false, false);
                Self::derivative_filename(file, scenario, &key)
            }
        };

        let storage = self.storage_for(scenario).await?;
        Ok(storage.url(&filename, &file.hash).await?)
    }

    async fn variant_url(
        &self,
        storage: &Arc<dyn Storage>,
        file: &FileRecord,
        scenario: &Scenario,
        transform: &Transform,
        two_x: bool,
        webp: bool,
    ) -> Result<Option<String>, UploadError> {
        let key = DerivativeKey::new(transform, two_x, webp);
        if !file.derivatives.contains(&key) {
            return Ok(None);
        }
        let filename = Self::derivative_filename(file, scenario, &key);
        Ok(storage.url(&filename, &file.hash).await?)
    }

    async fn thumbnail_urls(
        &self,
        storage: &Arc<dyn Storage>,
        file: &FileRecord,
        scenario: &Scenario,
        transform: &Transform,
    ) -> Result<ThumbnailUrls, UploadError> {
        let original_url = storage
            .url(&Self::original_filename(file, scenario), &file.hash)
            .await?;

        if file.is_svg() {
            return Ok(ThumbnailUrls::original_only(original_url));
        }

        // Base derivative falls back to the original when not generated.
        let url = match self
            .variant_url(storage, file, scenario, transform, false, false)
            .await?
        {
            Some(url) => Some(url),
            None => original_url,
        };

        let url_2x = if transform.two_x {
            Some(
                self.variant_url(storage, file, scenario, transform, true, false)
                    .await?,
            )
        } else {
            None
        };

        let (url_webp, url_webp_2x) = if transform.webp {
            let webp = Some(
                self.variant_url(storage, file, scenario, transform, false, true)
                    .await?,
            );
            let webp_2x = if transform.two_x {
                Some(
                    self.variant_url(storage, file, scenario, transform, true, true)
                        .await?,
                )
            } else {
                None
            };
            (webp, webp_2x)
        } else {
            (None, None)
        };

        Ok(ThumbnailUrls {
            url,
            url_2x,
            url_webp,
            url_webp_2x,
        })
    }

    /// Enumerate current derivative URLs for every configured transform,
    /// reconciling first when `refresh` is set so stale trackers self-heal on
    /// access.
    pub async fn manifest(
        &self,
        file: &mut FileRecord,
        refresh: bool,
    ) -> Result<DerivativeManifest, UploadError> {
        if refresh {
            self.reconcile(file).await?;
        }

        let Some(scenario) = self.scenario_of(file) else {
            return Ok(DerivativeManifest::OriginalOnly { url: None });
        };

        let storage = self.storage_for(scenario).await?;

        if !scenario.has_thumbnails() {
            let url = storage
                .url(&Self::original_filename(file, scenario), &file.hash)
                .await?;
            return Ok(DerivativeManifest::OriginalOnly { url });
        }

        let mut blocks = BTreeMap::new();
        for (alias, transform) in scenario.thumbnails() {
            let urls = self
                .thumbnail_urls(&storage, file, scenario, transform)
                .await?;
            blocks.insert(alias.clone(), urls);
        }

        if scenario.is_single_thumbnail() {
            let single = blocks
                .into_values()
                .next()
                .unwrap_or(ThumbnailUrls::original_only(None));
            return Ok(DerivativeManifest::Single(single));
        }

        Ok(DerivativeManifest::Named(blocks))
    }

    /// Whole original body, `None` when the scenario or object is gone.
    pub async fn body(&self, file: &FileRecord) -> Result<Option<Bytes>, UploadError> {
        let Some(scenario) = self.scenario_of(file) else {
            return Ok(None);
        };
        let storage = self.storage_for(scenario).await?;
        Ok(storage
            .read(&Self::original_filename(file, scenario), &file.hash)
            .await?)
    }

    /// Download the original into a self-cleaning temp file.
    pub async fn download_to_temp(
        &self,
        file: &FileRecord,
    ) -> Result<Option<NamedTempFile>, UploadError> {
        let Some(scenario) = self.scenario_of(file) else {
            return Ok(None);
        };
        let storage = self.storage_for(scenario).await?;
        let filename = Self::original_filename(file, scenario);

        if !storage.exists(&filename, &file.hash).await? {
            return Ok(None);
        }

        let temp = NamedTempFile::new()?;
        storage.download(&filename, &file.hash, temp.path()).await?;
        Ok(Some(temp))
    }

    /// Soft-delete the record and remove its physical objects unless the
    /// scenario keeps files after deletion.
    pub async fn delete(&self, file: &mut FileRecord) -> Result<(), UploadError> {
        if let Some(scenario) = self.scenario_of(file) {
            if !scenario.keep_files_on_delete() {
                let storage = self.storage_for(scenario).await?;
                let base = file
                    .filename_base(scenario.save_original_filename())
                    .to_string();
                storage.delete_derivatives(&file.hash, &base).await?;
                storage
                    .delete(&Self::original_filename(file, scenario), &file.hash)
                    .await?;
                file.derivatives.clear();
            }
        }

        let now = Utc::now();
        self.repository.soft_delete(file.id, now).await?;
        file.deleted_at = Some(now);
        Ok(())
    }
}
