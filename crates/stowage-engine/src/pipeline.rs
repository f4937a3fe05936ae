//! Upload pipeline: resolve scenario, validate, normalize, store, record.

use std::path::Path;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::Utc;
use stowage_core::{
    hash_token, DerivativeSet, FileRecord, FileRepository, Scenario, ScenarioRegistry,
};
use stowage_processing::{probe, renderer, svg, FileValidator};
use stowage_storage::{address, create_storage, Storage};
use tempfile::NamedTempFile;
use uuid::Uuid;

use crate::error::UploadError;
use crate::fetch::{self, FetchOptions};
use crate::queue::DerivativeDispatcher;
use crate::thumbnails::ThumbnailEngine;

/// Retry ceiling for the `name(N).ext` collision probe; beyond this the
/// upload fails fast instead of looping on a pathological directory.
const MAX_NAME_PROBES: u32 = 10_000;

/// URL-derived extensions longer than this are treated as noise.
const MAX_URL_EXT_LEN: usize = 4;

/// When derivatives are generated relative to the upload itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenerationMode {
    /// Generate before returning.
    #[default]
    Inline,
    /// Hand off to the configured dispatcher; falls back to inline when none
    /// is configured.
    Deferred,
    /// Leave generation to a later reconcile (e.g. first manifest access).
    Skip,
}

/// Accepts files from paths, raw bytes, base64 payloads and URLs, runs the
/// scenario's checks and persists original plus record.
pub struct UploadService {
    registry: Arc<ScenarioRegistry>,
    repository: Arc<dyn FileRepository>,
    engine: Arc<ThumbnailEngine>,
    dispatcher: Option<Arc<dyn DerivativeDispatcher>>,
}

impl UploadService {
    pub fn new(registry: Arc<ScenarioRegistry>, repository: Arc<dyn FileRepository>) -> Self {
        let engine = Arc::new(ThumbnailEngine::new(registry.clone(), repository.clone()));
        UploadService {
            registry,
            repository,
            engine,
            dispatcher: None,
        }
    }

    /// Route deferred generation through an external queue.
    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn DerivativeDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn engine(&self) -> &Arc<ThumbnailEngine> {
        &self.engine
    }

    /// Upload a file already on the local filesystem.
    pub async fn upload_from_path(
        &self,
        path: &Path,
        filename: Option<&str>,
        scenario: Option<&str>,
        mode: GenerationMode,
    ) -> Result<FileRecord, UploadError> {
        let data = tokio::fs::read(path).await?;
        let filename = match filename {
            Some(name) => Some(name.to_string()),
            None => path
                .file_name()
                .and_then(|n| n.to_str())
                .map(str::to_string),
        };
        self.create_file(data, filename, scenario, mode).await
    }

    /// Upload raw bytes under a claimed filename.
    pub async fn upload_from_bytes(
        &self,
        data: Vec<u8>,
        filename: Option<&str>,
        scenario: Option<&str>,
        mode: GenerationMode,
    ) -> Result<FileRecord, UploadError> {
        self.create_file(data, filename.map(str::to_string), scenario, mode)
            .await
    }

    /// Upload a base64 payload, tolerating `data:<mime>;base64,` headers.
    pub async fn upload_from_base64(
        &self,
        payload: &str,
        filename: Option<&str>,
        scenario: Option<&str>,
        mode: GenerationMode,
    ) -> Result<FileRecord, UploadError> {
        let (meta, content) = split_data_url(payload);

        let data = BASE64
            .decode(content.trim())
            .map_err(|e| UploadError::InvalidPayload(format!("invalid base64: {e}")))?;

        let filename = match filename {
            Some(name) => Some(name.to_string()),
            // Derive a name from the declared media type when none is given.
            None => meta
                .and_then(probe::mime_to_ext)
                .map(|ext| format!("file.{ext}")),
        };

        self.create_file(data, filename, scenario, mode).await
    }

    /// Fetch a remote file and upload it.
    pub async fn upload_from_url(
        &self,
        url: &str,
        scenario: Option<&str>,
        mode: GenerationMode,
        options: &FetchOptions,
    ) -> Result<FileRecord, UploadError> {
        let temp = NamedTempFile::new()?;
        fetch::download_to(url, temp.path(), options).await?;
        let data = tokio::fs::read(temp.path()).await?;

        let filename = match filename_from_url(url) {
            Some(name) => Some(name),
            // No usable extension in the URL: sniff the content instead.
            None => probe::sniff_mime(&data)
                .and_then(probe::mime_to_ext)
                .map(|ext| format!("file.{ext}")),
        };

        self.create_file(data, filename, scenario, mode).await
    }

    async fn create_file(
        &self,
        mut data: Vec<u8>,
        filename: Option<String>,
        scenario_name: Option<&str>,
        mode: GenerationMode,
    ) -> Result<FileRecord, UploadError> {
        let scenario = self.registry.resolve(scenario_name)?;

        let ext = filename
            .as_deref()
            .and_then(extension_of)
            .map(|e| e.to_ascii_lowercase())
            .or_else(|| {
                probe::sniff_mime(&data)
                    .and_then(probe::mime_to_ext)
                    .map(str::to_string)
            })
            .ok_or_else(|| {
                UploadError::InvalidPayload("could not determine file extension".to_string())
            })?;

        if let Some(config) = scenario.validator() {
            FileValidator::new(config.clone()).validate(&data, Some(&ext))?;
        }

        if scenario.fix_orientation() {
            match renderer::auto_orient(&data) {
                Ok(Some(fixed)) => data = fixed,
                Ok(None) => {}
                // A broken EXIF block must not block an otherwise-valid
                // upload.
                Err(e) => tracing::warn!(error = %e, "Orientation fix failed"),
            }
        }

        if ext == "svg" {
            if let Ok(text) = std::str::from_utf8(&data) {
                if let Some(fixed) = svg::ensure_namespaces(text) {
                    data = fixed.into_bytes();
                }
            }
        }

        let hash = hash_token();
        let storage = create_storage(scenario.storage()).await?;

        let name = match (&filename, scenario.save_original_filename()) {
            (Some(name), true) if !scenario.replace_if_exists() => {
                Some(self.probe_free_name(&*storage, &hash, name).await?)
            }
            (name, _) => name.clone(),
        };

        let base = match (&name, scenario.save_original_filename()) {
            (Some(name), true) => stem_of(name),
            _ => &hash,
        };
        let physical = address::file_name(base, None, &ext);

        let temp = NamedTempFile::new()?;
        tokio::fs::write(temp.path(), &data).await?;
        storage.upload(temp.path(), &physical, &hash, true).await?;

        // Raster probing is best-effort; failures leave null dimensions.
        let (width, height, mime) = match probe::probe(&data) {
            Ok(info) => (Some(info.width), Some(info.height), info.mime),
            Err(_) => {
                let mime = probe::sniff_mime(&data)
                    .map(str::to_string)
                    .or_else(|| probe::ext_to_mime(&ext).map(str::to_string))
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                (None, None, mime)
            }
        };

        let mut record = FileRecord {
            id: Uuid::new_v4(),
            scenario: scenario.name().map(str::to_string),
            hash,
            name,
            ext,
            mime,
            size: data.len() as u64,
            width,
            height,
            derivatives: DerivativeSet::new(),
            created_at: Utc::now(),
            deleted_at: None,
        };
        self.repository.insert(record.clone()).await?;

        tracing::info!(
            file_id = %record.id,
            scenario = scenario.name().unwrap_or("<default>"),
            size_bytes = record.size,
            mime = %record.mime,
            "Upload stored"
        );

        if scenario.has_thumbnails() {
            self.generate(&mut record, mode).await?;
        }

        Ok(record)
    }

    async fn generate(
        &self,
        record: &mut FileRecord,
        mode: GenerationMode,
    ) -> Result<(), UploadError> {
        match mode {
            GenerationMode::Skip => Ok(()),
            GenerationMode::Inline => self.engine.reconcile(record).await,
            GenerationMode::Deferred => match &self.dispatcher {
                Some(dispatcher) => {
                    if let Err(e) = dispatcher.dispatch(record.id).await {
                        tracing::warn!(
                            file_id = %record.id,
                            error = %e,
                            "Deferred dispatch failed; generating inline"
                        );
                        self.engine.reconcile(record).await?;
                    }
                    Ok(())
                }
                None => self.engine.reconcile(record).await,
            },
        }
    }

    /// Probe `name.ext`, `name(1).ext`, ... until a free physical slot is
    /// found.
    async fn probe_free_name(
        &self,
        storage: &dyn Storage,
        hash: &str,
        name: &str,
    ) -> Result<String, UploadError> {
        let ext = extension_of(name).unwrap_or_default();
        let mut candidate = name.to_string();

        for attempt in 0..MAX_NAME_PROBES {
            let physical = address::file_name(stem_of(&candidate), None, ext);
            if !storage.exists(&physical, hash).await? {
                return Ok(candidate);
            }
            candidate = address::numbered_name(name, attempt + 1);
        }

        Err(UploadError::FilenameProbeExhausted(MAX_NAME_PROBES))
    }

    /// Re-home a file under another scenario: validate against the new
    /// scenario, re-upload the original there, reset the tracker. Returns
    /// `Ok(false)` (non-strict) or an error (strict) when the new scenario's
    /// validator rejects the file; nothing is changed in that case. The old
    /// location's objects stay behind for the old scenario's cleanup path.
    pub async fn change_scenario(
        &self,
        file: &mut FileRecord,
        new_scenario: Option<&str>,
        regenerate: bool,
        strict: bool,
    ) -> Result<bool, UploadError> {
        if file.scenario.as_deref() == new_scenario {
            return Ok(true);
        }

        let scenario = self.registry.resolve(new_scenario)?;

        let Some(temp) = self.engine.download_to_temp(file).await? else {
            return Err(UploadError::FileNotFound);
        };
        let data = tokio::fs::read(temp.path()).await?;

        if let Some(config) = scenario.validator() {
            if let Err(e) = FileValidator::new(config.clone()).validate(&data, Some(&file.ext)) {
                if strict {
                    return Err(UploadError::InvalidForScenario {
                        scenario: new_scenario.unwrap_or("<default>").to_string(),
                        reason: e.to_string(),
                    });
                }
                return Ok(false);
            }
        }

        let storage = create_storage(scenario.storage()).await?;
        let physical = physical_original_name(file, scenario);
        storage.upload(temp.path(), &physical, &file.hash, false).await?;

        file.scenario = scenario.name().map(str::to_string);
        file.derivatives = DerivativeSet::new();
        self.repository.update(file).await?;

        if regenerate && scenario.has_thumbnails() {
            self.generate(file, GenerationMode::Deferred).await?;
        }

        Ok(true)
    }

    /// Duplicate a record's bytes into a brand-new record (fresh hash) under
    /// its own scenario.
    pub async fn clone_file(
        &self,
        file: &FileRecord,
        mode: GenerationMode,
    ) -> Result<FileRecord, UploadError> {
        let Some(body) = self.engine.body(file).await? else {
            return Err(UploadError::FileNotFound);
        };

        self.upload_from_bytes(
            body.to_vec(),
            file.name.as_deref(),
            file.scenario.as_deref(),
            mode,
        )
        .await
    }
}

fn physical_original_name(file: &FileRecord, scenario: &Scenario) -> String {
    address::file_name(
        file.filename_base(scenario.save_original_filename()),
        None,
        &file.ext,
    )
}

fn extension_of(name: &str) -> Option<&str> {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
        _ => None,
    }
}

fn stem_of(name: &str) -> &str {
    match extension_of(name) {
        Some(_) => name.rsplit_once('.').map_or(name, |(stem, _)| stem),
        None => name,
    }
}

/// Split an optional `data:<mime>;base64,` header off a payload, returning
/// the declared MIME type (if any) and the encoded content.
fn split_data_url(payload: &str) -> (Option<&str>, &str) {
    let Some((meta, content)) = payload.split_once(',') else {
        return (None, payload);
    };

    if let Some(rest) = meta.strip_prefix("data:") {
        let mime = rest.split(';').next().unwrap_or_default();
        return ((!mime.is_empty()).then_some(mime), content);
    }

    (None, payload)
}

/// Filename implied by a URL's path, ignoring query strings and extensions
/// too long to be real.
fn filename_from_url(url: &str) -> Option<String> {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let name = without_query.rsplit('/').next()?;
    let ext = extension_of(name)?;

    if ext.len() > MAX_URL_EXT_LEN || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }

    Some(name.to_string())
}
