//! Scenarios: named policy bundles selected per upload use-case.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::transform::Transform;

/// Default encode quality applied when neither the scenario nor the registry
/// overrides it.
pub const DEFAULT_QUALITY: u8 = 88;

/// Default shard-directory depth for filesystem storage.
pub const DEFAULT_SHARD_DEPTH: u8 = 2;

/// Storage backend parameters, one variant per backend.
///
/// Construction-time matching on this enum replaces runtime dispatch on a
/// `type` string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Hash-sharded directory tree on the local filesystem.
    Filesystem {
        /// Root directory all keys resolve under.
        root_dir: String,
        /// Public base URL the root is served from.
        base_url: String,
        /// Number of two-character shard segments (1-4).
        #[serde(default = "default_shard_depth")]
        shard_depth: u8,
    },
    /// S3-compatible object store.
    ObjectStore {
        bucket: String,
        region: String,
        /// Custom endpoint for S3-compatible providers (MinIO, Spaces, ...).
        #[serde(default)]
        endpoint: Option<String>,
        /// Key prefix all objects live under.
        path_prefix: String,
        /// Public base URL derivative links are built from.
        public_base_url: String,
    },
}

fn default_shard_depth() -> u8 {
    DEFAULT_SHARD_DEPTH
}

impl StorageConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            StorageConfig::Filesystem {
                root_dir,
                shard_depth,
                ..
            } => {
                if root_dir.is_empty() {
                    return Err(ConfigError::InvalidStorage(
                        "root_dir must not be empty".to_string(),
                    ));
                }
                if !(1..=4).contains(shard_depth) {
                    return Err(ConfigError::InvalidShardDepth(*shard_depth));
                }
            }
            StorageConfig::ObjectStore { bucket, .. } => {
                if bucket.is_empty() {
                    return Err(ConfigError::InvalidStorage(
                        "bucket must not be empty".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Upload validation rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Lowercase extension allow-list.
    pub extensions: Vec<String>,
    /// Maximum size in bytes; `None` = unbounded.
    pub max_size: Option<u64>,
    /// Cross-check the claimed extension against sniffed content.
    pub check_extension_by_mime: bool,
}

/// Raw per-scenario configuration, as written in the config tree.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub storage: Option<StorageConfig>,
    pub validator: Option<ValidatorConfig>,
    /// Single unnamed thumbnail; mutually exclusive with `thumbnails`.
    pub thumbnail: Option<Transform>,
    pub thumbnails: BTreeMap<String, Transform>,
    pub fix_orientation: Option<bool>,
    pub quality: Option<u8>,
    pub save_original_filename: bool,
    pub replace_if_exists: bool,
    pub keep_files_on_delete: bool,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        ScenarioConfig {
            storage: None,
            validator: None,
            thumbnail: None,
            thumbnails: BTreeMap::new(),
            fix_orientation: None,
            quality: None,
            save_original_filename: false,
            replace_if_exists: false,
            keep_files_on_delete: false,
        }
    }
}

/// Alias used for the collapsed thumbnail of single-thumbnail scenarios.
pub const SINGLE_THUMBNAIL_ALIAS: &str = "default";

/// Resolved, validated policy bundle.
#[derive(Debug, Clone)]
pub struct Scenario {
    name: Option<String>,
    storage: StorageConfig,
    validator: Option<ValidatorConfig>,
    thumbnails: BTreeMap<String, Transform>,
    single_thumbnail: bool,
    fix_orientation: bool,
    quality: u8,
    save_original_filename: bool,
    replace_if_exists: bool,
    keep_files_on_delete: bool,
}

impl Scenario {
    /// Build a scenario from raw config. `name` is `None` for the default
    /// scenario. All invariants are checked here, once, so later accesses
    /// never fail on configuration.
    pub(crate) fn from_config(
        name: Option<String>,
        config: ScenarioConfig,
        default_validator: Option<&ValidatorConfig>,
        default_quality: Option<u8>,
    ) -> Result<Self, ConfigError> {
        let storage = config.storage.ok_or_else(|| {
            ConfigError::InvalidStorage(format!(
                "scenario `{}` has no storage configured",
                name.as_deref().unwrap_or("<default>")
            ))
        })?;
        storage.validate()?;

        let (thumbnails, single_thumbnail) = match config.thumbnail {
            Some(single) => (
                BTreeMap::from([(SINGLE_THUMBNAIL_ALIAS.to_string(), single)]),
                true,
            ),
            None => (config.thumbnails, false),
        };
        for transform in thumbnails.values() {
            transform.validate()?;
        }

        let quality = config
            .quality
            .or(default_quality)
            .unwrap_or(DEFAULT_QUALITY);
        if quality == 0 || quality > 100 {
            return Err(ConfigError::InvalidQuality(quality));
        }

        Ok(Scenario {
            name,
            storage,
            validator: config.validator.or_else(|| default_validator.cloned()),
            thumbnails,
            single_thumbnail,
            fix_orientation: config.fix_orientation.unwrap_or(true),
            quality,
            save_original_filename: config.save_original_filename,
            replace_if_exists: config.replace_if_exists,
            keep_files_on_delete: config.keep_files_on_delete,
        })
    }

    /// Scenario name, `None` for the distinguished default entry.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn storage(&self) -> &StorageConfig {
        &self.storage
    }

    pub fn validator(&self) -> Option<&ValidatorConfig> {
        self.validator.as_ref()
    }

    pub fn thumbnails(&self) -> &BTreeMap<String, Transform> {
        &self.thumbnails
    }

    pub fn thumbnail(&self, alias: &str) -> Option<&Transform> {
        self.thumbnails.get(alias)
    }

    pub fn has_thumbnails(&self) -> bool {
        !self.thumbnails.is_empty()
    }

    /// Whether the scenario was configured with a single unnamed thumbnail.
    /// Collapses the manifest presentation; tracker semantics are unchanged.
    pub fn is_single_thumbnail(&self) -> bool {
        self.single_thumbnail
    }

    pub fn fix_orientation(&self) -> bool {
        self.fix_orientation
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn save_original_filename(&self) -> bool {
        self.save_original_filename
    }

    pub fn replace_if_exists(&self) -> bool {
        self.replace_if_exists
    }

    pub fn keep_files_on_delete(&self) -> bool {
        self.keep_files_on_delete
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::FitMode;

    fn fs_storage() -> StorageConfig {
        StorageConfig::Filesystem {
            root_dir: "/tmp/uploads".to_string(),
            base_url: "http://localhost/uploads".to_string(),
            shard_depth: 2,
        }
    }

    #[test]
    fn test_storage_is_required() {
        let err = Scenario::from_config(
            Some("image".to_string()),
            ScenarioConfig::default(),
            None,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidStorage(_)));
    }

    #[test]
    fn test_single_thumbnail_collapses_to_default_alias() {
        let config = ScenarioConfig {
            storage: Some(fs_storage()),
            thumbnail: Some(Transform::new(200, 200, FitMode::Crop)),
            ..ScenarioConfig::default()
        };
        let scenario = Scenario::from_config(None, config, None, None).unwrap();
        assert!(scenario.is_single_thumbnail());
        assert!(scenario.thumbnail(SINGLE_THUMBNAIL_ALIAS).is_some());
    }

    #[test]
    fn test_defaults_flow_in() {
        let default_validator = ValidatorConfig {
            extensions: vec!["jpg".to_string()],
            max_size: Some(1024),
            check_extension_by_mime: true,
        };
        let config = ScenarioConfig {
            storage: Some(fs_storage()),
            ..ScenarioConfig::default()
        };
        let scenario =
            Scenario::from_config(None, config, Some(&default_validator), Some(70)).unwrap();
        assert_eq!(scenario.quality(), 70);
        assert_eq!(scenario.validator(), Some(&default_validator));
        assert!(scenario.fix_orientation());
    }

    #[test]
    fn test_invalid_quality_rejected() {
        let config = ScenarioConfig {
            storage: Some(fs_storage()),
            quality: Some(101),
            ..ScenarioConfig::default()
        };
        let err = Scenario::from_config(None, config, None, None).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidQuality(101)));
    }

    #[test]
    fn test_invalid_shard_depth_rejected() {
        let config = ScenarioConfig {
            storage: Some(StorageConfig::Filesystem {
                root_dir: "/tmp/uploads".to_string(),
                base_url: "http://localhost/uploads".to_string(),
                shard_depth: 5,
            }),
            ..ScenarioConfig::default()
        };
        let err = Scenario::from_config(None, config, None, None).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidShardDepth(5)));
    }

    #[test]
    fn test_storage_config_tagged_deserialization() {
        let fs: StorageConfig = serde_json::from_str(
            r#"{"type":"filesystem","root_dir":"/srv/uploads","base_url":"http://cdn.local/u"}"#,
        )
        .unwrap();
        assert!(matches!(
            fs,
            StorageConfig::Filesystem { shard_depth: 2, .. }
        ));

        let s3: StorageConfig = serde_json::from_str(
            r#"{"type":"objectstore","bucket":"media","region":"us-east-1","path_prefix":"uploads","public_base_url":"https://cdn.example.com"}"#,
        )
        .unwrap();
        assert!(matches!(s3, StorageConfig::ObjectStore { .. }));
    }
}
