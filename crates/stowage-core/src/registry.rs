//! Scenario registry: the configuration tree resolved once at startup.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::scenario::{Scenario, ScenarioConfig, StorageConfig, ValidatorConfig};

/// Root of the configuration tree.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Storage used by the distinguished nameless default scenario.
    pub default_storage: Option<StorageConfig>,
    /// Validator applied to scenarios that do not define their own.
    pub default_validator: Option<ValidatorConfig>,
    /// Encode quality applied to scenarios that do not define their own.
    pub default_quality: Option<u8>,
    pub scenarios: BTreeMap<String, ScenarioConfig>,
}

/// All scenarios, fully validated at construction.
///
/// Built once at process startup and passed by reference to every component
/// that resolves scenarios; configuration bugs surface here, not at upload
/// time.
#[derive(Debug, Clone)]
pub struct ScenarioRegistry {
    scenarios: BTreeMap<String, Scenario>,
    default: Option<Scenario>,
}

impl ScenarioRegistry {
    pub fn new(config: RegistryConfig) -> Result<Self, ConfigError> {
        let default = match config.default_storage {
            Some(storage) => Some(Scenario::from_config(
                None,
                ScenarioConfig {
                    storage: Some(storage),
                    validator: config.default_validator.clone(),
                    ..ScenarioConfig::default()
                },
                None,
                config.default_quality,
            )?),
            None => None,
        };

        let mut scenarios = BTreeMap::new();
        for (name, scenario_config) in config.scenarios {
            let scenario = Scenario::from_config(
                Some(name.clone()),
                scenario_config,
                config.default_validator.as_ref(),
                config.default_quality,
            )?;
            scenarios.insert(name, scenario);
        }

        Ok(ScenarioRegistry { scenarios, default })
    }

    /// Look up a scenario by name. `None` names the default scenario.
    pub fn get(&self, name: Option<&str>) -> Option<&Scenario> {
        match name {
            Some(name) => self.scenarios.get(name),
            None => self.default.as_ref(),
        }
    }

    pub fn default_scenario(&self) -> Option<&Scenario> {
        self.default.as_ref()
    }

    /// Strict resolution: a named-but-unknown scenario is an error distinct
    /// from "no scenario requested and no default configured".
    pub fn resolve(&self, name: Option<&str>) -> Result<&Scenario, ConfigError> {
        match name {
            Some(name) => self
                .scenarios
                .get(name)
                .ok_or_else(|| ConfigError::UnknownScenario(name.to_string())),
            None => self.default.as_ref().ok_or(ConfigError::NoDefaultScenario),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Scenario> {
        self.scenarios.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{FitMode, Transform};

    fn fs_storage(folder: &str) -> StorageConfig {
        StorageConfig::Filesystem {
            root_dir: format!("/tmp/uploads/{folder}"),
            base_url: format!("http://localhost/uploads/{folder}"),
            shard_depth: 2,
        }
    }

    fn registry() -> ScenarioRegistry {
        let mut scenarios = BTreeMap::new();
        scenarios.insert(
            "image".to_string(),
            ScenarioConfig {
                storage: Some(fs_storage("image")),
                thumbnails: BTreeMap::from([(
                    "preview".to_string(),
                    Transform::new(380, 250, FitMode::Crop),
                )]),
                ..ScenarioConfig::default()
            },
        );

        ScenarioRegistry::new(RegistryConfig {
            default_storage: Some(fs_storage("tmp")),
            scenarios,
            ..RegistryConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_resolve_named_scenario() {
        let registry = registry();
        let scenario = registry.resolve(Some("image")).unwrap();
        assert_eq!(scenario.name(), Some("image"));
        assert!(scenario.has_thumbnails());
    }

    #[test]
    fn test_unknown_scenario_is_distinct_error() {
        let registry = registry();
        assert!(matches!(
            registry.resolve(Some("missing")),
            Err(ConfigError::UnknownScenario(_))
        ));
    }

    #[test]
    fn test_no_default_configured() {
        let registry = ScenarioRegistry::new(RegistryConfig::default()).unwrap();
        assert!(matches!(
            registry.resolve(None),
            Err(ConfigError::NoDefaultScenario)
        ));
    }

    #[test]
    fn test_default_scenario_has_no_name() {
        let registry = registry();
        assert_eq!(registry.resolve(None).unwrap().name(), None);
    }

    #[test]
    fn test_bad_transform_fails_at_construction() {
        let mut scenarios = BTreeMap::new();
        scenarios.insert(
            "broken".to_string(),
            ScenarioConfig {
                storage: Some(fs_storage("broken")),
                thumbnails: BTreeMap::from([(
                    "thumb".to_string(),
                    Transform::new(380, 0, FitMode::Crop),
                )]),
                ..ScenarioConfig::default()
            },
        );
        let err = ScenarioRegistry::new(RegistryConfig {
            scenarios,
            ..RegistryConfig::default()
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::IncompleteTransform { .. }));
    }
}
