//! Stowage core library
//!
//! Shared domain types for the stowage workspace: the scenario registry and
//! its configuration tree, the immutable transform descriptions, the
//! derivative-key value types, the `FileRecord` model and the repository
//! abstraction used by the engine.
//!
//! # Scenario resolution
//!
//! Scenarios are resolved through a [`ScenarioRegistry`] built once at startup
//! and passed by reference to every component that needs it. There is no
//! process-global configuration lookup.

pub mod derivative;
pub mod error;
pub mod models;
pub mod presets;
pub mod registry;
pub mod repository;
pub mod scenario;
pub mod token;
pub mod transform;

// Re-export commonly used types
pub use derivative::{DerivativeKey, DerivativeSet};
pub use error::{ConfigError, RepositoryError};
pub use models::FileRecord;
pub use registry::{RegistryConfig, ScenarioRegistry};
pub use repository::{FileRepository, MemoryFileRepository, RepoResult};
pub use scenario::{Scenario, ScenarioConfig, StorageConfig, ValidatorConfig};
pub use token::hash_token;
pub use transform::{FitMode, Transform};
