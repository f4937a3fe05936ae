//! Error types module
//!
//! Configuration errors are fatal at registry construction time: they indicate
//! a deployment bug, not user input, and are never silently defaulted.

/// Configuration errors raised while building a [`crate::ScenarioRegistry`]
/// or resolving a scenario by name.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Unknown scenario: {0}")]
    UnknownScenario(String),

    #[error("No default scenario is configured")]
    NoDefaultScenario,

    #[error("Invalid quality {0}: must be between 1 and 100")]
    InvalidQuality(u8),

    #[error("Transform mode {mode} requires both width and height")]
    IncompleteTransform { mode: &'static str },

    #[error("Invalid shard depth {0}: must be between 1 and 4")]
    InvalidShardDepth(u8),

    #[error("Invalid storage config: {0}")]
    InvalidStorage(String),
}

/// Errors surfaced by a [`crate::FileRepository`] backend.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Record not found: {0}")]
    NotFound(uuid::Uuid),

    #[error("Repository backend error: {0}")]
    Backend(String),
}
