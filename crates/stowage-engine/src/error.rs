//! Engine error taxonomy.
//!
//! Configuration errors are deployment bugs and fatal; validation errors are
//! recoverable rejections surfaced before any physical write; storage and
//! fetch errors are transient and left to the caller's retry policy.

use stowage_core::{ConfigError, RepositoryError};
use stowage_processing::ValidationError;
use stowage_storage::StorageError;

use crate::fetch::FetchError;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("File is not valid for scenario `{scenario}`: {reason}")]
    InvalidForScenario { scenario: String, reason: String },

    #[error("No free filename slot after {0} attempts")]
    FilenameProbeExhausted(u32),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("File not found")]
    FileNotFound,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl UploadError {
    /// Whether retrying the same call can reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            UploadError::Storage(_) | UploadError::Repository(_) => true,
            UploadError::Fetch(fetch) => fetch.is_retryable(),
            UploadError::Io(_) => true,
            _ => false,
        }
    }
}
