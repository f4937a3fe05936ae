//! Stowage engine library
//!
//! Orchestration on top of the storage and processing crates: the upload
//! pipeline, the thumbnail reconciliation engine, the deferred-generation
//! queue, remote fetch, and maintenance sweeps.
//!
//! # Concurrency contract
//!
//! Nothing here locks internally. Operations on one file are sequential
//! within a call; callers must not run two reconciliations for the same file
//! concurrently (the queue's single worker gives that for deferred jobs).
//! Racing reconcilers waste work but cannot corrupt state: uploads are
//! overwrite-safe and a lost tracker update self-heals on the next pass.

pub mod error;
pub mod fetch;
pub mod pipeline;
pub mod queue;
pub mod sweep;
pub mod thumbnails;

// Re-export commonly used types
pub use error::UploadError;
pub use fetch::{FetchError, FetchOptions};
pub use pipeline::{GenerationMode, UploadService};
pub use queue::{DerivativeDispatcher, DerivativeQueue, DispatchError};
pub use sweep::{orphan_sweep, regenerate_all, SweepReport};
pub use thumbnails::{DerivativeManifest, ThumbnailEngine, ThumbnailUrls};
