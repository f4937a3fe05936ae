//! Stowage storage library
//!
//! Storage backends for originals and their derivatives: a hash-sharded local
//! filesystem tree and an S3-compatible object store. Both implement the
//! [`Storage`] trait and share the address scheme in [`address`].
//!
//! # Physical layout
//!
//! - **Filesystem**: `<root>/<shard>/<base>[_<W>_<H>[@2x]].<ext>` where
//!   `<shard>` is 1-4 two-character segments of the hash prefix and `<base>`
//!   is the hash or the kept original filename (without its extension).
//! - **Object store**: `<path_prefix>/<base>[_<W>_<H>[@2x]].<ext>` (flat).
//!
//! WebP derivatives always carry the `webp` extension.

pub mod address;
pub mod factory;
pub mod local;
pub mod object;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use local::LocalStorage;
pub use object::ObjectStorage;
pub use traits::{Storage, StorageError, StorageResult};
