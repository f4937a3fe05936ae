//! The persistent record of one stored original.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::derivative::DerivativeSet;

/// One stored original plus the set of derivatives tracked for it.
///
/// `hash` is assigned once at creation and never changes; every physical key
/// for this file (original and derivatives) is derived from it. `scenario`
/// names the policy bundle that owns the storage layout; a record whose
/// scenario no longer resolves degrades to "not found" on derived operations
/// rather than failing them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    /// Public-facing identifier.
    pub id: Uuid,
    /// Owning scenario name; `None` means the default scenario.
    pub scenario: Option<String>,
    /// Random collision-resistant addressing token (not a content digest).
    pub hash: String,
    /// Original filename as claimed at upload, if kept.
    pub name: Option<String>,
    /// Lowercase extension.
    pub ext: String,
    pub mime: String,
    /// Size of the original in bytes.
    pub size: u64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Derivative keys currently believed to exist physically.
    pub derivatives: DerivativeSet,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl FileRecord {
    /// Filename base used by the address scheme: the original name without
    /// its extension when the scenario keeps original filenames, otherwise
    /// the hash.
    pub fn filename_base(&self, save_original_filename: bool) -> &str {
        if save_original_filename {
            if let Some(name) = self.name.as_deref() {
                return name.rsplit_once('.').map_or(name, |(base, _)| base);
            }
        }
        &self.hash
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// SVG originals never get raster derivatives; manifest and URL lookups
    /// fall back to the original.
    pub fn is_svg(&self) -> bool {
        self.mime == "image/svg" || self.mime == "image/svg+xml"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: Option<&str>) -> FileRecord {
        FileRecord {
            id: Uuid::new_v4(),
            scenario: Some("image".to_string()),
            hash: "a1b2c3d4".to_string(),
            name: name.map(str::to_string),
            ext: "jpg".to_string(),
            mime: "image/jpeg".to_string(),
            size: 1024,
            width: Some(100),
            height: Some(80),
            derivatives: DerivativeSet::new(),
            created_at: Utc::now(),
            deleted_at: None,
        }
    }

    #[test]
    fn test_filename_base_prefers_original_name() {
        let record = record(Some("holiday photo.jpg"));
        assert_eq!(record.filename_base(true), "holiday photo");
        assert_eq!(record.filename_base(false), "a1b2c3d4");
    }

    #[test]
    fn test_filename_base_without_extension() {
        let record = record(Some("README"));
        assert_eq!(record.filename_base(true), "README");
    }

    #[test]
    fn test_filename_base_falls_back_to_hash() {
        let record = record(None);
        assert_eq!(record.filename_base(true), "a1b2c3d4");
    }
}
