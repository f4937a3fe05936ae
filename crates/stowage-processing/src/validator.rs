//! Upload validation: a rule checklist where the first violation wins.

use stowage_core::ValidatorConfig;

use crate::probe;

/// Validation failures are recoverable: the upload aborts before any physical
/// write and the first violated rule's message goes back to the caller.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Empty file")]
    EmptyFile,

    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: u64, max: u64 },

    #[error("File has no extension")]
    MissingExtension,

    #[error("Invalid file extension: {extension} (allowed: {allowed:?})")]
    InvalidExtension {
        extension: String,
        allowed: Vec<String>,
    },

    #[error("File content does not match extension {extension} (detected: {detected})")]
    ExtensionMismatch {
        extension: String,
        detected: String,
    },
}

/// Validator for one scenario's rules.
pub struct FileValidator {
    config: ValidatorConfig,
}

impl FileValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        FileValidator { config }
    }

    /// Run all configured rules against the upload, stopping at the first
    /// violation.
    pub fn validate(&self, data: &[u8], extension: Option<&str>) -> Result<(), ValidationError> {
        if data.is_empty() {
            return Err(ValidationError::EmptyFile);
        }

        if let Some(max) = self.config.max_size {
            let size = data.len() as u64;
            if size > max {
                return Err(ValidationError::FileTooLarge { size, max });
            }
        }

        let extension = if self.config.extensions.is_empty() {
            extension.unwrap_or_default().to_ascii_lowercase()
        } else {
            let extension = extension
                .ok_or(ValidationError::MissingExtension)?
                .to_ascii_lowercase();
            if !self.config.extensions.contains(&extension) {
                return Err(ValidationError::InvalidExtension {
                    extension,
                    allowed: self.config.extensions.clone(),
                });
            }
            extension
        };

        if self.config.check_extension_by_mime && !extension.is_empty() {
            self.check_content(data, &extension)?;
        }

        Ok(())
    }

    /// Cross-check the claimed extension against sniffed magic bytes. Files
    /// whose content no sniffer recognizes (plain text and friends) pass; the
    /// check only rejects positive mismatches.
    fn check_content(&self, data: &[u8], extension: &str) -> Result<(), ValidationError> {
        let Some(detected_mime) = probe::sniff_mime(data) else {
            return Ok(());
        };
        let Some(detected_ext) = probe::mime_to_ext(detected_mime) else {
            return Ok(());
        };

        if canonical(extension) != canonical(detected_ext) {
            tracing::warn!(
                extension = %extension,
                detected_mime = %detected_mime,
                "Upload content does not match its claimed extension"
            );
            return Err(ValidationError::ExtensionMismatch {
                extension: extension.to_string(),
                detected: detected_mime.to_string(),
            });
        }

        Ok(())
    }
}

fn canonical(ext: &str) -> &str {
    match ext {
        "jpeg" => "jpg",
        "tif" => "tiff",
        other => other,
    }
}
