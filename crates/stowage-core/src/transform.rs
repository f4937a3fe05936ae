//! Immutable derivative descriptions.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How a derivative's target box is applied to the source raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitMode {
    /// Aspect-preserving fit; with both dimensions set and `force`, scale to
    /// cover and trim from the origin.
    #[default]
    Auto,
    /// Exact output dimensions, aspect ratio ignored.
    Exact,
    /// Scale to cover both dimensions, then center-crop to the box.
    Crop,
}

impl FitMode {
    fn as_str(self) -> &'static str {
        match self {
            FitMode::Auto => "auto",
            FitMode::Exact => "exact",
            FitMode::Crop => "crop",
        }
    }
}

/// One derivative specification: target box, fit mode and variant flags.
///
/// A width or height of `0` means that axis is unconstrained. Identity for
/// tracking purposes is the canonical key string (see
/// [`crate::DerivativeKey`]), never object identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transform {
    pub width: u32,
    pub height: u32,
    pub mode: FitMode,
    /// Allow scaling past the source size.
    pub force: bool,
    /// Also derive a double-resolution variant.
    #[serde(rename = "2x")]
    pub two_x: bool,
    /// Generate the 2x variant even when the source is smaller than the
    /// doubled box.
    #[serde(rename = "force2x")]
    pub force_two_x: bool,
    /// Also derive a WebP-encoded variant.
    pub webp: bool,
    /// Per-transform encode quality override (1-100).
    pub quality: Option<u8>,
}

impl Default for Transform {
    fn default() -> Self {
        Transform {
            width: 0,
            height: 0,
            mode: FitMode::Auto,
            force: false,
            two_x: false,
            force_two_x: false,
            webp: false,
            quality: None,
        }
    }
}

impl Transform {
    pub fn new(width: u32, height: u32, mode: FitMode) -> Self {
        Transform {
            width,
            height,
            mode,
            ..Transform::default()
        }
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_2x(mut self) -> Self {
        self.two_x = true;
        self
    }

    pub fn with_force_2x(mut self) -> Self {
        self.two_x = true;
        self.force_two_x = true;
        self
    }

    pub fn with_webp(mut self) -> Self {
        self.webp = true;
        self
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = Some(quality);
        self
    }

    /// Check the invariants that make a transform derivable.
    ///
    /// Crop and exact modes need a fully specified box; quality overrides
    /// must be a percentage.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if matches!(self.mode, FitMode::Crop | FitMode::Exact)
            && (self.width == 0 || self.height == 0)
        {
            return Err(ConfigError::IncompleteTransform {
                mode: self.mode.as_str(),
            });
        }

        if let Some(q) = self.quality {
            if q == 0 || q > 100 {
                return Err(ConfigError::InvalidQuality(q));
            }
        }

        Ok(())
    }
}
