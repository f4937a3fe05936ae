//! Stowage processing library
//!
//! Raster work for the derivation engine: the pure resize/crop geometry
//! planner, the renderer that decodes, resamples and encodes derivatives
//! (same-format or WebP), EXIF orientation handling, image-info probing,
//! SVG namespace normalization, and the upload validator.

pub mod geometry;
pub mod orientation;
pub mod probe;
pub mod renderer;
pub mod svg;
pub mod validator;

// Re-export commonly used types
pub use geometry::{plan, plan_variant, BoxSpec, CropRect, ResizePlan};
pub use orientation::Orientation;
pub use probe::{probe, ImageInfo, ProbeError};
pub use renderer::{render_derivative, ProcessingError};
pub use validator::{FileValidator, ValidationError};
