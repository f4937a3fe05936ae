//! Derivative rendering: decode, resample, crop, orient, encode.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};
use stowage_core::Transform;

use crate::geometry::{self, ResizePlan};
use crate::orientation;

#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Unsupported image format")]
    UnsupportedFormat,

    #[error("Encode failed: {0}")]
    EncodeFailed(String),
}

/// Select a resampling filter by downscale ratio: cheap filters for heavy
/// reductions where ringing is invisible, Lanczos near 1:1.
fn select_filter(orig: (u32, u32), new: (u32, u32)) -> FilterType {
    let width_ratio = orig.0 as f32 / new.0 as f32;
    let height_ratio = orig.1 as f32 / new.1 as f32;
    let max_ratio = width_ratio.max(height_ratio);

    if max_ratio > 2.0 {
        FilterType::Triangle
    } else if max_ratio > 1.5 {
        FilterType::CatmullRom
    } else {
        FilterType::Lanczos3
    }
}

fn decode(data: &[u8]) -> Result<(DynamicImage, ImageFormat), ProcessingError> {
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| ProcessingError::InvalidImage(e.to_string()))?;

    let format = reader.format().ok_or(ProcessingError::UnsupportedFormat)?;
    let img = reader
        .decode()
        .map_err(|e| ProcessingError::InvalidImage(e.to_string()))?;

    Ok((img, format))
}

fn encode(img: &DynamicImage, format: ImageFormat, quality: u8) -> Result<Vec<u8>, ProcessingError> {
    match format {
        ImageFormat::Jpeg => {
            let mut buffer = Vec::new();
            let mut cursor = Cursor::new(&mut buffer);
            let mut encoder = JpegEncoder::new_with_quality(&mut cursor, quality);
            encoder
                .encode_image(&img.to_rgb8())
                .map_err(|e| ProcessingError::EncodeFailed(e.to_string()))?;
            Ok(buffer)
        }
        ImageFormat::Png | ImageFormat::Gif => {
            // Lossless formats take no quality percentage; the compression
            // level stays at the encoder default.
            let mut buffer = Vec::new();
            img.write_to(&mut Cursor::new(&mut buffer), format)
                .map_err(|e| ProcessingError::EncodeFailed(e.to_string()))?;
            Ok(buffer)
        }
        ImageFormat::WebP => Ok(encode_webp(img, quality)),
        _ => Err(ProcessingError::UnsupportedFormat),
    }
}

fn encode_webp(img: &DynamicImage, quality: u8) -> Vec<u8> {
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    let encoder = webp::Encoder::from_rgba(&rgba, width, height);
    encoder.encode(quality as f32).to_vec()
}

fn apply_plan(img: DynamicImage, src: (u32, u32), plan: &ResizePlan) -> DynamicImage {
    let mut result = img;

    if plan.resize != src {
        let filter = select_filter(src, plan.resize);
        result = result.resize_exact(plan.resize.0, plan.resize.1, filter);
    }

    if let Some(rect) = plan.crop {
        result = result.crop_imm(rect.x, rect.y, rect.width, rect.height);
    }

    result
}

/// Render one derivative variant of a source raster.
///
/// Returns `Ok(None)` when the variant is skipped (2x against a too-small
/// source). Errors mean the source could not be read or re-encoded; callers
/// treat that as "skip this derivative", never as a fatal batch failure.
pub fn render_derivative(
    data: &[u8],
    transform: &Transform,
    two_x: bool,
    webp: bool,
    quality: u8,
) -> Result<Option<Vec<u8>>, ProcessingError> {
    let (img, format) = decode(data)?;
    let src = img.dimensions();

    let Some(plan) = geometry::plan_variant(src, transform, two_x) else {
        tracing::debug!(
            src_width = src.0,
            src_height = src.1,
            width = transform.width,
            height = transform.height,
            "2x derivative skipped, source below doubled target"
        );
        return Ok(None);
    };

    let mut result = apply_plan(img, src, &plan);

    // Orientation correction runs after the geometric work.
    if let Some(o) = orientation::read_orientation(data) {
        result = orientation::apply(result, o);
    }

    let output_format = if webp { ImageFormat::WebP } else { format };
    encode(&result, output_format, quality).map(Some)
}

/// Re-encode a raster upright according to its EXIF orientation tag.
///
/// `Ok(None)` when no rotation is needed. Used on originals at upload time
/// when the scenario's orientation-fix policy is on.
pub fn auto_orient(data: &[u8]) -> Result<Option<Vec<u8>>, ProcessingError> {
    let Some(o) = orientation::read_orientation(data) else {
        return Ok(None);
    };

    let (img, format) = decode(data)?;
    let rotated = orientation::apply(img, o);
    encode(&rotated, format, 100).map(Some)
}
