//! Image-info probing and MIME/extension mapping.

use std::io::Cursor;

use image::ImageReader;

/// Dimensions and detected type of a raster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub mime: String,
}

/// Probe failures are non-fatal to uploads: the record simply keeps null
/// dimensions.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("Unreadable image: {0}")]
    Unreadable(String),

    #[error("Unsupported image format")]
    UnsupportedFormat,
}

/// Read dimensions and MIME type from raw bytes without a full decode.
pub fn probe(data: &[u8]) -> Result<ImageInfo, ProbeError> {
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| ProbeError::Unreadable(e.to_string()))?;

    let format = reader.format().ok_or(ProbeError::UnsupportedFormat)?;
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| ProbeError::Unreadable(e.to_string()))?;

    Ok(ImageInfo {
        width,
        height,
        mime: format.to_mime_type().to_string(),
    })
}

/// MIME type claimed for a known extension, used when nothing better is
/// available (e.g. non-raster uploads).
pub fn ext_to_mime(ext: &str) -> Option<&'static str> {
    let mime = match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "bmp" => "image/bmp",
        "tiff" | "tif" => "image/tiff",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "7z" => "application/x-7z-compressed",
        "rar" => "application/vnd.rar",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        _ => return None,
    };
    Some(mime)
}

/// Canonical extension for a MIME type; the inverse of [`ext_to_mime`] for
/// the formats this crate cares about.
pub fn mime_to_ext(mime: &str) -> Option<&'static str> {
    let ext = match mime {
        "image/jpeg" | "image/pjpeg" => "jpg",
        "image/png" | "image/x-png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/svg+xml" | "image/svg" => "svg",
        "image/bmp" | "image/x-ms-bmp" => "bmp",
        "image/tiff" => "tiff",
        "application/pdf" => "pdf",
        "application/zip" | "application/x-zip-compressed" => "zip",
        "application/x-7z-compressed" => "7z",
        "application/vnd.rar" | "application/x-rar-compressed" => "rar",
        "application/msword" => "doc",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx",
        "application/vnd.ms-excel" => "xls",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => "xlsx",
        "application/vnd.ms-powerpoint" => "ppt",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation" => "pptx",
        "text/plain" => "txt",
        "text/csv" => "csv",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        _ => return None,
    };
    Some(ext)
}

/// Sniff a MIME type from magic bytes. `None` when nothing is recognized
/// (plain text, empty files, exotic formats).
pub fn sniff_mime(data: &[u8]) -> Option<&'static str> {
    infer::get(data).map(|kind| kind.mime_type())
}
