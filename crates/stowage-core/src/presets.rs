//! Ready-made validator and transform configurations for common use-cases.

use std::collections::BTreeMap;

use crate::scenario::ValidatorConfig;
use crate::transform::{FitMode, Transform};

const MB: u64 = 1024 * 1024;

/// Catch-all validator for mixed-content upload fields.
pub fn default_validator(max_size_mb: u64) -> ValidatorConfig {
    ValidatorConfig {
        extensions: [
            "jpg", "jpeg", "png", "webp", "gif", "svg", "zip", "7z", "rar", "pdf", "doc", "docx",
            "xls", "xlsx", "ppt", "pptx", "txt", "csv", "mp4",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect(),
        max_size: Some(max_size_mb * MB),
        check_extension_by_mime: true,
    }
}

pub fn image_validator(max_size_mb: u64, include_gif: bool, include_svg: bool) -> ValidatorConfig {
    let mut extensions: Vec<String> = ["jpg", "jpeg", "png", "webp"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    if include_gif {
        extensions.push("gif".to_string());
    }
    if include_svg {
        extensions.push("svg".to_string());
    }

    ValidatorConfig {
        extensions,
        max_size: Some(max_size_mb * MB),
        check_extension_by_mime: true,
    }
}

pub fn video_validator() -> ValidatorConfig {
    ValidatorConfig {
        extensions: vec!["mp4".to_string(), "webm".to_string()],
        max_size: Some(1000 * MB),
        check_extension_by_mime: true,
    }
}

/// 1200x630 crop used for social-share preview images.
pub fn open_graph_thumb() -> Transform {
    Transform::new(1200, 630, FitMode::Crop).with_force(true)
}

/// Responsive page-background set: width-bound, WebP, no upscaling.
pub fn background_thumbnails(use_2x: bool) -> BTreeMap<String, Transform> {
    let widths = [
        ("desktop", 1920),
        ("laptop", 1500),
        ("tablet", 1024),
        ("mobile", 425),
    ];

    widths
        .iter()
        .map(|(alias, width)| {
            let mut transform = Transform::new(*width, 0, FitMode::Auto).with_webp();
            if use_2x {
                transform = transform.with_2x();
            }
            (alias.to_string(), transform)
        })
        .collect()
}
