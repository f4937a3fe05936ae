//! Deterministic mapping from file identity to physical names.
//!
//! Pure string work; backends decide where the produced names live.

use stowage_core::DerivativeKey;

/// Shard directory for a hash: `depth` two-character lowercase segments of
/// its prefix, joined with `/`.
///
/// Sharding bounds per-directory fan-out: a flat directory with a million
/// entries degrades lookup on most filesystems, while `16^(2*depth)`-ish leaf
/// directories keep each one small.
pub fn shard_dir(hash: &str, depth: u8) -> String {
    let depth = depth.clamp(1, 4) as usize;
    (0..depth)
        .map(|i| {
            hash.get(i * 2..i * 2 + 2)
                .unwrap_or("xx")
                .to_ascii_lowercase()
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Filename for the original or one derivative.
///
/// `base` is the hash, or the kept original filename stripped of its own
/// extension. Derivatives append `_<W|AUTO>_<H|AUTO>[@2x]` and WebP variants
/// swap the extension for `webp`.
pub fn file_name(base: &str, derivative: Option<&DerivativeKey>, original_ext: &str) -> String {
    match derivative {
        Some(key) => format!(
            "{}_{}.{}",
            base,
            key.filename_suffix(),
            key.extension(original_ext)
        ),
        None => format!("{base}.{original_ext}"),
    }
}

/// `name.ext` -> `name(index).ext`, used to probe free slots when a scenario
/// keeps original filenames and refuses replacement.
pub fn numbered_name(name: &str, index: u32) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}({index}).{ext}"),
        None => format!("{name}({index})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stowage_core::{FitMode, Transform};

    #[test]
    fn test_shard_dir_depths() {
        assert_eq!(shard_dir("a1b2c3d4", 1), "a1");
        assert_eq!(shard_dir("a1b2c3d4", 2), "a1/b2");
        assert_eq!(shard_dir("a1b2c3d4", 4), "a1/b2/c3/d4");
    }

    #[test]
    fn test_shard_dir_lowercases() {
        assert_eq!(shard_dir("A1B2c3d4", 2), "a1/b2");
    }

    #[test]
    fn test_original_name() {
        assert_eq!(file_name("a1b2c3", None, "jpg"), "a1b2c3.jpg");
    }

    #[test]
    fn test_derivative_names() {
        let t = Transform::new(380, 250, FitMode::Crop);
        let base = DerivativeKey::new(&t, false, false);
        let retina = DerivativeKey::new(&t, true, false);
        let webp = DerivativeKey::new(&t, false, true);
        let retina_webp = DerivativeKey::new(&t, true, true);

        assert_eq!(file_name("a1b2c3", Some(&base), "jpg"), "a1b2c3_380_250.jpg");
        assert_eq!(
            file_name("a1b2c3", Some(&retina), "jpg"),
            "a1b2c3_380_250@2x.jpg"
        );
        assert_eq!(
            file_name("a1b2c3", Some(&webp), "jpg"),
            "a1b2c3_380_250.webp"
        );
        assert_eq!(
            file_name("a1b2c3", Some(&retina_webp), "jpg"),
            "a1b2c3_380_250@2x.webp"
        );
    }

    #[test]
    fn test_unconstrained_axis_in_name() {
        let t = Transform::new(1920, 0, FitMode::Auto);
        let key = DerivativeKey::new(&t, false, false);
        assert_eq!(
            file_name("photo", Some(&key), "png"),
            "photo_1920_AUTO.png"
        );
    }

    #[test]
    fn test_numbered_name() {
        assert_eq!(numbered_name("report.pdf", 1), "report(1).pdf");
        assert_eq!(numbered_name("archive.tar.gz", 3), "archive.tar(3).gz");
        assert_eq!(numbered_name("README", 2), "README(2)");
    }
}
