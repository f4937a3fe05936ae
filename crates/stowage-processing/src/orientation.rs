//! EXIF orientation handling.
//!
//! Reading the tag is best-effort and returns an `Option` so call sites make
//! the "continue with defaults" decision explicitly; a corrupt EXIF block
//! must never fail an otherwise valid upload.

use std::io::Cursor;

use image::{imageops, DynamicImage};

/// Rotation needed to display a raster upright, derived from the EXIF
/// orientation tag. Tags other than 3, 6 and 8 (including missing or mirrored
/// ones) map to no rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Rotate90,
    Rotate180,
    Rotate270,
}

impl Orientation {
    fn from_exif_tag(tag: u32) -> Option<Self> {
        match tag {
            3 => Some(Orientation::Rotate180),
            6 => Some(Orientation::Rotate90),
            8 => Some(Orientation::Rotate270),
            _ => None,
        }
    }
}

/// Read the orientation tag from raw image bytes.
pub fn read_orientation(data: &[u8]) -> Option<Orientation> {
    let mut cursor = Cursor::new(data);
    let exif = exif::Reader::new()
        .read_from_container(&mut cursor)
        .ok()?;

    let tag = exif
        .get_field(exif::Tag::Orientation, exif::In::PRIMARY)?
        .value
        .get_uint(0)?;

    Orientation::from_exif_tag(tag)
}

/// Apply a rotation. 90/270 swap the output dimensions.
pub fn apply(img: DynamicImage, orientation: Orientation) -> DynamicImage {
    match orientation {
        Orientation::Rotate90 => DynamicImage::ImageRgba8(imageops::rotate90(&img.to_rgba8())),
        Orientation::Rotate180 => DynamicImage::ImageRgba8(imageops::rotate180(&img.to_rgba8())),
        Orientation::Rotate270 => DynamicImage::ImageRgba8(imageops::rotate270(&img.to_rgba8())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgba, RgbaImage};

    #[test]
    fn test_tag_mapping() {
        assert_eq!(Orientation::from_exif_tag(3), Some(Orientation::Rotate180));
        assert_eq!(Orientation::from_exif_tag(6), Some(Orientation::Rotate90));
        assert_eq!(Orientation::from_exif_tag(8), Some(Orientation::Rotate270));
        for other in [0, 1, 2, 4, 5, 7, 9] {
            assert_eq!(Orientation::from_exif_tag(other), None);
        }
    }

    #[test]
    fn test_missing_exif_is_none() {
        let img = RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255]));
        let mut buffer = Vec::new();
        img.write_to(
            &mut Cursor::new(&mut buffer),
            image::ImageFormat::Png,
        )
        .unwrap();
        assert_eq!(read_orientation(&buffer), None);
        assert_eq!(read_orientation(b"not an image"), None);
    }

    #[test]
    fn test_rotation_dimension_swap() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 2, Rgba([0, 0, 255, 255])));

        assert_eq!(apply(img.clone(), Orientation::Rotate90).dimensions(), (2, 4));
        assert_eq!(
            apply(img.clone(), Orientation::Rotate180).dimensions(),
            (4, 2)
        );
        assert_eq!(apply(img, Orientation::Rotate270).dimensions(), (2, 4));
    }
}
