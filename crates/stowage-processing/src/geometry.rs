//! Resize/crop geometry planning.
//!
//! Everything here is pure arithmetic on dimensions; the renderer applies the
//! resulting plan to actual pixels. Width or height of zero means the axis is
//! unconstrained.

use stowage_core::{FitMode, Transform};

/// Crop window inside the resampled image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// How to get from a source raster to the derivative raster: resample to
/// `resize`, then optionally cut `crop` out of the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizePlan {
    pub resize: (u32, u32),
    pub crop: Option<CropRect>,
}

impl ResizePlan {
    fn identity(src: (u32, u32)) -> Self {
        ResizePlan {
            resize: src,
            crop: None,
        }
    }

    /// Dimensions of the final output.
    pub fn output(&self) -> (u32, u32) {
        match self.crop {
            Some(rect) => (rect.width, rect.height),
            None => self.resize,
        }
    }

    fn is_identity(&self, src: (u32, u32)) -> bool {
        self.resize == src && self.crop.is_none()
    }
}

/// One target box with its fit semantics.
#[derive(Debug, Clone, Copy)]
pub struct BoxSpec {
    pub width: u32,
    pub height: u32,
    pub mode: FitMode,
    pub force: bool,
}

fn round_dim(value: f64) -> u32 {
    (value.round() as u32).max(1)
}

fn ceil_dim(value: f64) -> u32 {
    (value.ceil() as u32).max(1)
}

/// Aspect-preserving height for a fixed target width.
fn height_for_width(src: (u32, u32), width: u32) -> u32 {
    round_dim(src.1 as f64 * width as f64 / src.0 as f64)
}

/// Aspect-preserving width for a fixed target height.
fn width_for_height(src: (u32, u32), height: u32) -> u32 {
    round_dim(src.0 as f64 * height as f64 / src.1 as f64)
}

/// Scale to cover the whole box, then trim it out of the oversized result.
/// `center` picks the crop origin: center for crop mode, (0,0) for auto's
/// edge trimming.
fn cover_and_trim(src: (u32, u32), width: u32, height: u32, force: bool, center: bool) -> ResizePlan {
    let (sw, sh) = (src.0 as f64, src.1 as f64);
    let mut scale = (width as f64 / sw).max(height as f64 / sh);
    if !force {
        scale = scale.min(1.0);
    }

    let resized = (ceil_dim(sw * scale), ceil_dim(sh * scale));
    let crop_w = width.min(resized.0);
    let crop_h = height.min(resized.1);

    if (crop_w, crop_h) == resized {
        return ResizePlan {
            resize: resized,
            crop: None,
        };
    }

    let (x, y) = if center {
        ((resized.0 - crop_w) / 2, (resized.1 - crop_h) / 2)
    } else {
        (0, 0)
    };

    ResizePlan {
        resize: resized,
        crop: Some(CropRect {
            x,
            y,
            width: crop_w,
            height: crop_h,
        }),
    }
}

fn plan_auto(src: (u32, u32), spec: &BoxSpec) -> ResizePlan {
    let (sw, sh) = src;

    match (spec.width, spec.height) {
        (0, 0) => ResizePlan::identity(src),
        (w, 0) => {
            if !spec.force && w >= sw {
                ResizePlan::identity(src)
            } else {
                ResizePlan {
                    resize: (w, height_for_width(src, w)),
                    crop: None,
                }
            }
        }
        (0, h) => {
            if !spec.force && h >= sh {
                ResizePlan::identity(src)
            } else {
                ResizePlan {
                    resize: (width_for_height(src, h), h),
                    crop: None,
                }
            }
        }
        (w, h) => {
            if spec.force {
                // Fit exactly: cover the box, trimming overflow from the
                // origin rather than the center.
                return cover_and_trim(src, w, h, true, false);
            }

            let wr = w as f64 / sw as f64;
            let hr = h as f64 / sh as f64;

            if wr >= 1.0 && hr >= 1.0 {
                // Target covers the source in both axes; never upscale.
                ResizePlan::identity(src)
            } else if wr < 1.0 && hr < 1.0 {
                // Binding ratio: fit inside the box, no cropping.
                let scale = wr.min(hr);
                ResizePlan {
                    resize: (
                        round_dim(sw as f64 * scale),
                        round_dim(sh as f64 * scale),
                    ),
                    crop: None,
                }
            } else if hr < 1.0 {
                ResizePlan {
                    resize: (width_for_height(src, h), h),
                    crop: None,
                }
            } else {
                ResizePlan {
                    resize: (w, height_for_width(src, w)),
                    crop: None,
                }
            }
        }
    }
}

/// Compute the plan for one target box against a source raster.
pub fn plan(src: (u32, u32), spec: &BoxSpec) -> ResizePlan {
    debug_assert!(src.0 > 0 && src.1 > 0);

    match spec.mode {
        FitMode::Exact => {
            if spec.width == 0 || spec.height == 0 {
                // Degenerate config; behave like auto rather than panic.
                plan_auto(src, spec)
            } else {
                ResizePlan {
                    resize: (spec.width, spec.height),
                    crop: None,
                }
            }
        }
        FitMode::Crop => {
            if spec.width == 0 || spec.height == 0 {
                plan_auto(src, spec)
            } else {
                cover_and_trim(src, spec.width, spec.height, spec.force, true)
            }
        }
        FitMode::Auto => plan_auto(src, spec),
    }
}

/// Plan one variant of a transform, doubling the box for 2x.
///
/// Returns `None` when the variant must be skipped: a 2x derivative whose
/// doubled target exceeds the source in a constrained axis is not generated
/// unless the transform forces it, so low-resolution sources never upscale
/// into blurry retina assets.
pub fn plan_variant(src: (u32, u32), transform: &Transform, two_x: bool) -> Option<ResizePlan> {
    let (width, height) = if two_x {
        (transform.width * 2, transform.height * 2)
    } else {
        (transform.width, transform.height)
    };

    if two_x && !transform.force_two_x {
        if (width > 0 && src.0 < width) || (height > 0 && src.1 < height) {
            return None;
        }
    }

    if width == 0 && height == 0 {
        return Some(ResizePlan::identity(src));
    }

    Some(plan(
        src,
        &BoxSpec {
            width,
            height,
            mode: transform.mode,
            force: transform.force,
        },
    ))
}

/// Whether a transform's variant changes the raster at all (used to decide if
/// re-encoding is worth it for unconstrained transforms).
pub fn is_noop(src: (u32, u32), plan: &ResizePlan) -> bool {
    plan.is_identity(src)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stowage_core::FitMode;

    fn spec(width: u32, height: u32, mode: FitMode, force: bool) -> BoxSpec {
        BoxSpec {
            width,
            height,
            mode,
            force,
        }
    }

    #[test]
    fn test_exact_ignores_aspect() {
        let p = plan((4000, 3000), &spec(380, 250, FitMode::Exact, false));
        assert_eq!(p.output(), (380, 250));
        assert!(p.crop.is_none());
    }

    #[test]
    fn test_auto_width_only_preserves_aspect() {
        let p = plan((4000, 3000), &spec(1000, 0, FitMode::Auto, false));
        assert_eq!(p.output(), (1000, 750));
    }

    #[test]
    fn test_auto_height_only_preserves_aspect() {
        let p = plan((4000, 3000), &spec(0, 750, FitMode::Auto, false));
        assert_eq!(p.output(), (1000, 750));
    }

    #[test]
    fn test_auto_never_upscales_by_default() {
        // Single axis.
        let p = plan((400, 300), &spec(1000, 0, FitMode::Auto, false));
        assert_eq!(p.output(), (400, 300));

        // Both axes exceed the source.
        let p = plan((400, 300), &spec(1000, 900, FitMode::Auto, false));
        assert_eq!(p.output(), (400, 300));
    }

    #[test]
    fn test_auto_target_equal_to_source_is_identity() {
        let p = plan((400, 300), &spec(400, 300, FitMode::Auto, false));
        assert_eq!(p.output(), (400, 300));
        assert!(p.crop.is_none());
    }

    #[test]
    fn test_auto_both_smaller_uses_binding_ratio() {
        // 4000x3000 into 1000x500: height binds (500/3000 < 1000/4000).
        let p = plan((4000, 3000), &spec(1000, 500, FitMode::Auto, false));
        assert_eq!(p.output(), (667, 500));
        assert!(p.crop.is_none());
    }

    #[test]
    fn test_auto_mixed_scales_by_constrained_axis() {
        // Height constrained, width target exceeds source.
        let p = plan((1000, 1000), &spec(2000, 500, FitMode::Auto, false));
        assert_eq!(p.output(), (500, 500));

        // Width constrained, height target exceeds source.
        let p = plan((1000, 1000), &spec(500, 2000, FitMode::Auto, false));
        assert_eq!(p.output(), (500, 500));
    }

    #[test]
    fn test_auto_force_covers_and_trims_from_origin() {
        let p = plan((4000, 3000), &spec(1000, 500, FitMode::Auto, true));
        assert_eq!(p.output(), (1000, 500));
        let crop = p.crop.unwrap();
        assert_eq!((crop.x, crop.y), (0, 0));
        // Cover scale binds on width: 1000/4000 -> 1000x750 intermediate.
        assert_eq!(p.resize, (1000, 750));
    }

    #[test]
    fn test_crop_covers_target_exactly() {
        // Source at least target-sized, both nonzero -> exact output.
        for (sw, sh) in [(4000, 3000), (380, 250), (381, 251), (1000, 251)] {
            let p = plan((sw, sh), &spec(380, 250, FitMode::Crop, false));
            assert_eq!(p.output(), (380, 250), "source {sw}x{sh}");
        }
    }

    #[test]
    fn test_crop_is_centered() {
        let p = plan((4000, 3000), &spec(380, 250, FitMode::Crop, false));
        let crop = p.crop.unwrap();
        // Surplus in the non-binding axis is split evenly.
        assert_eq!(crop.y, (p.resize.1 - 250) / 2);
        assert_eq!(crop.x, (p.resize.0 - 380) / 2);
    }

    #[test]
    fn test_crop_does_not_upscale_without_force() {
        let p = plan((300, 200), &spec(380, 250, FitMode::Crop, false));
        assert_eq!(p.resize, (300, 200));
        assert_eq!(p.output(), (300, 200));
    }

    #[test]
    fn test_crop_with_force_upscales_to_cover() {
        let p = plan((300, 200), &spec(380, 250, FitMode::Crop, true));
        assert_eq!(p.output(), (380, 250));
    }

    #[test]
    fn test_2x_doubles_the_box() {
        let t = Transform::new(380, 250, FitMode::Crop);
        let p = plan_variant((4000, 3000), &t, true).unwrap();
        assert_eq!(p.output(), (760, 500));
    }

    #[test]
    fn test_2x_skipped_for_small_sources() {
        // No unwanted upscaling into retina variants.
        let t = Transform::new(380, 250, FitMode::Crop);
        assert!(plan_variant((300, 200), &t, true).is_none());
        assert!(plan_variant((760, 499), &t, true).is_none());
        assert!(plan_variant((759, 500), &t, true).is_none());
    }

    #[test]
    fn test_2x_at_exact_double_size_is_generated() {
        let t = Transform::new(380, 250, FitMode::Crop);
        let p = plan_variant((760, 500), &t, true).unwrap();
        assert_eq!(p.output(), (760, 500));
    }

    #[test]
    fn test_force_2x_overrides_skip() {
        let t = Transform::new(380, 250, FitMode::Crop)
            .with_force(true)
            .with_force_2x();
        let p = plan_variant((300, 200), &t, true).unwrap();
        assert_eq!(p.output(), (760, 500));
    }

    #[test]
    fn test_2x_width_only_transform() {
        let t = Transform::new(500, 0, FitMode::Auto);
        assert!(plan_variant((800, 600), &t, true).is_none());
        let p = plan_variant((2000, 1500), &t, true).unwrap();
        assert_eq!(p.output(), (1000, 750));
    }

    #[test]
    fn test_unconstrained_transform_is_identity() {
        let t = Transform::new(0, 0, FitMode::Auto);
        let p = plan_variant((800, 600), &t, false).unwrap();
        assert!(is_noop((800, 600), &p));
    }

    #[test]
    fn test_plan_determinism() {
        // Planning is a pure function of its inputs.
        let t = Transform::new(380, 250, FitMode::Crop);
        for _ in 0..3 {
            assert_eq!(
                plan_variant((4000, 3000), &t, true),
                plan_variant((4000, 3000), &t, true)
            );
        }
    }

    #[test]
    fn test_outputs_stay_within_box_across_sizes() {
        // No plan output may exceed a non-forced box in a constrained axis
        // beyond the source's own size.
        let t = Transform::new(380, 250, FitMode::Crop);
        for sw in [1u32, 250, 380, 760, 4000] {
            for sh in [1u32, 250, 380, 760, 3000] {
                let p = plan_variant((sw, sh), &t, false).unwrap();
                let (ow, oh) = p.output();
                assert!(ow <= 380.max(sw) && oh <= 250.max(sh), "{sw}x{sh}");
            }
        }
    }
}
