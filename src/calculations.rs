//! Pure calculation functions for version dimensions and cropping.
//!
//! All functions here are pure and testable without any I/O or images.

/// How far a natural aspect ratio may deviate from a preset's forced ratio
/// before one dimension is clamped to correct it.
pub const ASPECT_TOLERANCE: f64 = 0.01;

/// Calculate output dimensions for a version.
///
/// The longer source edge is scaled to `max_dimension` (never upscaled
/// beyond the source), preserving aspect ratio. When `aspect` is given and
/// the natural ratio deviates from it by more than [`ASPECT_TOLERANCE`], the
/// shorter dimension is clamped so the output matches the forced ratio.
///
/// # Arguments
/// * `source` - Source image dimensions (width, height)
/// * `max_dimension` - Target size of the longer edge in pixels
/// * `aspect` - Optional forced aspect ratio as (width, height)
///
/// # Returns
/// * `(width, height)` - Final version dimensions
pub fn version_dimensions(
    source: (u32, u32),
    max_dimension: u32,
    aspect: Option<(u32, u32)>,
) -> (u32, u32) {
    let (src_w, src_h) = source;
    let longer = src_w.max(src_h);
    let target = max_dimension.min(longer);

    let (mut w, mut h) = if src_w >= src_h {
        // Landscape or square
        let ratio = target as f64 / src_w as f64;
        (target, (src_h as f64 * ratio).round() as u32)
    } else {
        // Portrait
        let ratio = target as f64 / src_h as f64;
        ((src_w as f64 * ratio).round() as u32, target)
    };

    if let Some((aw, ah)) = aspect {
        let forced = aw as f64 / ah as f64;
        let natural = w as f64 / h as f64;
        if (natural - forced).abs() > ASPECT_TOLERANCE {
            // Clamp the non-leading dimension so the ratio holds exactly.
            if src_w >= src_h {
                h = (w as f64 / forced).round().max(1.0) as u32;
            } else {
                w = (h as f64 * forced).round().max(1.0) as u32;
            }
        }
    }

    (w.max(1), h.max(1))
}

/// Calculate dimensions needed to fill a target area (resize before crop).
///
/// Returns dimensions that completely cover the target area while maintaining
/// the source aspect ratio. One dimension will match exactly, the other may
/// exceed — the excess is removed by a center crop.
pub fn fill_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    let src_aspect = src_w as f64 / src_h as f64;
    let tgt_aspect = tgt_w as f64 / tgt_h as f64;

    if src_aspect > tgt_aspect {
        // Source is wider: height will match, width will exceed
        let h = tgt_h;
        let w = (h as f64 * src_aspect).round() as u32;
        (w.max(tgt_w), h)
    } else {
        // Source is taller: width will match, height will exceed
        let w = tgt_w;
        let h = (w as f64 / src_aspect).round() as u32;
        (w, h.max(tgt_h))
    }
}

/// Top-left origin of a centered crop of `target` out of `filled`.
///
/// `filled` must cover `target` in both dimensions (see [`fill_dimensions`]).
pub fn crop_origin(filled: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    ((filled.0 - target.0) / 2, (filled.1 - target.1) / 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // version_dimensions tests
    // =========================================================================

    #[test]
    fn version_scales_longer_edge_landscape() {
        // 2000x1500 landscape, max 864 → 864x648
        assert_eq!(version_dimensions((2000, 1500), 864, None), (864, 648));
    }

    #[test]
    fn version_scales_longer_edge_portrait() {
        // 1500x2000 portrait, max 1000 → 750x1000
        assert_eq!(version_dimensions((1500, 2000), 1000, None), (750, 1000));
    }

    #[test]
    fn version_never_upscales() {
        // Source smaller than max dimension keeps its own size
        assert_eq!(version_dimensions((500, 400), 800, None), (500, 400));
    }

    #[test]
    fn version_matching_aspect_left_alone() {
        // 4:3 source with forced 4:3 deviates by 0 — no clamp
        assert_eq!(
            version_dimensions((2000, 1500), 864, Some((4, 3))),
            (864, 648)
        );
    }

    #[test]
    fn version_forces_aspect_on_landscape() {
        // 16:9 source forced to 4:3: width leads, height clamped up
        let (w, h) = version_dimensions((1920, 1080), 800, Some((4, 3)));
        assert_eq!(w, 800);
        assert_eq!(h, 600);
    }

    #[test]
    fn version_forces_aspect_on_portrait() {
        // 9:16 source forced to 3:4: height leads, width clamped
        let (w, h) = version_dimensions((1080, 1920), 800, Some((3, 4)));
        assert_eq!(h, 800);
        assert_eq!(w, 600);
    }

    #[test]
    fn version_small_deviation_not_clamped() {
        // 400x300 is 1.3333; forced ratio 1.3360 deviates by ~0.0027 < 0.01
        let (w, h) = version_dimensions((400, 300), 400, Some((668, 500)));
        assert_eq!((w, h), (400, 300));
    }

    // =========================================================================
    // fill_dimensions tests
    // =========================================================================

    #[test]
    fn fill_wider_source_to_portrait_target() {
        // 800x600 (4:3) → 400x500 target
        // Source is wider, so height matches: 500, width = 500 * (4/3) = 667
        assert_eq!(fill_dimensions((800, 600), (400, 500)), (667, 500));
    }

    #[test]
    fn fill_taller_source_to_landscape_target() {
        // 600x800 (3:4) → 500x400 target
        assert_eq!(fill_dimensions((600, 800), (500, 400)), (500, 667));
    }

    #[test]
    fn fill_same_aspect_ratio() {
        assert_eq!(fill_dimensions((800, 600), (400, 300)), (400, 300));
    }

    // =========================================================================
    // crop_origin tests
    // =========================================================================

    #[test]
    fn crop_origin_centers_excess_width() {
        assert_eq!(crop_origin((667, 500), (400, 500)), (133, 0));
    }

    #[test]
    fn crop_origin_centers_excess_height() {
        assert_eq!(crop_origin((500, 667), (500, 400)), (0, 133));
    }

    #[test]
    fn crop_origin_zero_when_exact() {
        assert_eq!(crop_origin((400, 300), (400, 300)), (0, 0));
    }
}
