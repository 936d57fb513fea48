// src/geometry.rs
//
// Geometry engine: safe source/destination rectangle computation.
//
// Some hosts refuse to sample outside the source's boundaries, so the crop
// rectangle must be clamped before drawing. The destination rectangle is
// scaled by the *pre-clamp* requested extents so that clamping never
// stretches the visible content.

use crate::options::{CropRect, ResizeQuality, ResolvedOptions};

/// Fully resolved, clamped source/destination rectangle pair.
///
/// Invariants:
/// - `(sx, sy, sw, sh)` lies inside `[0, intrinsic_width] x [0, intrinsic_height]`
/// - `(dw, dh)` equals the clamped source extent times the requested scale
///   ratio, and `(dx, dy)` offsets the destination by the scaled amount
///   clamped away from a negative origin
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SafeRect {
    pub sx: f64,
    pub sy: f64,
    pub sw: f64,
    pub sh: f64,
    pub dx: f64,
    pub dy: f64,
    pub dw: f64,
    pub dh: f64,
}

impl SafeRect {
    /// True when the clamped source sub-rectangle has no area. Legal: an
    /// empty rect draws nothing and yields an empty artifact, not an error.
    pub fn is_empty(&self) -> bool {
        self.sw <= 0.0 || self.sh <= 0.0
    }
}

/// Compute the safe rectangle pair for a crop/resize request.
///
/// `resize` carries the requested destination extents; a `None` axis
/// defaults to the absolute requested crop extent on that axis (no resize).
///
/// This function never rejects input. Range validation of the raw arguments
/// is the parser's concern; zero-area results are valid.
pub fn compute_safe_rect(
    intrinsic_width: u32,
    intrinsic_height: u32,
    crop: CropRect,
    resize: (Option<u32>, Option<u32>),
) -> SafeRect {
    let mut sx = crop.sx as f64;
    let mut sy = crop.sy as f64;
    let mut sw = crop.sw as f64;
    let mut sh = crop.sh as f64;

    // A negative extent measures backward from the origin.
    if sw < 0.0 {
        sx += sw;
        sw = -sw;
    }
    if sh < 0.0 {
        sy += sh;
        sh = -sh;
    }

    let dw = resize.0.map(|w| w as f64).unwrap_or(sw);
    let dh = resize.1.map(|h| h as f64).unwrap_or(sh);

    let x1 = sx.max(0.0);
    let x2 = (sx + sw).min(intrinsic_width as f64);
    let y1 = sy.max(0.0);
    let y2 = (sy + sh).min(intrinsic_height as f64);

    let clamped_w = (x2 - x1).max(0.0);
    let clamped_h = (y2 - y1).max(0.0);

    // Ratios use the pre-clamp requested extents to preserve the caller's
    // intended scale factor.
    let w_ratio = if sw == 0.0 { 0.0 } else { dw / sw };
    let h_ratio = if sh == 0.0 { 0.0 } else { dh / sh };

    SafeRect {
        sx: x1,
        sy: y1,
        sw: clamped_w,
        sh: clamped_h,
        dx: if sx < 0.0 { -sx * w_ratio } else { 0.0 },
        dy: if sy < 0.0 { -sy * h_ratio } else { 0.0 },
        dw: clamped_w * w_ratio,
        dh: clamped_h * h_ratio,
    }
}

/// A complete drawing plan for the compositing pipeline: the safe rectangle
/// plus the output surface extent, orientation and quality hint.
///
/// The surface extent is the *requested* destination extent (pre-clamp), so
/// a partially out-of-bounds crop still produces a surface of the size the
/// caller asked for, with the visible content mapped into its sub-region.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawPlan {
    pub rect: SafeRect,
    pub surface_width: u32,
    pub surface_height: u32,
    pub flip_y: bool,
    pub quality: Option<ResizeQuality>,
}

/// Merge an optional crop rectangle and validated options into a [`DrawPlan`]
/// for a source with the given intrinsic dimensions.
pub fn resolve_draw_plan(
    intrinsic_width: u32,
    intrinsic_height: u32,
    crop: Option<CropRect>,
    options: &ResolvedOptions,
) -> DrawPlan {
    let crop = crop.unwrap_or(CropRect::new(
        0,
        0,
        intrinsic_width.min(i32::MAX as u32) as i32,
        intrinsic_height.min(i32::MAX as u32) as i32,
    ));

    let rect = compute_safe_rect(
        intrinsic_width,
        intrinsic_height,
        crop,
        (options.resize_width, options.resize_height),
    );

    DrawPlan {
        rect,
        surface_width: options.resize_width.unwrap_or(crop.sw.unsigned_abs()),
        surface_height: options.resize_height.unwrap_or(crop.sh.unsigned_abs()),
        flip_y: options.flip_y,
        quality: options.quality,
    }
}
