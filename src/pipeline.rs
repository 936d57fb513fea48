// src/pipeline.rs
//
// The cropping/compositing pipeline: one entry per source category, all
// converging on a common draw step against a software surface.

use crate::error::{BitmapError, Result};
use crate::geometry::{resolve_draw_plan, DrawPlan};
use crate::host::Host;
use crate::options::ParsedCall;
use crate::raster::Raster;
use crate::source::{check_usability, BitmapSource, Blob, Drawable, PixelBuffer};
use tracing::debug;

/// Run the full polyfill for one call, producing the cropped surface.
pub(crate) async fn run_polyfill<H: Host>(
    host: &H,
    source: &BitmapSource,
    call: &ParsedCall,
) -> Result<Raster> {
    match source {
        BitmapSource::Drawable(element) => crop_drawable(&**element, call),
        BitmapSource::Blob(blob) => crop_blob(host, blob, call).await,
        BitmapSource::Pixels(pixels) => crop_pixels(pixels, call),
    }
}

/// Drawable-element path: snapshot, then one quality-aware draw into a
/// surface sized to the requested destination extent, with an optional
/// vertical mirror pass.
fn crop_drawable(element: &dyn Drawable, call: &ParsedCall) -> Result<Raster> {
    // An indeterminate outcome proceeds optimistically; only a definite
    // failure aborts.
    let _usability = check_usability(element)?;

    let snapshot = element.snapshot()?;
    let (width, height) = element
        .intrinsic_size()
        .unwrap_or((snapshot.width(), snapshot.height()));

    // A source with no pixels at all can only be satisfied when both
    // destination extents are explicit.
    if width == 0
        && height == 0
        && (call.resolved.resize_width.is_none() || call.resolved.resize_height.is_none())
    {
        return Err(BitmapError::invalid_image_state());
    }

    let plan = resolve_draw_plan(width, height, call.crop, &call.resolved);
    debug!(?plan, "drawable polyfill plan");
    draw_onto_plan(&snapshot, &plan)
}

/// Encoded-blob path: decode through the host, then the drawable path. The
/// decoded surface is a temporary; ownership here drops it whether the draw
/// succeeds or fails.
async fn crop_blob<H: Host>(host: &H, blob: &Blob, call: &ParsedCall) -> Result<Raster> {
    let decoded = host.decode_blob(blob).await?;
    let plan = resolve_draw_plan(decoded.width(), decoded.height(), call.crop, &call.resolved);
    debug!(?plan, mime = blob.mime(), "blob polyfill plan");
    draw_onto_plan(&decoded, &plan)
}

/// Raw-pixel-buffer path. The buffer is not drawable, so the crop rect is
/// honored by translating pixel-array offsets into an intermediate surface;
/// a second draw happens only when a resize or flip was requested.
fn crop_pixels(pixels: &PixelBuffer, call: &ParsedCall) -> Result<Raster> {
    let data = pixels
        .data()
        .ok_or_else(|| BitmapError::invalid_source_state("pixel buffer has been detached"))?;

    let (sx, sy, sw, sh) = match call.crop {
        Some(rect) => (rect.sx as i64, rect.sy as i64, rect.sw as i64, rect.sh as i64),
        None => (0, 0, pixels.width() as i64, pixels.height() as i64),
    };

    // Negative extents measure backward from the origin.
    let rx = if sw < 0 { sx + sw } else { sx };
    let ry = if sh < 0 { sy + sh } else { sy };
    let rw = sw.unsigned_abs() as u32;
    let rh = sh.unsigned_abs() as u32;

    let mut intermediate = Raster::new(rw, rh)?;
    intermediate.copy_from_buffer(data, pixels.width(), pixels.height(), rx, ry);

    let wants_resize =
        call.resolved.resize_width.is_some() || call.resolved.resize_height.is_some();
    if !wants_resize && !call.resolved.flip_y {
        // The intermediate surface *is* the final surface.
        return Ok(intermediate);
    }

    let out_width = call.resolved.resize_width.unwrap_or(rw);
    let out_height = call.resolved.resize_height.unwrap_or(rh);
    let plan = DrawPlan {
        rect: crate::geometry::SafeRect {
            sx: 0.0,
            sy: 0.0,
            sw: rw as f64,
            sh: rh as f64,
            dx: 0.0,
            dy: 0.0,
            dw: out_width as f64,
            dh: out_height as f64,
        },
        surface_width: out_width,
        surface_height: out_height,
        flip_y: call.resolved.flip_y,
        quality: call.resolved.quality,
    };
    debug!(?plan, "pixel-buffer redraw plan");
    draw_onto_plan(&intermediate, &plan)
}

/// The common draw step every path converges on.
fn draw_onto_plan(source: &Raster, plan: &DrawPlan) -> Result<Raster> {
    let mut surface = Raster::new(plan.surface_width, plan.surface_height)?;
    surface.draw(source, &plan.rect, plan.quality)?;
    if plan.flip_y {
        surface.flip_vertical();
    }
    Ok(surface)
}
