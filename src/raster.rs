// src/raster.rs
//
// Software RGBA drawing surface used by the polyfill path.
//
// This is the off-screen surface the compositing pipeline draws onto when
// the native primitive cannot be used: allocate, draw a sub-rectangle with
// a quality hint, translate raw pixel writes, mirror vertically.

use crate::error::{BitmapError, Result};
use crate::geometry::SafeRect;
use crate::options::ResizeQuality;
use crate::source::{Drawable, DrawableKind};
use fast_image_resize::{self as fir, ImageBufferError, MulDiv, PixelType, ResizeOptions};

/// Largest surface extent we will allocate on either axis.
pub const MAX_DIMENSION: u32 = 32_768;

const BYTES_PER_PIXEL: usize = 4;

/// An owned RGBA8 pixel surface, row-major, tightly packed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Raster {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Raster {
    /// Allocate a transparent surface. Zero extents are valid and produce an
    /// empty surface; extents beyond [`MAX_DIMENSION`] fail with
    /// `AllocationFailure`.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(BitmapError::allocation_failure(width, height));
        }
        let bytes = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(BYTES_PER_PIXEL))
            .ok_or_else(|| BitmapError::allocation_failure(width, height))?;
        Ok(Self {
            width,
            height,
            data: vec![0; bytes],
        })
    }

    /// Wrap an existing RGBA byte buffer. The buffer length must match the
    /// extents exactly.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let surface = Self::new(width, height)?;
        if data.len() != surface.data.len() {
            return Err(BitmapError::invalid_source_state(format!(
                "pixel buffer length {} does not match {width}x{height} RGBA extents",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Single pixel read, mostly for tests. Panics out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        assert!(x < self.width && y < self.height, "pixel read out of bounds");
        let idx = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        [
            self.data[idx],
            self.data[idx + 1],
            self.data[idx + 2],
            self.data[idx + 3],
        ]
    }

    pub fn put_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        assert!(x < self.width && y < self.height, "pixel write out of bounds");
        let idx = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        self.data[idx..idx + BYTES_PER_PIXEL].copy_from_slice(&rgba);
    }

    /// Drop the backing pixels and report zero extents from now on. This is
    /// the closest thing to detaching the surface's buffer, and backs the
    /// emulated artifact's one-shot close.
    pub fn release(&mut self) {
        self.width = 0;
        self.height = 0;
        self.data = Vec::new();
    }

    /// Draw a sub-rectangle of `src` into this surface per the safe rect,
    /// scaling with the requested quality hint. Destination pixels inside
    /// the drawn region are replaced, not blended. Empty rects draw nothing.
    pub fn draw(&mut self, src: &Raster, rect: &SafeRect, quality: Option<ResizeQuality>) -> Result<()> {
        let sx = rect.sx.round().clamp(0.0, src.width as f64) as u32;
        let sy = rect.sy.round().clamp(0.0, src.height as f64) as u32;
        let sw = (rect.sw.round() as u32).min(src.width.saturating_sub(sx));
        let sh = (rect.sh.round() as u32).min(src.height.saturating_sub(sy));
        let dw = rect.dw.round() as i64;
        let dh = rect.dh.round() as i64;
        if sw == 0 || sh == 0 || dw <= 0 || dh <= 0 {
            return Ok(());
        }
        let (dw, dh) = (dw as u32, dh as u32);

        let tile = src.crop_copy(sx, sy, sw, sh)?;
        let scaled = if (sw, sh) == (dw, dh) {
            tile
        } else {
            scale_tile(tile, dw, dh, quality)?
        };

        self.blit(&scaled, rect.dx.round() as i64, rect.dy.round() as i64);
        Ok(())
    }

    /// Copy the region of a raw RGBA buffer starting at `(rx, ry)` into this
    /// surface, so that target pixel `(tx, ty)` receives source pixel
    /// `(rx + tx, ry + ty)`. Out-of-bounds source pixels are skipped. This is
    /// the pixel-array-offset translation used for raw-buffer sources; no
    /// draw call is involved.
    ///
    /// `data` must hold at least `buf_width * buf_height` RGBA pixels.
    pub fn copy_from_buffer(&mut self, data: &[u8], buf_width: u32, buf_height: u32, rx: i64, ry: i64) {
        debug_assert!(
            data.len() >= buf_width as usize * buf_height as usize * BYTES_PER_PIXEL,
            "buffer shorter than its declared {buf_width}x{buf_height} RGBA extents"
        );
        for ty in 0..self.height as i64 {
            let src_y = ry + ty;
            if src_y < 0 || src_y >= buf_height as i64 {
                continue;
            }
            // Overlap of [rx, rx + self.width) with [0, buf_width)
            let x_start = rx.max(0);
            let x_end = (rx + self.width as i64).min(buf_width as i64);
            if x_start >= x_end {
                continue;
            }
            let run = (x_end - x_start) as usize * BYTES_PER_PIXEL;
            let src_idx = (src_y as usize * buf_width as usize + x_start as usize) * BYTES_PER_PIXEL;
            let dst_idx = (ty as usize * self.width as usize + (x_start - rx) as usize) * BYTES_PER_PIXEL;
            self.data[dst_idx..dst_idx + run].copy_from_slice(&data[src_idx..src_idx + run]);
        }
    }

    /// Mirror the surface about its own vertical midline, replacing every
    /// destination pixel (the flipped copy does not blend with the original).
    pub fn flip_vertical(&mut self) {
        if self.height < 2 {
            return;
        }
        let stride = self.width as usize * BYTES_PER_PIXEL;
        let (mut top, mut bottom) = (0, self.height as usize - 1);
        while top < bottom {
            let (head, tail) = self.data.split_at_mut(bottom * stride);
            head[top * stride..top * stride + stride].swap_with_slice(&mut tail[..stride]);
            top += 1;
            bottom -= 1;
        }
    }

    fn crop_copy(&self, x: u32, y: u32, w: u32, h: u32) -> Result<Raster> {
        let mut out = Raster::new(w, h)?;
        out.copy_from_buffer(&self.data, self.width, self.height, x as i64, y as i64);
        Ok(out)
    }

    /// Overwrite pixels of `self` with `src` placed at `(dx, dy)`, clipping
    /// to this surface's bounds.
    fn blit(&mut self, src: &Raster, dx: i64, dy: i64) {
        for sy in 0..src.height as i64 {
            let ty = dy + sy;
            if ty < 0 || ty >= self.height as i64 {
                continue;
            }
            let x_start = dx.max(0);
            let x_end = (dx + src.width as i64).min(self.width as i64);
            if x_start >= x_end {
                continue;
            }
            let run = (x_end - x_start) as usize * BYTES_PER_PIXEL;
            let src_idx = (sy as usize * src.width as usize + (x_start - dx) as usize) * BYTES_PER_PIXEL;
            let dst_idx = (ty as usize * self.width as usize + x_start as usize) * BYTES_PER_PIXEL;
            self.data[dst_idx..dst_idx + run].copy_from_slice(&src.data[src_idx..src_idx + run]);
        }
    }
}

// A produced surface is itself drawable, which lets a polyfill result be
// handed back to the native primitive for conversion into a true artifact.
impl Drawable for Raster {
    fn kind(&self) -> DrawableKind {
        DrawableKind::Canvas
    }

    fn intrinsic_size(&self) -> Option<(u32, u32)> {
        Some((self.width, self.height))
    }

    fn snapshot(&self) -> Result<Raster> {
        Ok(self.clone())
    }
}

fn resize_alg(quality: Option<ResizeQuality>) -> fir::ResizeAlg {
    match quality {
        Some(ResizeQuality::Pixelated) => fir::ResizeAlg::Nearest,
        // "low" matches the default smoothing level
        Some(ResizeQuality::Low) | None => fir::ResizeAlg::Convolution(fir::FilterType::Bilinear),
        Some(ResizeQuality::Medium) => fir::ResizeAlg::Convolution(fir::FilterType::CatmullRom),
        Some(ResizeQuality::High) => fir::ResizeAlg::Convolution(fir::FilterType::Lanczos3),
    }
}

/// Scale an RGBA tile to the destination extent. Alpha is premultiplied
/// around convolution so translucent edges don't bleed.
fn scale_tile(mut tile: Raster, dst_width: u32, dst_height: u32, quality: Option<ResizeQuality>) -> Result<Raster> {
    let (src_width, src_height) = (tile.width, tile.height);
    let mut src_image =
        match fir::images::Image::from_slice_u8(src_width, src_height, &mut tile.data, PixelType::U8x4) {
            Ok(image) => image,
            Err(ImageBufferError::InvalidBufferAlignment) => {
                // Vec<u8> carries no alignment guarantee; fall back to fir's
                // own aligned allocation.
                let mut aligned = fir::images::Image::new(src_width, src_height, PixelType::U8x4);
                aligned.buffer_mut().copy_from_slice(&tile.data);
                aligned
            }
            Err(other) => {
                return Err(BitmapError::internal(format!("resize source image error: {other:?}")));
            }
        };
    let mut dst_image = fir::images::Image::new(dst_width, dst_height, PixelType::U8x4);

    let alg = resize_alg(quality);
    let needs_premultiply = !matches!(alg, fir::ResizeAlg::Nearest);
    let mul_div = MulDiv::default();
    if needs_premultiply {
        mul_div
            .multiply_alpha_inplace(&mut src_image)
            .map_err(|e| BitmapError::internal(format!("failed to premultiply alpha: {e}")))?;
    }

    let mut resizer = fir::Resizer::new();
    resizer
        .resize(&src_image, &mut dst_image, &ResizeOptions::new().resize_alg(alg))
        .map_err(|e| BitmapError::internal(format!("resize error: {e:?}")))?;

    if needs_premultiply {
        mul_div
            .divide_alpha_inplace(&mut dst_image)
            .map_err(|e| BitmapError::internal(format!("failed to unpremultiply alpha: {e}")))?;
    }

    Raster::from_rgba(dst_width, dst_height, dst_image.into_vec())
}
