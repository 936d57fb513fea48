// src/host.rs
//
// Injected host collaborators: the optional native bitmap primitive, the
// blob decode primitive, and the cooperative timer. The shim never reaches
// for ambient platform state; everything flows through the Host trait so
// tests can substitute deterministic capability behavior.

use crate::error::{BitmapError, Result};
use crate::options::{
    BitmapOptions, ColorSpaceConversion, CropRect, ImageOrientation, PremultiplyAlpha,
    ResizeQuality,
};
use crate::raster::Raster;
use crate::source::{Blob, BitmapSource, Drawable, PixelBuffer};
use std::future::Future;
use std::io::Cursor;
use std::time::Duration;

/// A native artifact produced by the platform's own bitmap primitive.
pub trait NativeBitmap: Send + Sync + 'static {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    /// One-shot release. Dimension reads return 0 afterwards.
    fn close(&mut self);
}

/// A view over an options record whose key reads are observable.
///
/// Native hosts pull option values through this trait while converting a
/// request. The capability probe passes an instrumented implementation and
/// records which keys the native side actually reads.
pub trait OptionsBag: Send + Sync {
    fn resize_width(&self) -> Option<f64>;
    fn resize_height(&self) -> Option<f64>;
    fn resize_quality(&self) -> Option<ResizeQuality>;
    fn image_orientation(&self) -> Option<ImageOrientation>;
    fn premultiply_alpha(&self) -> Option<PremultiplyAlpha>;
    fn color_space_conversion(&self) -> Option<ColorSpaceConversion>;
}

impl OptionsBag for BitmapOptions {
    fn resize_width(&self) -> Option<f64> {
        self.resize_width
    }

    fn resize_height(&self) -> Option<f64> {
        self.resize_height
    }

    fn resize_quality(&self) -> Option<ResizeQuality> {
        self.resize_quality
    }

    fn image_orientation(&self) -> Option<ImageOrientation> {
        self.image_orientation
    }

    fn premultiply_alpha(&self) -> Option<PremultiplyAlpha> {
        self.premultiply_alpha
    }

    fn color_space_conversion(&self) -> Option<ColorSpaceConversion> {
        self.color_space_conversion
    }
}

/// Borrowed view of a source as handed to the native primitive.
pub enum NativeSource<'a> {
    Drawable(&'a dyn Drawable),
    Blob(&'a Blob),
    Pixels(&'a PixelBuffer),
}

impl BitmapSource {
    pub fn as_native(&self) -> NativeSource<'_> {
        match self {
            Self::Drawable(d) => NativeSource::Drawable(&**d),
            Self::Blob(b) => NativeSource::Blob(b),
            Self::Pixels(p) => NativeSource::Pixels(p),
        }
    }
}

/// One native bitmap-creation call, post argument adjustment.
pub struct NativeRequest<'a> {
    pub source: NativeSource<'a>,
    pub crop: Option<CropRect>,
    pub options: Option<&'a dyn OptionsBag>,
}

/// The host platform the shim runs against.
///
/// Contract for `native_create`: implementations must convert the request —
/// including any reads of the options bag — synchronously, before the
/// returned future is first polled. The synchronous capability probe issues
/// a call it never polls and observes only those reads.
pub trait Host: Send + Sync + 'static {
    type Bitmap: NativeBitmap;

    /// Whether the platform exposes a native bitmap primitive at all.
    /// `false` forces the full polyfill for every call.
    fn has_native(&self) -> bool;

    /// Delegate a creation call to the native primitive.
    fn native_create(
        &self,
        request: NativeRequest<'_>,
    ) -> impl Future<Output = Result<Self::Bitmap>> + Send;

    /// Decode an encoded blob into an RGBA surface. The returned surface is
    /// a temporary owned by the caller and dropped once consumed.
    fn decode_blob(&self, blob: &Blob) -> impl Future<Output = Result<Raster>> + Send;

    /// An inline SVG image element suitable for probing, when the platform
    /// has such a concept. `None` skips the SVG-element probe entirely.
    fn svg_probe_element(&self) -> Option<Box<dyn Drawable>> {
        None
    }

    /// Cooperative timer used by the bounded SVG readiness poll.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// Uninhabited native artifact for hosts without a native primitive.
#[derive(Debug)]
pub enum NoBitmap {}

impl NativeBitmap for NoBitmap {
    fn width(&self) -> u32 {
        match *self {}
    }

    fn height(&self) -> u32 {
        match *self {}
    }

    fn close(&mut self) {
        match *self {}
    }
}

/// Reference host with no native primitive: every call runs the full
/// polyfill, and blobs decode in-process through the `image` crate.
#[derive(Clone, Copy, Debug, Default)]
pub struct SoftwareHost;

impl SoftwareHost {
    pub fn new() -> Self {
        Self
    }
}

fn decode_blob_bytes(blob: &Blob) -> Result<Raster> {
    if blob.is_svg() {
        return Err(BitmapError::decode_failed(
            "the software host has no SVG rasterizer",
        ));
    }
    let reader = image::ImageReader::new(Cursor::new(blob.bytes()))
        .with_guessed_format()
        .map_err(|e| BitmapError::decode_failed(format!("failed to read image header: {e}")))?;
    let decoded = reader
        .decode()
        .map_err(|e| BitmapError::decode_failed(format!("failed to decode image: {e}")))?;
    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    Raster::from_rgba(width, height, rgba.into_raw())
}

impl Host for SoftwareHost {
    type Bitmap = NoBitmap;

    fn has_native(&self) -> bool {
        false
    }

    fn native_create(
        &self,
        _request: NativeRequest<'_>,
    ) -> impl Future<Output = Result<Self::Bitmap>> + Send {
        std::future::ready(Err(BitmapError::native_failed(
            "this host has no native bitmap primitive",
        )))
    }

    fn decode_blob(&self, blob: &Blob) -> impl Future<Output = Result<Raster>> + Send {
        std::future::ready(decode_blob_bytes(blob))
    }

    fn sleep(&self, _duration: Duration) -> impl Future<Output = ()> + Send {
        // Nothing ever probes a native-less host, so no real timer is needed.
        std::future::ready(())
    }
}
