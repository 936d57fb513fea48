// src/source.rs
//
// Source descriptors: the tagged union of input categories and the
// usability checks that gate the polyfill path.

use crate::error::{BitmapError, Result};
use crate::raster::Raster;
use std::fmt;
use std::sync::Arc;

/// MIME type that marks an encoded blob as SVG for dispatch purposes.
pub const SVG_MIME: &str = "image/svg+xml";

/// What kind of drawable element a source is. The SVG-image kind drives the
/// extra capability probe and conversion handling; canvases and existing
/// bitmaps share the zero-size usability rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawableKind {
    Image,
    Video,
    Canvas,
    Bitmap,
    SvgImage,
}

/// Outcome of a usability probe that could not fail outright.
///
/// `Maybe` is the indeterminate answer observed for inline SVG images on
/// some hosts; callers proceed optimistically.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Usability {
    Usable,
    Maybe,
}

/// Any source that can be painted directly onto a surface without prior
/// decoding.
pub trait Drawable: Send + Sync {
    fn kind(&self) -> DrawableKind;

    /// Intrinsic dimensions, or `None` when the host exposes no intrinsic
    /// size for this element (inline SVG images).
    fn intrinsic_size(&self) -> Option<(u32, u32)>;

    /// Snapshot the element's current contents as an RGBA surface.
    fn snapshot(&self) -> Result<Raster>;

    /// Host-specific usability probe beyond the dimension checks. A broken
    /// element returns `Err`; an indeterminate answer returns `Ok(Maybe)`.
    fn probe_usable(&self) -> Result<Usability> {
        Ok(Usability::Usable)
    }
}

/// An encoded image payload with a declared MIME type.
#[derive(Clone, Debug)]
pub struct Blob {
    bytes: Arc<[u8]>,
    mime: String,
}

impl Blob {
    pub fn new(bytes: impl Into<Arc<[u8]>>, mime: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime: mime.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    /// Strict check: a blob only counts as SVG when its declared type says so.
    pub fn is_svg(&self) -> bool {
        self.mime == SVG_MIME
    }
}

/// A raw RGBA pixel buffer with explicit dimensions. The backing store can
/// be detached, after which the source is unusable.
#[derive(Clone, Debug)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Option<Arc<[u8]>>,
}

impl PixelBuffer {
    /// The buffer length must be exactly `width * height * 4`.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| BitmapError::allocation_failure(width, height))?;
        if data.len() != expected {
            return Err(BitmapError::invalid_source_state(format!(
                "pixel buffer length {} does not match {width}x{height} RGBA extents",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data: Some(data.into()),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// `None` once the backing store has been detached.
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// Release the backing store. Subsequent polyfill calls against this
    /// buffer fail with an invalid-state error before any drawing occurs.
    pub fn detach(&mut self) {
        self.data = None;
    }

    pub fn is_detached(&self) -> bool {
        self.data.is_none()
    }
}

/// The tagged union of supported input categories. Exactly one category
/// applies per call and selects the dimension-extraction and drawing
/// strategy.
pub enum BitmapSource {
    Drawable(Box<dyn Drawable>),
    Blob(Blob),
    Pixels(PixelBuffer),
}

impl BitmapSource {
    pub fn drawable(element: impl Drawable + 'static) -> Self {
        Self::Drawable(Box::new(element))
    }

    /// Whether this source's category is resolved by the asynchronous
    /// capability phase. Such calls suspend until the phase settles; all
    /// other calls never wait on it.
    pub fn needs_async_probe(&self) -> bool {
        match self {
            Self::Blob(_) | Self::Pixels(_) => true,
            Self::Drawable(d) => d.kind() == DrawableKind::SvgImage,
        }
    }
}

impl fmt::Debug for BitmapSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Drawable(d) => f.debug_tuple("Drawable").field(&d.kind()).finish(),
            Self::Blob(b) => f.debug_tuple("Blob").field(&b.mime).finish(),
            Self::Pixels(p) => f
                .debug_tuple("Pixels")
                .field(&(p.width, p.height))
                .finish(),
        }
    }
}

/// Check the usability of a drawable element before drawing it.
///
/// Canvas-like sources (canvases, existing bitmaps) are invalid exactly when
/// either extent is zero; a detached bitmap reports zero extents, so the same
/// rule covers it. Image-like sources additionally run the host's own probe,
/// which may come back indeterminate.
pub fn check_usability(element: &dyn Drawable) -> Result<Usability> {
    match element.kind() {
        DrawableKind::Canvas | DrawableKind::Bitmap => match element.intrinsic_size() {
            Some((0, _)) | Some((_, 0)) | None => Err(BitmapError::invalid_image_state()),
            Some(_) => Ok(Usability::Usable),
        },
        DrawableKind::Image | DrawableKind::Video | DrawableKind::SvgImage => {
            if let Some((w, h)) = element.intrinsic_size() {
                if w == 0 || h == 0 {
                    return Err(BitmapError::invalid_image_state());
                }
            }
            element.probe_usable()
        }
    }
}
