// src/bitmap.rs
//
// The produced artifact: either a genuine native bitmap or an emulated one
// wrapping a software surface. Behavior is selected by tag, never by
// runtime type mutation.

use crate::error::Result;
use crate::host::{Host, NativeBitmap, NativeRequest, NativeSource};
use crate::raster::Raster;

/// Emulated artifact for hosts without a native bitmap concept.
///
/// There is no true buffer-release available, so closing sets the wrapped
/// surface's dimensions to zero; subsequent dimension reads return 0.
#[derive(Debug)]
pub struct EmulatedBitmap {
    surface: Raster,
}

impl EmulatedBitmap {
    pub(crate) fn new(surface: Raster) -> Self {
        Self { surface }
    }

    pub fn width(&self) -> u32 {
        self.surface.width()
    }

    pub fn height(&self) -> u32 {
        self.surface.height()
    }

    pub fn close(&mut self) {
        self.surface.release();
    }

    /// The wrapped surface's pixels, for hosts that want to keep drawing
    /// with the artifact. Empty after close.
    pub fn surface(&self) -> &Raster {
        &self.surface
    }
}

/// The bitmap-like result object returned to the caller.
pub enum ImageBitmap<H: Host> {
    Native(H::Bitmap),
    Emulated(EmulatedBitmap),
}

impl<H: Host> ImageBitmap<H> {
    /// Wrap a polyfill-produced surface. When the host has a native
    /// primitive the surface is converted through one more native call so
    /// the caller receives a genuine native artifact; otherwise it is
    /// wrapped in the emulated variant.
    pub(crate) async fn from_surface(host: &H, surface: Raster) -> Result<Self> {
        if host.has_native() {
            let request = NativeRequest {
                source: NativeSource::Drawable(&surface),
                crop: None,
                options: None,
            };
            return Ok(Self::Native(host.native_create(request).await?));
        }
        Ok(Self::Emulated(EmulatedBitmap::new(surface)))
    }

    pub fn width(&self) -> u32 {
        match self {
            Self::Native(bitmap) => bitmap.width(),
            Self::Emulated(emulated) => emulated.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            Self::Native(bitmap) => bitmap.height(),
            Self::Emulated(emulated) => emulated.height(),
        }
    }

    /// Release the artifact. One-shot: dimension reads return 0 afterwards.
    pub fn close(&mut self) {
        match self {
            Self::Native(bitmap) => bitmap.close(),
            Self::Emulated(emulated) => emulated.close(),
        }
    }

    /// Type tag reported for introspection compatibility.
    pub fn type_name(&self) -> &'static str {
        "ImageBitmap"
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Self::Native(_))
    }
}

impl<H: Host> std::fmt::Debug for ImageBitmap<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(self.type_name())
            .field("width", &self.width())
            .field("height", &self.height())
            .field("native", &self.is_native())
            .finish()
    }
}
