// lib.rs
//
// bitmap-shim: a feature-detection driven compatibility engine for
// asynchronous bitmap creation.
//
// Design goals:
// - Probe once per process what the native primitive really supports
// - Delegate to the native path whenever the specific call allows it
// - Pixel-correct crop/resize/orientation polyfill otherwise
// - Deterministic: all host state flows through an injected trait

pub mod bitmap;
pub mod capabilities;
pub mod dispatch;
pub mod error;
pub mod geometry;
pub mod host;
pub mod options;
pub mod pipeline;
pub mod raster;
pub mod shim;
pub mod source;

pub use bitmap::{EmulatedBitmap, ImageBitmap};
pub use capabilities::{Capabilities, OptionsSniffer};
pub use dispatch::{decide, Dispatch};
pub use error::{BitmapError, Result};
pub use geometry::{compute_safe_rect, resolve_draw_plan, DrawPlan, SafeRect};
pub use host::{Host, NativeBitmap, NativeRequest, NativeSource, NoBitmap, OptionsBag, SoftwareHost};
pub use options::{
    parse_call, BitmapOptions, CallArg, ColorSpaceConversion, CropRect, ImageOrientation,
    ParsedCall, PremultiplyAlpha, ResizeQuality, ResolvedOptions,
};
pub use raster::Raster;
pub use shim::BitmapShim;
pub use source::{
    check_usability, BitmapSource, Blob, Drawable, DrawableKind, PixelBuffer, Usability,
    SVG_MIME,
};
