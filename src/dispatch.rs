// src/dispatch.rs
//
// Dispatch policy: native passthrough, adjusted passthrough, or polyfill.
//
// The guiding rule: never force a call through the slow polyfill merely
// because *some* obscure feature is unsupported — only when this specific
// call actually needs a missing capability.

use crate::capabilities::Capabilities;
use crate::options::BitmapOptions;
use crate::source::{BitmapSource, DrawableKind};

/// Per-call routing decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// Nothing is missing; hand the call to the native primitive untouched.
    Native,
    /// The native primitive can serve this call, possibly with the trailing
    /// options record stripped (when the native side is known not to
    /// tolerate an options argument at all).
    NativeAdjusted { drop_options: bool },
    /// Run the full polyfill path.
    Polyfill,
}

/// Decide how to route one call given the current missing set.
///
/// `arity` is the call's total argument count including the source;
/// argument lists of exactly 2 or exactly 6 end in an options record, which
/// is the shape a native primitive without options support chokes on.
pub fn decide(
    missing: Capabilities,
    has_native: bool,
    source: &BitmapSource,
    options: &BitmapOptions,
    arity: usize,
) -> Dispatch {
    if missing.is_empty() {
        return Dispatch::Native;
    }

    if has_native && !requires_polyfill(missing, source, options) {
        let drop_options =
            missing.contains(Capabilities::OPTIONS_BAG) && matches!(arity, 2 | 6);
        return Dispatch::NativeAdjusted { drop_options };
    }

    Dispatch::Polyfill
}

fn requires_polyfill(
    missing: Capabilities,
    source: &BitmapSource,
    options: &BitmapOptions,
) -> bool {
    let source_missing = match source {
        BitmapSource::Blob(blob) => {
            missing.contains(Capabilities::BLOB_SOURCE)
                || (blob.is_svg() && missing.contains(Capabilities::SVG_BLOB_SOURCE))
        }
        BitmapSource::Pixels(_) => missing.contains(Capabilities::PIXEL_SOURCE),
        BitmapSource::Drawable(element) => {
            element.kind() == DrawableKind::SvgImage
                && missing.contains(Capabilities::SVG_ELEMENT_SOURCE)
        }
    };

    source_missing || missing.intersects(options.present_keys())
}
