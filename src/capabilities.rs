// src/capabilities.rs
//
// Capability probing: which argument shapes and source types the native
// primitive actually supports.
//
// Two phases, both once per shim. The synchronous phase runs at
// construction and observes which option keys the native side reads while
// converting a call it never awaits. The asynchronous phase issues one real
// 1x1 creation per candidate source category and checks the produced
// artifact, unioning the results into the shared missing-set exactly once.

use crate::host::{Host, NativeBitmap, NativeRequest, NativeSource, OptionsBag};
use crate::options::{
    ColorSpaceConversion, ImageOrientation, PremultiplyAlpha, ResizeQuality,
};
use crate::source::{check_usability, Blob, PixelBuffer, SVG_MIME};
use bitflags::bitflags;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::debug;

bitflags! {
    /// Feature tags whose native support is probed.
    ///
    /// A [`Capabilities`] value is either a *supported* set (probe results)
    /// or a *missing* set (what the polyfill must cover); the dispatch
    /// policy only ever sees missing sets.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Capabilities: u32 {
        /// The native call inspects an options record at all.
        const OPTIONS_BAG = 1;
        const RESIZE_WIDTH = 1 << 1;
        const RESIZE_HEIGHT = 1 << 2;
        const RESIZE_QUALITY = 1 << 3;
        const IMAGE_ORIENTATION = 1 << 4;
        /// Probed but pass-through only; never enters a missing set.
        const PREMULTIPLY_ALPHA = 1 << 5;
        /// Probed but pass-through only; never enters a missing set.
        const COLOR_SPACE_CONVERSION = 1 << 6;
        const BLOB_SOURCE = 1 << 7;
        const PIXEL_SOURCE = 1 << 8;
        const SVG_BLOB_SOURCE = 1 << 9;
        const SVG_ELEMENT_SOURCE = 1 << 10;

        /// Tags resolved by the synchronous phase and polyfillable.
        const SYNC_POLYFILLED = Self::OPTIONS_BAG.bits()
            | Self::RESIZE_WIDTH.bits()
            | Self::RESIZE_HEIGHT.bits()
            | Self::RESIZE_QUALITY.bits()
            | Self::IMAGE_ORIENTATION.bits();
        /// Tags resolved by the asynchronous phase.
        const ASYNC_PROBED = Self::BLOB_SOURCE.bits()
            | Self::PIXEL_SOURCE.bits()
            | Self::SVG_BLOB_SOURCE.bits()
            | Self::SVG_ELEMENT_SOURCE.bits();
        /// Everything the polyfill can stand in for.
        const ALL_POLYFILLED = Self::SYNC_POLYFILLED.bits() | Self::ASYNC_PROBED.bits();
    }
}

/// 1x1 transparent GIF used as the known-good probe payload.
pub(crate) const ONE_BY_ONE_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x01, 0x44, 0x00, 0x3b,
];

/// 1x1 SVG document for the SVG-typed-blob probe.
pub(crate) const ONE_BY_ONE_SVG: &str =
    r#"<svg width="1" height="1" xmlns="http://www.w3.org/2000/svg"><rect width="1" height="1"/></svg>"#;

const SVG_PROBE_INTERVAL: Duration = Duration::from_millis(10);
const SVG_PROBE_MAX_RETRIES: u32 = 300;

/// Instrumented options record handed to the native primitive during the
/// synchronous probe. Every key read is recorded; every value reads as
/// absent.
#[derive(Debug, Default)]
pub struct OptionsSniffer {
    seen: Mutex<Capabilities>,
}

impl OptionsSniffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The keys the native side read while converting the probe call.
    pub fn seen(&self) -> Capabilities {
        *self.seen.lock()
    }

    fn record(&self, key: Capabilities) {
        *self.seen.lock() |= key;
    }
}

impl OptionsBag for OptionsSniffer {
    fn resize_width(&self) -> Option<f64> {
        self.record(Capabilities::RESIZE_WIDTH);
        None
    }

    fn resize_height(&self) -> Option<f64> {
        self.record(Capabilities::RESIZE_HEIGHT);
        None
    }

    fn resize_quality(&self) -> Option<ResizeQuality> {
        self.record(Capabilities::RESIZE_QUALITY);
        None
    }

    fn image_orientation(&self) -> Option<ImageOrientation> {
        self.record(Capabilities::IMAGE_ORIENTATION);
        None
    }

    fn premultiply_alpha(&self) -> Option<PremultiplyAlpha> {
        self.record(Capabilities::PREMULTIPLY_ALPHA);
        None
    }

    fn color_space_conversion(&self) -> Option<ColorSpaceConversion> {
        self.record(Capabilities::COLOR_SPACE_CONVERSION);
        None
    }
}

/// Shared probe results: the missing-feature set and the async-phase
/// completion flag.
///
/// Mutation happens either before any caller can observe the state (the
/// synchronous phase) or in the single union step after all async
/// sub-probes settle, so readers never see a partial update.
#[derive(Debug)]
pub(crate) struct ProbeState {
    missing: Mutex<Capabilities>,
    async_done: AtomicBool,
}

impl ProbeState {
    pub(crate) fn new(sync_missing: Capabilities) -> Self {
        Self {
            missing: Mutex::new(sync_missing),
            async_done: AtomicBool::new(false),
        }
    }

    pub(crate) fn missing(&self) -> Capabilities {
        *self.missing.lock()
    }

    pub(crate) fn async_done(&self) -> bool {
        self.async_done.load(Ordering::Acquire)
    }

    /// The one-time union step closing the asynchronous phase.
    pub(crate) fn finish_async(&self, async_missing: Capabilities) {
        *self.missing.lock() |= async_missing;
        self.async_done.store(true, Ordering::Release);
    }
}

/// Synchronous phase: returns the initial missing set.
///
/// Without a native primitive there is nothing to probe; every polyfillable
/// tag is missing immediately. Otherwise a 1x1 raw-pixel call with a
/// sniffer bag is issued and deliberately dropped unpolled: some platforms
/// reject asynchronously when an options record is present, and we must not
/// wait for that. Any key access at conversion time proves the native call
/// reads an options record at all.
pub(crate) fn run_sync_probe<H: Host>(host: &H) -> Capabilities {
    if !host.has_native() {
        debug!("no native bitmap primitive; forcing full polyfill");
        return Capabilities::ALL_POLYFILLED;
    }

    let sniffer = OptionsSniffer::new();
    let pixels = probe_pixels();
    let request = NativeRequest {
        source: NativeSource::Pixels(&pixels),
        crop: None,
        options: Some(&sniffer),
    };
    drop(host.native_create(request));

    let mut supported = sniffer.seen();
    if !supported.is_empty() {
        // Heuristic carried over from the original shim: reading any known
        // key is taken as general options-record support.
        supported |= Capabilities::OPTIONS_BAG;
    }

    let missing = Capabilities::SYNC_POLYFILLED - supported;
    debug!(?supported, ?missing, "synchronous capability probe complete");
    missing
}

/// Asynchronous phase: probes each candidate source category concurrently
/// and returns the missing tags from the async group.
pub(crate) async fn run_async_probes<H: Host>(host: &H) -> Capabilities {
    if !host.has_native() {
        return Capabilities::ASYNC_PROBED;
    }

    let (blob, pixels, svg_blob, svg_element) = futures::join!(
        probe_blob_source(host),
        probe_pixel_source(host),
        probe_svg_blob_source(host),
        probe_svg_element_source(host),
    );

    let mut supported = Capabilities::empty();
    if blob {
        supported |= Capabilities::BLOB_SOURCE;
    }
    if pixels {
        supported |= Capabilities::PIXEL_SOURCE;
    }
    if svg_blob {
        supported |= Capabilities::SVG_BLOB_SOURCE;
    }
    if svg_element {
        supported |= Capabilities::SVG_ELEMENT_SOURCE;
    }

    let missing = Capabilities::ASYNC_PROBED - supported;
    debug!(?supported, ?missing, "asynchronous capability probe settled");
    missing
}

fn probe_pixels() -> PixelBuffer {
    // Infallible: 1x1 with a 4-byte buffer.
    PixelBuffer::new(1, 1, vec![0; 4]).expect("1x1 probe buffer")
}

/// Genuine support means the produced artifact really is 1x1, not merely
/// that the call did not fail.
async fn confirm_native<H: Host>(host: &H, source: NativeSource<'_>) -> bool {
    let request = NativeRequest {
        source,
        crop: None,
        options: None,
    };
    match host.native_create(request).await {
        Ok(bitmap) => bitmap.width() == 1,
        Err(_) => false,
    }
}

async fn probe_blob_source<H: Host>(host: &H) -> bool {
    let blob = Blob::new(ONE_BY_ONE_GIF.to_vec(), "image/gif");
    confirm_native(host, NativeSource::Blob(&blob)).await
}

async fn probe_pixel_source<H: Host>(host: &H) -> bool {
    let pixels = probe_pixels();
    confirm_native(host, NativeSource::Pixels(&pixels)).await
}

async fn probe_svg_blob_source<H: Host>(host: &H) -> bool {
    let blob = Blob::new(ONE_BY_ONE_SVG.as_bytes().to_vec(), SVG_MIME);
    confirm_native(host, NativeSource::Blob(&blob)).await
}

/// SVG elements expose no readiness signal, so poll usability on a fixed
/// interval with a capped retry count. Exhausting the retries is a
/// non-fatal probe failure: the tag is simply marked unsupported.
async fn probe_svg_element_source<H: Host>(host: &H) -> bool {
    let Some(element) = host.svg_probe_element() else {
        return false;
    };

    let mut retries = 0;
    loop {
        host.sleep(SVG_PROBE_INTERVAL).await;
        if check_usability(&*element).is_ok() {
            break;
        }
        retries += 1;
        if retries >= SVG_PROBE_MAX_RETRIES {
            debug!("SVG probe element never became usable");
            return false;
        }
    }

    let request = NativeRequest {
        source: NativeSource::Drawable(&*element),
        crop: None,
        options: None,
    };
    host.native_create(request).await.is_ok()
}
