// tests/shim_integration.rs
//
// End-to-end tests for the probe -> dispatch -> pipeline flow against fake
// native hosts and the software reference host.

use bitmap_shim::{
    BitmapError, BitmapOptions, BitmapShim, BitmapSource, Blob, CallArg, Capabilities, CropRect,
    Drawable, DrawableKind, Host, ImageBitmap, ImageOrientation, NativeBitmap, NativeRequest,
    NativeSource, PixelBuffer, Raster, Result, SoftwareHost, Usability, SVG_MIME,
};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct FakeBitmap {
    width: u32,
    height: u32,
}

impl NativeBitmap for FakeBitmap {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn close(&mut self) {
        self.width = 0;
        self.height = 0;
    }
}

#[derive(Clone, Debug)]
struct RecordedCall {
    source: &'static str,
    had_options: bool,
    crop: Option<CropRect>,
}

fn source_label(source: &NativeSource<'_>) -> &'static str {
    match source {
        NativeSource::Drawable(_) => "drawable",
        NativeSource::Blob(_) => "blob",
        NativeSource::Pixels(_) => "pixels",
    }
}

fn source_dims(source: &NativeSource<'_>) -> (u32, u32) {
    match source {
        NativeSource::Drawable(d) => d.intrinsic_size().unwrap_or((1, 1)),
        // Fake hosts only ever see the shim's 1x1 probe blobs.
        NativeSource::Blob(_) => (1, 1),
        NativeSource::Pixels(p) => (p.width(), p.height()),
    }
}

/// A drawable backed by an owned surface, standing in for an image element.
struct TestImage(Raster);

impl TestImage {
    fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let mut surface = Raster::new(width, height).unwrap();
        for y in 0..height {
            for x in 0..width {
                surface.put_pixel(x, y, rgba);
            }
        }
        Self(surface)
    }

    fn from_raster(surface: Raster) -> Self {
        Self(surface)
    }
}

impl Drawable for TestImage {
    fn kind(&self) -> DrawableKind {
        DrawableKind::Image
    }

    fn intrinsic_size(&self) -> Option<(u32, u32)> {
        Some((self.0.width(), self.0.height()))
    }

    fn snapshot(&self) -> Result<Raster> {
        Ok(self.0.clone())
    }
}

/// An inline SVG image element: intrinsic size present, but the usability
/// probe can only answer indeterminately.
struct InlineSvg(Raster);

impl Drawable for InlineSvg {
    fn kind(&self) -> DrawableKind {
        DrawableKind::SvgImage
    }

    fn intrinsic_size(&self) -> Option<(u32, u32)> {
        Some((self.0.width(), self.0.height()))
    }

    fn snapshot(&self) -> Result<Raster> {
        Ok(self.0.clone())
    }

    fn probe_usable(&self) -> Result<Usability> {
        Ok(Usability::Maybe)
    }
}

/// Inline SVG probe element: no intrinsic size, usable immediately.
struct ProbeSvg;

impl Drawable for ProbeSvg {
    fn kind(&self) -> DrawableKind {
        DrawableKind::SvgImage
    }

    fn intrinsic_size(&self) -> Option<(u32, u32)> {
        None
    }

    fn snapshot(&self) -> Result<Raster> {
        Raster::new(1, 1)
    }

    fn probe_usable(&self) -> Result<Usability> {
        Ok(Usability::Usable)
    }
}

/// A host whose native primitive supports everything the shim probes for.
#[derive(Default)]
struct FullNativeHost {
    calls: Mutex<Vec<RecordedCall>>,
}

impl FullNativeHost {
    fn convert(&self, request: &NativeRequest<'_>) -> FakeBitmap {
        let (mut width, mut height) = source_dims(&request.source);
        if let Some(crop) = request.crop {
            width = crop.sw.unsigned_abs();
            height = crop.sh.unsigned_abs();
        }
        if let Some(bag) = request.options {
            // Read every known key, as a fully supporting native side does.
            if let Some(w) = bag.resize_width() {
                width = w as u32;
            }
            if let Some(h) = bag.resize_height() {
                height = h as u32;
            }
            let _ = bag.resize_quality();
            let _ = bag.image_orientation();
            let _ = bag.premultiply_alpha();
            let _ = bag.color_space_conversion();
        }
        self.calls.lock().push(RecordedCall {
            source: source_label(&request.source),
            had_options: request.options.is_some(),
            crop: request.crop,
        });
        FakeBitmap { width, height }
    }

    fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn last_call(&self) -> RecordedCall {
        self.calls.lock().last().cloned().expect("no native call recorded")
    }
}

impl Host for FullNativeHost {
    type Bitmap = FakeBitmap;

    fn has_native(&self) -> bool {
        true
    }

    fn native_create(
        &self,
        request: NativeRequest<'_>,
    ) -> impl Future<Output = Result<Self::Bitmap>> + Send {
        // Conversion (and any option reads) happens at call time, per the
        // Host contract.
        std::future::ready(Ok(self.convert(&request)))
    }

    fn decode_blob(&self, _blob: &Blob) -> impl Future<Output = Result<Raster>> + Send {
        std::future::ready(Err(BitmapError::decode_failed(
            "native host never polyfills blobs",
        )))
    }

    fn svg_probe_element(&self) -> Option<Box<dyn Drawable>> {
        Some(Box::new(ProbeSvg))
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}

/// A host whose native primitive never inspects the options argument and
/// rejects SVG sources, but handles plain blob and pixel sources.
#[derive(Default)]
struct LegacyHost {
    calls: Mutex<Vec<RecordedCall>>,
}

impl LegacyHost {
    fn last_call(&self) -> RecordedCall {
        self.calls.lock().last().cloned().expect("no native call recorded")
    }
}

impl Host for LegacyHost {
    type Bitmap = FakeBitmap;

    fn has_native(&self) -> bool {
        true
    }

    fn native_create(
        &self,
        request: NativeRequest<'_>,
    ) -> impl Future<Output = Result<Self::Bitmap>> + Send {
        let result = match &request.source {
            NativeSource::Blob(blob) if blob.is_svg() => {
                Err(BitmapError::native_failed("legacy host cannot decode SVG"))
            }
            source => {
                let (mut width, mut height) = source_dims(source);
                if let Some(crop) = request.crop {
                    width = crop.sw.unsigned_abs();
                    height = crop.sh.unsigned_abs();
                }
                // The options argument is deliberately never read.
                Ok(FakeBitmap { width, height })
            }
        };
        self.calls.lock().push(RecordedCall {
            source: source_label(&request.source),
            had_options: request.options.is_some(),
            crop: request.crop,
        });
        std::future::ready(result)
    }

    fn decode_blob(&self, _blob: &Blob) -> impl Future<Output = Result<Raster>> + Send {
        std::future::ready(Err(BitmapError::decode_failed(
            "legacy host never polyfills blobs",
        )))
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}

fn resize_options(width: f64, height: f64) -> BitmapOptions {
    BitmapOptions {
        resize_width: Some(width),
        resize_height: Some(height),
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Fully supporting native host
// ---------------------------------------------------------------------------

#[tokio::test]
async fn full_native_host_has_nothing_missing() {
    let shim = BitmapShim::new(Arc::new(FullNativeHost::default()));
    shim.warm_up().await;
    assert!(shim.async_probe_done());
    assert!(shim.missing_capabilities().is_empty());
}

#[tokio::test]
async fn full_support_means_untouched_passthrough() {
    let host = Arc::new(FullNativeHost::default());
    let shim = BitmapShim::new(Arc::clone(&host));

    let source = BitmapSource::drawable(TestImage::solid(8, 4, [255, 0, 0, 255]));
    let args = vec![CallArg::Options(resize_options(2.0, 3.0))];
    let bitmap = shim.create_image_bitmap(&source, &args).await.unwrap();

    assert!(bitmap.is_native());
    assert_eq!((bitmap.width(), bitmap.height()), (2, 3));
    let call = host.last_call();
    assert_eq!(call.source, "drawable");
    assert!(call.had_options);
}

#[tokio::test]
async fn async_probe_runs_exactly_once() {
    let host = Arc::new(FullNativeHost::default());
    let shim = BitmapShim::new(Arc::clone(&host));

    // Sync probe has already issued one native call.
    assert_eq!(host.call_count(), 1);

    let blob = Blob::new(vec![0u8; 8], "image/gif");
    for _ in 0..3 {
        let source = BitmapSource::Blob(blob.clone());
        let bitmap = shim.create_image_bitmap(&source, &[]).await.unwrap();
        assert!(bitmap.is_native());
    }

    // 1 sync probe + 4 async probes + 3 delegated calls. A second probe
    // round would push this past 8.
    assert_eq!(host.call_count(), 8);
    assert!(shim.async_probe_done());
}

// ---------------------------------------------------------------------------
// Legacy native host (no options support, no SVG)
// ---------------------------------------------------------------------------

#[tokio::test]
async fn legacy_host_marks_options_missing() {
    let shim = BitmapShim::new(Arc::new(LegacyHost::default()));
    let missing = shim.missing_capabilities();
    assert!(missing.contains(Capabilities::OPTIONS_BAG));
    assert!(missing.contains(Capabilities::RESIZE_WIDTH));
}

#[tokio::test]
async fn legacy_host_drops_trailing_options_record() {
    let host = Arc::new(LegacyHost::default());
    let shim = BitmapShim::new(Arc::clone(&host));

    // Two total arguments ending in an (empty) options record: the record
    // is stripped before delegation because the native side is known not to
    // tolerate it.
    let source = BitmapSource::drawable(TestImage::solid(6, 6, [0, 255, 0, 255]));
    let args = vec![CallArg::Options(BitmapOptions::default())];
    let bitmap = shim.create_image_bitmap(&source, &args).await.unwrap();

    assert!(bitmap.is_native());
    let call = host.last_call();
    assert_eq!(call.source, "drawable");
    assert!(!call.had_options);
}

#[tokio::test]
async fn legacy_host_keeps_crop_when_stripping_options() {
    let host = Arc::new(LegacyHost::default());
    let shim = BitmapShim::new(Arc::clone(&host));

    let source = BitmapSource::drawable(TestImage::solid(6, 6, [0, 255, 0, 255]));
    let args = vec![
        CallArg::Num(1.0),
        CallArg::Num(1.0),
        CallArg::Num(4.0),
        CallArg::Num(4.0),
        CallArg::Options(BitmapOptions::default()),
    ];
    let bitmap = shim.create_image_bitmap(&source, &args).await.unwrap();

    assert_eq!(bitmap.width(), 4);
    let call = host.last_call();
    assert_eq!(call.crop, Some(CropRect::new(1, 1, 4, 4)));
    assert!(!call.had_options);
}

#[tokio::test]
async fn legacy_host_polyfills_resize_then_converts_result() {
    let host = Arc::new(LegacyHost::default());
    let shim = BitmapShim::new(Arc::clone(&host));

    let source = BitmapSource::drawable(TestImage::solid(4, 4, [9, 9, 9, 255]));
    let args = vec![CallArg::Options(resize_options(2.0, 2.0))];
    let bitmap = shim.create_image_bitmap(&source, &args).await.unwrap();

    // The polyfill drew the surface, then handed it back to the native
    // primitive for conversion into a true artifact.
    assert!(bitmap.is_native());
    assert_eq!((bitmap.width(), bitmap.height()), (2, 2));
    let call = host.last_call();
    assert_eq!(call.source, "drawable");
    assert_eq!(call.crop, None);
    assert!(!call.had_options);
}

#[tokio::test]
async fn legacy_host_routes_svg_element_to_polyfill() {
    let host = Arc::new(LegacyHost::default());
    let shim = BitmapShim::new(Arc::clone(&host));
    shim.warm_up().await;
    assert!(shim
        .missing_capabilities()
        .contains(Capabilities::SVG_ELEMENT_SOURCE));

    let mut surface = Raster::new(2, 2).unwrap();
    surface.put_pixel(1, 0, [0, 0, 255, 255]);
    let source = BitmapSource::drawable(InlineSvg(surface));
    let bitmap = shim.create_image_bitmap(&source, &[]).await.unwrap();

    // Polyfill drew the element, then the surface was converted through
    // the native primitive.
    assert!(bitmap.is_native());
    assert_eq!((bitmap.width(), bitmap.height()), (2, 2));
    let call = host.last_call();
    assert_eq!(call.source, "drawable");
    assert_eq!(call.crop, None);
}

#[tokio::test]
async fn legacy_host_routes_svg_blob_to_polyfill() {
    let host = Arc::new(LegacyHost::default());
    let shim = BitmapShim::new(Arc::clone(&host));
    shim.warm_up().await;

    let missing = shim.missing_capabilities();
    assert!(missing.contains(Capabilities::SVG_BLOB_SOURCE));
    assert!(missing.contains(Capabilities::SVG_ELEMENT_SOURCE));
    assert!(!missing.contains(Capabilities::BLOB_SOURCE));
    assert!(!missing.contains(Capabilities::PIXEL_SOURCE));

    // The polyfill path needs a decoder the legacy host doesn't have, so
    // the call surfaces the decode failure instead of silently delegating
    // to a native primitive that would reject the SVG.
    let source = BitmapSource::Blob(Blob::new(vec![0u8; 4], SVG_MIME));
    let err = shim.create_image_bitmap(&source, &[]).await.unwrap_err();
    assert!(matches!(err, BitmapError::DecodeFailed { .. }));
}

// ---------------------------------------------------------------------------
// Software host (full polyfill)
// ---------------------------------------------------------------------------

fn expect_emulated(bitmap: &ImageBitmap<SoftwareHost>) -> &bitmap_shim::EmulatedBitmap {
    match bitmap {
        ImageBitmap::Emulated(emulated) => emulated,
        ImageBitmap::Native(_) => panic!("software host cannot produce native bitmaps"),
    }
}

#[tokio::test]
async fn software_host_clamps_and_scales_proportionally() {
    let shim = BitmapShim::new(Arc::new(SoftwareHost::new()));

    // 100x50 source, crop starting 10px left of the image, resized to 25
    // wide: the surface keeps the requested 25x50 extent, the visible
    // content shrinks to 20 wide and shifts right by 5.
    let source = BitmapSource::drawable(TestImage::solid(100, 50, [255, 0, 0, 255]));
    let args = vec![
        CallArg::Num(-10.0),
        CallArg::Num(0.0),
        CallArg::Num(50.0),
        CallArg::Num(50.0),
        CallArg::Options(BitmapOptions {
            resize_width: Some(25.0),
            ..Default::default()
        }),
    ];
    let bitmap = shim.create_image_bitmap(&source, &args).await.unwrap();
    assert_eq!((bitmap.width(), bitmap.height()), (25, 50));

    let surface = expect_emulated(&bitmap).surface();
    // Left of the clamped-away region: transparent.
    assert_eq!(surface.pixel(4, 25)[3], 0);
    // Inside the drawn region: the source color.
    assert_eq!(surface.pixel(10, 25), [255, 0, 0, 255]);
    // Rightmost drawn column (5 + 20 - 1).
    assert_eq!(surface.pixel(24, 25), [255, 0, 0, 255]);
}

#[tokio::test]
async fn flip_y_mirrors_rows_between_independent_calls() {
    let shim = BitmapShim::new(Arc::new(SoftwareHost::new()));

    let mut striped = Raster::new(1, 3).unwrap();
    striped.put_pixel(0, 0, [255, 0, 0, 255]);
    striped.put_pixel(0, 1, [0, 255, 0, 255]);
    striped.put_pixel(0, 2, [0, 0, 255, 255]);
    let upright_src = BitmapSource::drawable(TestImage::from_raster(striped.clone()));
    let flipped_src = BitmapSource::drawable(TestImage::from_raster(striped));

    let upright = shim.create_image_bitmap(&upright_src, &[]).await.unwrap();
    let flipped = shim
        .create_image_bitmap(
            &flipped_src,
            &[CallArg::Options(BitmapOptions {
                image_orientation: Some(ImageOrientation::FlipY),
                ..Default::default()
            })],
        )
        .await
        .unwrap();

    let up = expect_emulated(&upright).surface();
    let down = expect_emulated(&flipped).surface();
    for y in 0..3 {
        assert_eq!(up.pixel(0, y), down.pixel(0, 2 - y));
    }
}

#[tokio::test]
async fn polyfill_is_idempotent_on_dimensions() {
    let shim = BitmapShim::new(Arc::new(SoftwareHost::new()));
    let args = vec![CallArg::Options(resize_options(7.0, 5.0))];

    let mut dims = Vec::new();
    for _ in 0..2 {
        let source = BitmapSource::drawable(TestImage::solid(20, 10, [1, 2, 3, 255]));
        let bitmap = shim.create_image_bitmap(&source, &args).await.unwrap();
        dims.push((bitmap.width(), bitmap.height()));
    }
    assert_eq!(dims[0], (7, 5));
    assert_eq!(dims[0], dims[1]);
}

#[tokio::test]
async fn blob_path_decodes_and_crops() {
    let shim = BitmapShim::new(Arc::new(SoftwareHost::new()));

    // 3x3 PNG with a distinct center pixel.
    let mut img = image::RgbaImage::from_pixel(3, 3, image::Rgba([0, 0, 0, 255]));
    img.put_pixel(1, 1, image::Rgba([255, 255, 255, 255]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();

    let source = BitmapSource::Blob(Blob::new(bytes, "image/png"));
    let args = vec![
        CallArg::Num(1.0),
        CallArg::Num(1.0),
        CallArg::Num(2.0),
        CallArg::Num(2.0),
    ];
    let bitmap = shim.create_image_bitmap(&source, &args).await.unwrap();
    assert_eq!((bitmap.width(), bitmap.height()), (2, 2));

    let surface = expect_emulated(&bitmap).surface();
    assert_eq!(surface.pixel(0, 0), [255, 255, 255, 255]);
    assert_eq!(surface.pixel(1, 1), [0, 0, 0, 255]);
}

#[tokio::test]
async fn indeterminate_usability_still_produces_the_artifact() {
    let shim = BitmapShim::new(Arc::new(SoftwareHost::new()));

    let mut surface = Raster::new(3, 3).unwrap();
    surface.put_pixel(1, 1, [7, 8, 9, 255]);
    let source = BitmapSource::drawable(InlineSvg(surface));
    let bitmap = shim.create_image_bitmap(&source, &[]).await.unwrap();

    assert_eq!((bitmap.width(), bitmap.height()), (3, 3));
    let drawn = expect_emulated(&bitmap).surface();
    assert_eq!(drawn.pixel(1, 1), [7, 8, 9, 255]);
    assert_eq!(drawn.pixel(0, 0), [0, 0, 0, 0]);
}

#[tokio::test]
async fn detached_pixel_buffer_fails_with_invalid_state() {
    let shim = BitmapShim::new(Arc::new(SoftwareHost::new()));

    let mut buffer = PixelBuffer::new(2, 2, vec![0; 16]).unwrap();
    buffer.detach();
    let source = BitmapSource::Pixels(buffer);
    let err = shim.create_image_bitmap(&source, &[]).await.unwrap_err();
    assert!(matches!(err, BitmapError::InvalidSourceState { .. }));
}

#[tokio::test]
async fn native_less_host_settles_probe_instantly() {
    let shim = BitmapShim::new(Arc::new(SoftwareHost::new()));
    assert_eq!(shim.missing_capabilities(), Capabilities::ALL_POLYFILLED);

    let source = BitmapSource::Pixels(PixelBuffer::new(1, 1, vec![0; 4]).unwrap());
    shim.create_image_bitmap(&source, &[]).await.unwrap();
    assert!(shim.async_probe_done());
    assert_eq!(shim.missing_capabilities(), Capabilities::ALL_POLYFILLED);
}

#[tokio::test]
async fn emulated_bitmap_close_is_one_shot() {
    let shim = BitmapShim::new(Arc::new(SoftwareHost::new()));
    let source = BitmapSource::drawable(TestImage::solid(5, 4, [1, 1, 1, 255]));
    let mut bitmap = shim.create_image_bitmap(&source, &[]).await.unwrap();

    assert_eq!(bitmap.type_name(), "ImageBitmap");
    assert_eq!((bitmap.width(), bitmap.height()), (5, 4));
    bitmap.close();
    assert_eq!((bitmap.width(), bitmap.height()), (0, 0));
}
