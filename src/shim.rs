// src/shim.rs
//
// The shim itself: ties capability probing, dispatch and the polyfill
// pipeline together behind one asynchronous creation operation.

use crate::bitmap::ImageBitmap;
use crate::capabilities::{run_async_probes, run_sync_probe, Capabilities, ProbeState};
use crate::dispatch::{decide, Dispatch};
use crate::error::Result;
use crate::host::{Host, NativeRequest, OptionsBag};
use crate::options::{parse_call, CallArg, ParsedCall};
use crate::pipeline::run_polyfill;
use crate::source::BitmapSource;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::Arc;
use tracing::debug;

/// The compatibility shim for one host platform.
///
/// Construction runs the synchronous capability probe. The asynchronous
/// probe is created once and shared: the first call whose source category
/// demands it drives it to completion, concurrent callers await the same
/// future, and later calls observe the settled results without waiting.
pub struct BitmapShim<H: Host> {
    host: Arc<H>,
    state: Arc<ProbeState>,
    async_probe: Shared<BoxFuture<'static, ()>>,
}

impl<H: Host> BitmapShim<H> {
    pub fn new(host: Arc<H>) -> Self {
        let state = Arc::new(ProbeState::new(run_sync_probe(&*host)));

        let async_probe = {
            let host = Arc::clone(&host);
            let state = Arc::clone(&state);
            async move {
                let missing = run_async_probes(&*host).await;
                state.finish_async(missing);
            }
            .boxed()
            .shared()
        };

        Self {
            host,
            state,
            async_probe,
        }
    }

    /// The current missing-feature set. Grows once when the asynchronous
    /// phase settles, read-only afterwards.
    pub fn missing_capabilities(&self) -> Capabilities {
        self.state.missing()
    }

    /// Whether the asynchronous capability phase has settled.
    pub fn async_probe_done(&self) -> bool {
        self.state.async_done()
    }

    /// Drive the asynchronous capability phase to completion now instead of
    /// on the first demanding call.
    pub async fn warm_up(&self) {
        if !self.state.async_done() {
            self.async_probe.clone().await;
        }
    }

    /// Create a bitmap artifact from `source`.
    ///
    /// `args` models the raw argument vector following the source: nothing,
    /// an options record, a 4-number crop rectangle, or a crop rectangle
    /// followed by an options record. Any other shape fails with
    /// `InvalidArgumentCount`.
    pub async fn create_image_bitmap(
        &self,
        source: &BitmapSource,
        args: &[CallArg],
    ) -> Result<ImageBitmap<H>> {
        let call = parse_call(args)?;

        // Some sources must stay synchronous until their buffer is read, so
        // the async probe results are awaited only when the source category
        // actually depends on them.
        if source.needs_async_probe() && !self.state.async_done() {
            self.async_probe.clone().await;
        }

        let missing = self.state.missing();
        let decision = decide(
            missing,
            self.host.has_native(),
            source,
            &call.options,
            call.arity,
        );
        debug!(?decision, ?missing, source = ?source, "dispatching call");

        match decision {
            Dispatch::Native => self.delegate(source, &call, matches!(call.arity, 2 | 6)).await,
            Dispatch::NativeAdjusted { drop_options } => {
                let include_options = matches!(call.arity, 2 | 6) && !drop_options;
                self.delegate(source, &call, include_options).await
            }
            Dispatch::Polyfill => {
                let surface = run_polyfill(&*self.host, source, &call).await?;
                ImageBitmap::from_surface(&*self.host, surface).await
            }
        }
    }

    async fn delegate(
        &self,
        source: &BitmapSource,
        call: &ParsedCall,
        include_options: bool,
    ) -> Result<ImageBitmap<H>> {
        let options: Option<&dyn OptionsBag> = if include_options {
            Some(&call.options)
        } else {
            None
        };
        let request = NativeRequest {
            source: source.as_native(),
            crop: call.crop,
            options,
        };
        Ok(ImageBitmap::Native(self.host.native_create(request).await?))
    }
}
