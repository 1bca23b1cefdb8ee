//! Browser side of segment loading: `fetch` + `createImageBitmap`, and the
//! scheduling that turns a viewer's fetch plan into `spawn_local` tasks.

use std::rc::Rc;

use js_sys::Promise;
use sonomark_core::error::FetchError;
use sonomark_core::loader::{self, ImageSource};
use sonomark_core::segment_cache::{CachedImage, Completion};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::{Blob, ImageBitmap, Response};

use crate::state::{with_controller, AppState, CACHE, PROVIDER};

/// A decoded segment image, ready to blit.
pub struct SegmentImage(pub ImageBitmap);

impl CachedImage for SegmentImage {
    fn byte_len(&self) -> usize {
        self.0.width() as usize * self.0.height() as usize * 4
    }
}

fn network_error(e: JsValue) -> FetchError {
    FetchError::Network(format!("{e:?}"))
}

fn decode_error(e: JsValue) -> FetchError {
    FetchError::Decode(format!("{e:?}"))
}

fn browser_window() -> Result<web_sys::Window, FetchError> {
    web_sys::window().ok_or_else(|| FetchError::Network("no window".into()))
}

pub struct BrowserImageSource;

impl ImageSource for BrowserImageSource {
    type Payload = Blob;
    type Image = SegmentImage;

    async fn fetch(&self, url: &str) -> Result<Blob, FetchError> {
        let window = browser_window()?;
        let response = JsFuture::from(window.fetch_with_str(url)).await.map_err(network_error)?;
        let response: Response = response.dyn_into().map_err(network_error)?;
        if !response.ok() {
            return Err(FetchError::Status(response.status()));
        }
        let blob = JsFuture::from(response.blob().map_err(network_error)?)
            .await
            .map_err(network_error)?;
        blob.dyn_into::<Blob>().map_err(network_error)
    }

    async fn decode(&self, payload: Blob) -> Result<SegmentImage, FetchError> {
        let window = browser_window()?;
        let promise = window.create_image_bitmap_with_blob(&payload).map_err(decode_error)?;
        let bitmap = JsFuture::from(promise).await.map_err(decode_error)?;
        bitmap.dyn_into::<ImageBitmap>().map(SegmentImage).map_err(decode_error)
    }

    async fn sleep(&self, ms: u64) {
        let promise = Promise::new(&mut |resolve, _reject| {
            if let Some(window) = web_sys::window() {
                let ms = ms.min(i32::MAX as u64) as i32;
                let _ = window.set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, ms);
            }
        });
        let _ = JsFuture::from(promise).await;
    }
}

/// Start loads for whatever the main viewer needs and does not have yet.
/// Visible segments go first and neighbours follow once they have landed.
/// Each finished load bumps `segment_ready_signal` so the canvas redraws.
pub fn schedule_segments(state: AppState) {
    let planned = CACHE.with(|cache| {
        PROVIDER.with(|provider| {
            with_controller(|c| {
                let requests = c.plan_fetches(&mut cache.borrow_mut(), &*provider.borrow());
                (requests, c.config().cache.fetch_timeout_ms)
            })
        })
    });
    let Some((requests, timeout_ms)) = planned else { return };
    if requests.is_empty() {
        return;
    }
    log::debug!("fetching {} segments", requests.len());

    let cache = CACHE.with(Rc::clone);
    spawn_local(async move {
        loader::load_planned(&cache, &BrowserImageSource, requests, timeout_ms, |_, completion| {
            match completion {
                Completion::Inserted | Completion::Failed(_) => state.bump_segments(),
                Completion::Stale => {}
            }
        })
        .await;
    });
}

/// Forget recorded failures and try those segments again.
pub fn retry_failed(state: AppState) {
    let cleared = CACHE.with(|cache| cache.borrow_mut().retry_failed());
    if cleared > 0 {
        log::info!("retrying {cleared} failed segments");
        schedule_segments(state);
        state.bump_segments();
    }
}
