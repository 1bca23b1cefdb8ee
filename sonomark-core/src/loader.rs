//! Fetch-and-decode drivers for segment requests.

use std::cell::RefCell;
use std::future::Future;
use std::pin::pin;

use futures::future::{select, Either};
use futures::stream::{FuturesUnordered, StreamExt};

use crate::error::FetchError;
use crate::segment_cache::{CachedImage, Completion, FetchRequest, Priority, SegmentCache};

/// The I/O a segment load needs. The browser implementation uses `fetch`,
/// `createImageBitmap` and `setTimeout`; tests use in-memory fakes.
pub trait ImageSource {
    type Payload;
    type Image: CachedImage;

    fn fetch(&self, url: &str) -> impl Future<Output = Result<Self::Payload, FetchError>>;

    /// Must resolve only once the image is fully decoded and drawable.
    fn decode(&self, payload: Self::Payload) -> impl Future<Output = Result<Self::Image, FetchError>>;

    fn sleep(&self, ms: u64) -> impl Future<Output = ()>;
}

/// Run `request` to completion and hand the outcome to the cache.
///
/// Fetch and decode together are raced against `timeout_ms`; losing the
/// race records [`FetchError::Timeout`] for the key. The cache borrow is
/// only taken before and after the awaits, never across them.
pub async fn load_segment<S: ImageSource>(
    cache: &RefCell<SegmentCache<S::Image>>,
    source: &S,
    request: FetchRequest,
    timeout_ms: u64,
) -> Completion {
    let FetchRequest { key, segment, band, url, .. } = request;
    if !cache.borrow().is_current(&key) {
        return cache.borrow_mut().abandon(&key);
    }

    let work = pin!(async {
        let payload = source.fetch(&url).await?;
        source.decode(payload).await
    });
    let timer = pin!(source.sleep(timeout_ms));

    let result = match select(work, timer).await {
        Either::Left((result, _)) => result,
        Either::Right(((), _)) => Err(FetchError::Timeout(timeout_ms)),
    };

    cache.borrow_mut().complete(key, segment, band, result)
}

/// Run a viewer's fetch plan. Visible segments load concurrently; preloads
/// start only once every visible load has settled. `on_done` sees each
/// outcome as it lands.
pub async fn load_planned<S: ImageSource>(
    cache: &RefCell<SegmentCache<S::Image>>,
    source: &S,
    requests: Vec<FetchRequest>,
    timeout_ms: u64,
    mut on_done: impl FnMut(Priority, Completion),
) {
    let (visible, preload): (Vec<_>, Vec<_>) =
        requests.into_iter().partition(|r| r.priority == Priority::Visible);
    for (priority, batch) in [(Priority::Visible, visible), (Priority::Preload, preload)] {
        let mut running: FuturesUnordered<_> =
            batch.into_iter().map(|request| load_segment(cache, source, request, timeout_ms)).collect();
        while let Some(completion) = running.next().await {
            on_done(priority, completion);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{QueryUrlProvider, SpectrogramParameters};
    use crate::segments::Segmentation;
    use crate::types::{Interval, RecordingInfo, Window};
    use futures::executor::block_on;
    use std::cell::Cell;

    #[derive(Debug, PartialEq)]
    struct Bitmap(usize);

    impl CachedImage for Bitmap {
        fn byte_len(&self) -> usize {
            self.0
        }
    }

    #[derive(Default)]
    struct FakeSource {
        fetch_hangs: bool,
        fetch_fails: Option<FetchError>,
        decode_fails: bool,
        /// Suspend once inside each fetch, as a real network call would.
        yields: bool,
        fetches: Cell<usize>,
        log: RefCell<Vec<String>>,
        on_fetch: Option<Box<dyn Fn()>>,
    }

    async fn yield_once() {
        let mut yielded = false;
        futures::future::poll_fn(|cx| {
            if yielded {
                std::task::Poll::Ready(())
            } else {
                yielded = true;
                cx.waker().wake_by_ref();
                std::task::Poll::Pending
            }
        })
        .await
    }

    impl ImageSource for FakeSource {
        type Payload = Vec<u8>;
        type Image = Bitmap;

        async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
            self.fetches.set(self.fetches.get() + 1);
            self.log.borrow_mut().push(format!("fetch {url}"));
            if let Some(hook) = &self.on_fetch {
                hook();
            }
            if self.fetch_hangs {
                futures::future::pending::<()>().await;
            }
            if self.yields {
                yield_once().await;
            }
            if let Some(e) = &self.fetch_fails {
                return Err(e.clone());
            }
            Ok(vec![0; 64])
        }

        async fn decode(&self, payload: Vec<u8>) -> Result<Bitmap, FetchError> {
            if self.decode_fails {
                Err(FetchError::Decode("truncated png".into()))
            } else {
                Ok(Bitmap(payload.len()))
            }
        }

        async fn sleep(&self, _ms: u64) {
            if !self.fetch_hangs {
                futures::future::pending::<()>().await;
            }
        }
    }

    fn recording() -> RecordingInfo {
        RecordingInfo { id: "rec".into(), duration: 4.0, samplerate: 2_000, channels: 1 }
    }

    fn setup(params: &SpectrogramParameters) -> (std::rc::Rc<RefCell<SegmentCache<Bitmap>>>, Vec<FetchRequest>) {
        let rec = recording();
        let cache = std::rc::Rc::new(RefCell::new(SegmentCache::new(10_000)));
        cache.borrow_mut().set_wanted(0, &rec, params.digest());
        let segmentation = Segmentation { recording_duration: 4.0, segment_duration: 2.0, margin: 0.0 };
        let window = Window::new(Interval::new(0.0, 1.0), rec.bounds().freq);
        let provider = QueryUrlProvider { base_url: "/render".into() };
        let requests = cache.borrow_mut().plan_fetches(&provider, &rec, params, &segmentation, &window, 0);
        (cache, requests)
    }

    #[test]
    fn successful_load_is_inserted() {
        let params = SpectrogramParameters::default();
        let (cache, mut requests) = setup(&params);
        let request = requests.remove(0);
        let key = request.key.clone();
        let source = FakeSource::default();
        assert_eq!(block_on(load_segment(&cache, &source, request, 5_000)), Completion::Inserted);
        assert_eq!(cache.borrow().peek(&key), Some(&Bitmap(64)));
        assert_eq!(cache.borrow().stats().in_flight, 0);
    }

    #[test]
    fn decode_failure_leaves_no_entry() {
        let params = SpectrogramParameters::default();
        let (cache, mut requests) = setup(&params);
        let request = requests.remove(0);
        let key = request.key.clone();
        let source = FakeSource { decode_fails: true, ..Default::default() };
        let outcome = block_on(load_segment(&cache, &source, request, 5_000));
        assert!(matches!(outcome, Completion::Failed(FetchError::Decode(_))));
        assert!(!cache.borrow().contains(&key));
        assert!(cache.borrow().failure(&key).is_some());
    }

    #[test]
    fn hung_fetch_times_out() {
        let params = SpectrogramParameters::default();
        let (cache, mut requests) = setup(&params);
        let request = requests.remove(0);
        let key = request.key.clone();
        let source = FakeSource { fetch_hangs: true, ..Default::default() };
        let outcome = block_on(load_segment(&cache, &source, request, 250));
        assert_eq!(outcome, Completion::Failed(FetchError::Timeout(250)));
        assert_eq!(cache.borrow().failure(&key), Some(&FetchError::Timeout(250)));
    }

    #[test]
    fn parameter_change_mid_fetch_discards_result() {
        let params = SpectrogramParameters::default();
        let (cache, mut requests) = setup(&params);
        let request = requests.remove(0);
        let key = request.key.clone();
        let newer = SpectrogramParameters { colormap: "magma".into(), ..Default::default() };
        let hook_cache = cache.clone();
        let source = FakeSource {
            on_fetch: Some(Box::new(move || hook_cache.borrow_mut().set_wanted(0, &recording(), newer.digest()))),
            ..Default::default()
        };
        assert_eq!(block_on(load_segment(&cache, &source, request, 5_000)), Completion::Stale);
        assert!(!cache.borrow().contains(&key));
    }

    #[test]
    fn unwanted_request_skips_the_network() {
        let params = SpectrogramParameters::default();
        let (cache, mut requests) = setup(&params);
        cache.borrow_mut().release_viewer(0);
        let source = FakeSource::default();
        let outcome = block_on(load_segment(&cache, &source, requests.remove(0), 5_000));
        assert_eq!(outcome, Completion::Stale);
        assert_eq!(source.fetches.get(), 0);
    }

    #[test]
    fn http_and_network_errors_stick_until_retried() {
        for error in [FetchError::Status(503), FetchError::Network("connection reset".into())] {
            let params = SpectrogramParameters::default();
            let (cache, mut requests) = setup(&params);
            let request = requests.remove(0);
            let key = request.key.clone();
            let source = FakeSource { fetch_fails: Some(error.clone()), ..Default::default() };
            let outcome = block_on(load_segment(&cache, &source, request, 5_000));
            assert_eq!(outcome, Completion::Failed(error.clone()));
            assert_eq!(cache.borrow().failure(&key), Some(&error));
            assert!(!cache.borrow().contains(&key));
            assert!(!cache.borrow_mut().begin(&key));
            assert_eq!(cache.borrow_mut().retry_failed(), 1);
            assert!(cache.borrow_mut().begin(&key));
        }
    }

    #[test]
    fn preloads_start_after_visible_loads_settle() {
        let rec = recording();
        let params = SpectrogramParameters::default();
        let cache = RefCell::new(SegmentCache::new(10_000));
        cache.borrow_mut().set_wanted(0, &rec, params.digest());
        let segmentation = Segmentation { recording_duration: 4.0, segment_duration: 1.0, margin: 0.0 };
        let window = Window::new(Interval::new(1.2, 1.8), rec.bounds().freq);
        let provider = QueryUrlProvider { base_url: "/render".into() };
        let requests = cache.borrow_mut().plan_fetches(&provider, &rec, &params, &segmentation, &window, 1);
        assert_eq!(requests[0].priority, Priority::Visible);
        let preload_fetches: Vec<String> = requests
            .iter()
            .filter(|r| r.priority == Priority::Preload)
            .map(|r| format!("fetch {}", r.url))
            .collect();
        assert!(!preload_fetches.is_empty());
        let total = requests.len();

        let source = FakeSource { yields: true, ..Default::default() };
        block_on(load_planned(&cache, &source, requests, 5_000, |priority, completion| {
            assert_eq!(completion, Completion::Inserted);
            source.log.borrow_mut().push(format!("done {priority:?}"));
        }));

        let log = source.log.borrow();
        let last_visible = log.iter().rposition(|e| e == "done Visible").unwrap();
        let first_preload = log.iter().position(|e| preload_fetches.contains(e)).unwrap();
        assert!(last_visible < first_preload, "{log:?}");
        assert_eq!(log.iter().filter(|e| e.starts_with("done")).count(), total);
        assert_eq!(cache.borrow().stats().entries, total);
    }
}
