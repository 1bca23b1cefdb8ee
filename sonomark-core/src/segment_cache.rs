//! Shared cache of decoded segment images.
//!
//! One instance is created at startup and handed to every viewer. Entries
//! are keyed by `(recording, segment, parameter digest)` and evicted least
//! recently accessed first once their total size passes the byte ceiling.
//! The cache never fetches anything itself: callers ask it which segments
//! to request ([`SegmentCache::plan_fetches`]), report the outcome
//! ([`SegmentCache::complete`]) and ask how to paint the current window
//! ([`SegmentCache::draw_plan`]).

use std::collections::HashMap;

use crate::error::FetchError;
use crate::params::{ParamsDigest, SegmentUrlProvider, SpectrogramParameters};
use crate::segments::{Segment, Segmentation};
use crate::transform;
use crate::types::{Dimensions, Interval, PixelRect, RecordingInfo, Window};

/// Anything the cache can hold. Only its size matters here.
pub trait CachedImage {
    fn byte_len(&self) -> usize;
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SegmentKey {
    pub recording: String,
    pub segment: usize,
    pub params: ParamsDigest,
}

impl SegmentKey {
    pub fn new(recording: &RecordingInfo, segment: &Segment, params: ParamsDigest) -> Self {
        Self { recording: recording.id.clone(), segment: segment.index, params }
    }
}

/// Identifies one viewer's interest in a `(recording, parameters)` pair.
pub type ViewerId = u32;

struct Entry<I> {
    image: I,
    segment: Segment,
    band: Interval,
    bytes: usize,
    last_access: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Priority {
    Visible,
    Preload,
}

/// A fetch the caller should start. The key is already marked in flight.
#[derive(Clone, Debug, PartialEq)]
pub struct FetchRequest {
    pub key: SegmentKey,
    pub segment: Segment,
    pub band: Interval,
    pub url: String,
    pub priority: Priority,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Completion {
    Inserted,
    Failed(FetchError),
    /// Nobody wants this key any more; the result was dropped.
    Stale,
}

/// Crop of a cached image, as fractions of its width.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SourceCrop {
    pub x0: f64,
    pub x1: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DrawOp {
    Image { key: SegmentKey, src: SourceCrop, dest: PixelRect },
    Placeholder { dest: PixelRect },
    Failed { dest: PixelRect },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub bytes: usize,
    pub in_flight: usize,
    pub failed: usize,
}

pub struct SegmentCache<I> {
    entries: HashMap<SegmentKey, Entry<I>>,
    /// Keys being fetched. `true` marks a load voided by `clear_recording`
    /// whose result will be dropped.
    in_flight: HashMap<SegmentKey, bool>,
    failed: HashMap<SegmentKey, FetchError>,
    wanted: HashMap<ViewerId, (String, ParamsDigest)>,
    max_bytes: usize,
    total_bytes: usize,
    tick: u64,
}

impl<I: CachedImage> SegmentCache<I> {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            entries: HashMap::new(),
            in_flight: HashMap::new(),
            failed: HashMap::new(),
            wanted: HashMap::new(),
            max_bytes,
            total_bytes: 0,
            tick: 0,
        }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    // ── Staleness ───────────────────────────────────────────────────────────

    /// Record which recording and parameters `viewer` currently displays.
    /// Completions for keys no viewer wants are discarded.
    pub fn set_wanted(&mut self, viewer: ViewerId, recording: &RecordingInfo, params: ParamsDigest) {
        self.wanted.insert(viewer, (recording.id.clone(), params));
    }

    pub fn release_viewer(&mut self, viewer: ViewerId) {
        self.wanted.remove(&viewer);
    }

    pub fn is_current(&self, key: &SegmentKey) -> bool {
        self.wanted.values().any(|(rec, digest)| *rec == key.recording && *digest == key.params)
    }

    // ── Lookup ──────────────────────────────────────────────────────────────

    pub fn contains(&self, key: &SegmentKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Borrow a cached image and mark it as recently used.
    pub fn get(&mut self, key: &SegmentKey) -> Option<&I> {
        let tick = self.next_tick();
        let entry = self.entries.get_mut(key)?;
        entry.last_access = tick;
        Some(&entry.image)
    }

    /// Borrow without touching LRU order.
    pub fn peek(&self, key: &SegmentKey) -> Option<&I> {
        self.entries.get(key).map(|e| &e.image)
    }

    pub fn is_in_flight(&self, key: &SegmentKey) -> bool {
        self.in_flight.contains_key(key)
    }

    pub fn failure(&self, key: &SegmentKey) -> Option<&FetchError> {
        self.failed.get(key)
    }

    // ── Fetch bookkeeping ───────────────────────────────────────────────────

    /// Mark `key` in flight. Returns `false` when there is nothing to do:
    /// the key is cached, already in flight, or failed and not yet retried.
    pub fn begin(&mut self, key: &SegmentKey) -> bool {
        if self.entries.contains_key(key) || self.failed.contains_key(key) || self.in_flight.contains_key(key) {
            return false;
        }
        self.in_flight.insert(key.clone(), false);
        true
    }

    /// Drop an in-flight mark without a result.
    pub fn abandon(&mut self, key: &SegmentKey) -> Completion {
        self.in_flight.remove(key);
        Completion::Stale
    }

    /// Deliver a fetch outcome. Only decoded images reach this point, so an
    /// entry is either fully ready or absent.
    pub fn complete(
        &mut self,
        key: SegmentKey,
        segment: Segment,
        band: Interval,
        result: Result<I, FetchError>,
    ) -> Completion {
        let voided = self.in_flight.remove(&key).unwrap_or(false);
        if voided || !self.is_current(&key) {
            log::debug!("discarding stale segment {} of {}", key.segment, key.recording);
            return Completion::Stale;
        }
        match result {
            Ok(image) => {
                self.insert(key, segment, band, image);
                Completion::Inserted
            }
            Err(e) => {
                log::warn!("segment {} of {} failed: {e}", key.segment, key.recording);
                self.failed.insert(key, e.clone());
                Completion::Failed(e)
            }
        }
    }

    /// Insert or replace an entry, then evict the least recently accessed
    /// others until the total fits. The new entry itself is never evicted.
    pub fn insert(&mut self, key: SegmentKey, segment: Segment, band: Interval, image: I) {
        let bytes = image.byte_len();
        if let Some(old) = self.entries.remove(&key) {
            self.total_bytes = self.total_bytes.saturating_sub(old.bytes);
        }
        self.failed.remove(&key);

        while self.total_bytes + bytes > self.max_bytes {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(k, e)| (e.last_access, *k))
                .map(|(k, _)| k.clone());
            let Some(oldest) = oldest else { break };
            if let Some(evicted) = self.entries.remove(&oldest) {
                self.total_bytes = self.total_bytes.saturating_sub(evicted.bytes);
                log::debug!("evicted segment {} of {} ({} bytes)", oldest.segment, oldest.recording, evicted.bytes);
            }
        }

        let last_access = self.next_tick();
        self.total_bytes += bytes;
        self.entries.insert(key, Entry { image, segment, band, bytes, last_access });
    }

    /// Forget recorded failures so the next plan requests those keys again.
    /// Returns how many were cleared.
    pub fn retry_failed(&mut self) -> usize {
        let n = self.failed.len();
        self.failed.clear();
        n
    }

    /// Drop every entry and failure of `recording`. Loads still running
    /// keep their in-flight mark, so the key is not fetched twice, but
    /// their results are discarded.
    pub fn clear_recording(&mut self, recording: &str) {
        let mut freed = 0;
        self.entries.retain(|k, e| {
            let keep = k.recording != recording;
            if !keep {
                freed += e.bytes;
            }
            keep
        });
        self.total_bytes = self.total_bytes.saturating_sub(freed);
        for (key, voided) in self.in_flight.iter_mut() {
            if key.recording == recording {
                *voided = true;
            }
        }
        self.failed.retain(|k, _| k.recording != recording);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            bytes: self.total_bytes,
            in_flight: self.in_flight.len(),
            failed: self.failed.len(),
        }
    }

    // ── Planning ────────────────────────────────────────────────────────────

    /// Segments to request for `window`: the visible ones first, then up to
    /// `preload` neighbours on each side. Every returned key is marked in
    /// flight, so calling this again before completions arrive returns
    /// nothing new.
    pub fn plan_fetches<P: SegmentUrlProvider + ?Sized>(
        &mut self,
        provider: &P,
        recording: &RecordingInfo,
        params: &SpectrogramParameters,
        segmentation: &Segmentation,
        window: &Window,
        preload: usize,
    ) -> Vec<FetchRequest> {
        let digest = params.digest();
        let band = params.image_band(recording);
        let visible = segmentation.covering(window.time);
        let neighbours = segmentation.neighbours(&visible, preload);

        let candidates = visible
            .into_iter()
            .map(|s| (s, Priority::Visible))
            .chain(neighbours.into_iter().map(|s| (s, Priority::Preload)));

        let mut out = Vec::new();
        for (segment, priority) in candidates {
            let key = SegmentKey::new(recording, &segment, digest);
            if !self.begin(&key) {
                continue;
            }
            let url = provider.segment_url(recording, segment.buffer, params);
            out.push(FetchRequest { key, segment, band, url, priority });
        }
        out
    }

    /// How to paint `window`: one op per covering segment, in time order.
    /// Cached images are placed by mapping their data-space extent through
    /// the current window, so they stay valid across pans and zooms.
    pub fn draw_plan(
        &mut self,
        recording: &RecordingInfo,
        params: &SpectrogramParameters,
        segmentation: &Segmentation,
        window: &Window,
        dims: Dimensions,
    ) -> Vec<DrawOp> {
        let digest = params.digest();
        let band = params.image_band(recording);
        let mut ops = Vec::new();

        for segment in segmentation.covering(window.time) {
            let key = SegmentKey::new(recording, &segment, digest);
            let tick = self.next_tick();
            let op = match self.entries.get_mut(&key) {
                Some(entry) => {
                    entry.last_access = tick;
                    let buffer = entry.segment.buffer;
                    let span = buffer.span();
                    let src = if span > 0.0 {
                        SourceCrop {
                            x0: (entry.segment.interval.min - buffer.min) / span,
                            x1: (entry.segment.interval.max - buffer.min) / span,
                        }
                    } else {
                        SourceCrop { x0: 0.0, x1: 1.0 }
                    };
                    let dest = dest_rect(entry.segment.interval, entry.band, window, dims);
                    DrawOp::Image { key, src, dest }
                }
                None if self.failed.contains_key(&key) => {
                    DrawOp::Failed { dest: dest_rect(segment.interval, band, window, dims) }
                }
                None => DrawOp::Placeholder { dest: dest_rect(segment.interval, band, window, dims) },
            };
            ops.push(op);
        }
        ops
    }
}

fn dest_rect(time: Interval, band: Interval, window: &Window, dims: Dimensions) -> PixelRect {
    let x0 = transform::to_pixel_x(time.min, window, dims.width);
    let x1 = transform::to_pixel_x(time.max, window, dims.width);
    let y0 = transform::to_pixel_y(band.max, window, dims.height);
    let y1 = transform::to_pixel_y(band.min, window, dims.height);
    PixelRect { x: x0, y: y0, width: x1 - x0, height: y1 - y0 }
}
