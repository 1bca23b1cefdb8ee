//! Fixed-duration time segments, the unit of image caching.
//!
//! The segment duration is chosen so one rendered segment holds roughly
//! `pixel_budget` pixels: image height is the number of frequency bins
//! (`window_samples / 2 + 1`) and width is the number of hops. Since both
//! grow with the window length, the duration ends up depending mostly on
//! the hop fraction and sample rate, which keeps segment count stable across
//! window-size changes.

use crate::config::SegmentConfig;
use crate::params::SpectrogramParameters;
use crate::types::{Interval, RecordingInfo};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
    pub index: usize,
    /// Time range this segment is responsible for drawing.
    pub interval: Interval,
    /// `interval` padded by a few hops on each side, clipped to the
    /// recording. This is the range actually requested from the image
    /// service so neighbouring images overlap instead of leaving seams.
    pub buffer: Interval,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segmentation {
    pub recording_duration: f64,
    pub segment_duration: f64,
    pub margin: f64,
}

impl Segmentation {
    pub fn new(recording: &RecordingInfo, params: &SpectrogramParameters, config: &SegmentConfig) -> Self {
        let samplerate = params.samplerate(recording).max(1) as f64;
        let window_samples = (params.window_size * samplerate).max(1.0);
        let freq_bins = (window_samples / 2.0).floor() + 1.0;
        let hop = params.hop_seconds();

        let segment_duration = if hop > 0.0 {
            let columns = (config.pixel_budget / freq_bins).max(1.0);
            (columns * hop).max(config.min_duration)
        } else {
            recording.duration
        };

        let segment_duration = if segment_duration > 0.0 {
            segment_duration
        } else {
            recording.duration.max(f64::MIN_POSITIVE)
        };
        Self {
            recording_duration: recording.duration,
            segment_duration,
            margin: config.buffer_hops * hop.max(0.0),
        }
    }

    pub fn count(&self) -> usize {
        if self.recording_duration <= 0.0 {
            return 0;
        }
        (self.recording_duration / self.segment_duration).ceil().max(1.0) as usize
    }

    pub fn segment(&self, index: usize) -> Option<Segment> {
        if index >= self.count() {
            return None;
        }
        let min = index as f64 * self.segment_duration;
        let max = (min + self.segment_duration).min(self.recording_duration);
        let buffer = Interval::new((min - self.margin).max(0.0), (max + self.margin).min(self.recording_duration));
        Some(Segment { index, interval: Interval::new(min, max), buffer })
    }

    /// Segments overlapping `time`, in order.
    pub fn covering(&self, time: Interval) -> Vec<Segment> {
        let count = self.count();
        if count == 0 || time.max < 0.0 || time.min > self.recording_duration {
            return Vec::new();
        }
        let first = ((time.min.max(0.0) / self.segment_duration).floor() as usize).min(count - 1);
        let end = time.max.min(self.recording_duration);
        let last = ((end / self.segment_duration).ceil() as usize).saturating_sub(1).clamp(first, count - 1);
        (first..=last).filter_map(|i| self.segment(i)).collect()
    }

    /// Up to `radius` segments on each side of the visible run, nearest first.
    pub fn neighbours(&self, visible: &[Segment], radius: usize) -> Vec<Segment> {
        let (Some(first), Some(last)) = (visible.first(), visible.last()) else {
            return Vec::new();
        };
        let mut out = Vec::with_capacity(radius * 2);
        for d in 1..=radius {
            if let Some(i) = first.index.checked_sub(d) {
                out.extend(self.segment(i));
            }
            out.extend(self.segment(last.index + d));
        }
        out
    }
}
