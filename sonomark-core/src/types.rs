use serde::{Deserialize, Serialize};

/// Closed range `[min, max]` on one axis (seconds or Hz).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub min: f64,
    pub max: f64,
}

impl Interval {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Build from two endpoints in any order.
    pub fn ordered(a: f64, b: f64) -> Self {
        if a <= b {
            Self { min: a, max: b }
        } else {
            Self { min: b, max: a }
        }
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    pub fn center(&self) -> f64 {
        (self.min + self.max) / 2.0
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn overlaps(&self, other: &Interval) -> bool {
        self.min <= other.max && other.min <= self.max
    }

    /// True when `other` lies entirely inside `self`.
    pub fn covers(&self, other: &Interval) -> bool {
        other.min >= self.min && other.max <= self.max
    }

    pub fn shifted(&self, delta: f64) -> Self {
        Self { min: self.min + delta, max: self.max + delta }
    }

    /// Scale the span by `factor` keeping `anchor` at the same relative place.
    pub fn scaled_about(&self, factor: f64, anchor: f64) -> Self {
        Self {
            min: anchor - (anchor - self.min) * factor,
            max: anchor + (self.max - anchor) * factor,
        }
    }

    pub fn centered_on(&self, center: f64) -> Self {
        let half = self.span() / 2.0;
        Self { min: center - half, max: center + half }
    }
}

/// Visible rectangle in time × frequency data space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Window {
    pub time: Interval,
    pub freq: Interval,
}

/// Outer window a recording permits: `0..duration` × `0..nyquist`.
pub type Bounds = Window;

impl Window {
    pub const fn new(time: Interval, freq: Interval) -> Self {
        Self { time, freq }
    }

    pub fn center(&self) -> Position {
        Position { time: self.time.center(), freq: self.freq.center() }
    }

    pub fn contains(&self, position: Position) -> bool {
        self.time.contains(position.time) && self.freq.contains(position.freq)
    }

    /// Build from two corners in any order.
    pub fn from_corners(a: Position, b: Position) -> Self {
        Self {
            time: Interval::ordered(a.time, b.time),
            freq: Interval::ordered(a.freq, b.freq),
        }
    }
}

/// A point in data space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub time: f64,
    pub freq: f64,
}

impl Position {
    pub const fn new(time: f64, freq: f64) -> Self {
        Self { time, freq }
    }
}

/// A point on the drawing surface, origin top-left.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pixel {
    pub x: f64,
    pub y: f64,
}

impl Pixel {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: Pixel) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Size of the drawing surface in pixels, supplied by the caller each frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
}

impl Dimensions {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Axis-aligned rectangle in pixel space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PixelRect {
    pub fn from_corners(a: Pixel, b: Pixel) -> Self {
        Self {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            width: (a.x - b.x).abs(),
            height: (a.y - b.y).abs(),
        }
    }
}

/// Read-only recording metadata supplied by the task collaborator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordingInfo {
    pub id: String,
    pub duration: f64,
    pub samplerate: u32,
    pub channels: u32,
}

impl RecordingInfo {
    pub fn nyquist(&self) -> f64 {
        self.samplerate as f64 / 2.0
    }

    pub fn bounds(&self) -> Bounds {
        Window::new(Interval::new(0.0, self.duration), Interval::new(0.0, self.nyquist()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_interval_swaps_endpoints() {
        let i = Interval::ordered(5.0, 2.0);
        assert_eq!(i, Interval::new(2.0, 5.0));
    }

    #[test]
    fn scaled_about_keeps_anchor_fixed() {
        let i = Interval::new(0.0, 10.0).scaled_about(0.5, 2.0);
        assert_eq!(i, Interval::new(1.0, 6.0));
    }

    #[test]
    fn recording_bounds_use_nyquist() {
        let rec = RecordingInfo { id: "r".into(), duration: 3.0, samplerate: 48_000, channels: 1 };
        let b = rec.bounds();
        assert_eq!(b.time, Interval::new(0.0, 3.0));
        assert_eq!(b.freq, Interval::new(0.0, 24_000.0));
    }
}
