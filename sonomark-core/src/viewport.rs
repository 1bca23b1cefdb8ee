//! Visible window state and every operation that moves it.
//!
//! All changes pass through [`clamp_to_bounds`], so the window never shows
//! more than the recording has: an axis wider than its bounds is snapped to
//! the full bounds, and a narrower one is slid back inside them keeping its
//! span.

use std::collections::VecDeque;

use crate::config::ViewportConfig;
use crate::types::{Bounds, Interval, Position, Window};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    Time,
    Freq,
    Both,
}

fn clamp_axis(requested: Interval, bounds: Interval) -> Interval {
    let requested = Interval::ordered(requested.min, requested.max);
    let bounds = Interval::ordered(bounds.min, bounds.max);
    if requested.span() >= bounds.span() {
        return bounds;
    }
    if requested.min < bounds.min {
        requested.shifted(bounds.min - requested.min)
    } else if requested.max > bounds.max {
        requested.shifted(bounds.max - requested.max)
    } else {
        requested
    }
}

/// Fit `window` inside `bounds`. Idempotent.
pub fn clamp_to_bounds(window: Window, bounds: &Bounds) -> Window {
    Window {
        time: clamp_axis(window.time, bounds.time),
        freq: clamp_axis(window.freq, bounds.freq),
    }
}

fn widen_to(interval: Interval, min_span: f64) -> Interval {
    if interval.span() >= min_span {
        interval
    } else {
        Interval::new(interval.center() - min_span / 2.0, interval.center() + min_span / 2.0)
    }
}

fn is_finite(window: &Window) -> bool {
    [window.time.min, window.time.max, window.freq.min, window.freq.max]
        .iter()
        .all(|v| v.is_finite())
}

#[derive(Clone, Debug, PartialEq)]
pub struct Viewport {
    window: Window,
    bounds: Bounds,
    initial: Window,
    pub fixed_aspect_ratio: bool,
    config: ViewportConfig,
    /// Window before the drag currently being previewed.
    preview_origin: Option<Window>,
    back: VecDeque<Window>,
    forward: Vec<Window>,
}

impl Viewport {
    pub fn new(initial: Window, bounds: Bounds, config: &ViewportConfig) -> Self {
        let mut viewport = Self {
            window: initial,
            bounds,
            initial,
            fixed_aspect_ratio: config.fixed_aspect_ratio,
            config: config.clone(),
            preview_origin: None,
            back: VecDeque::new(),
            forward: Vec::new(),
        };
        viewport.window = viewport.fit(initial);
        viewport.initial = viewport.window;
        viewport
    }

    pub fn window(&self) -> Window {
        self.window
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn initial(&self) -> Window {
        self.initial
    }

    /// Replace the bounds (e.g. a new recording) and refit the window.
    pub fn set_bounds(&mut self, bounds: Bounds) {
        self.bounds = bounds;
        self.window = self.fit(self.window);
        self.initial = self.fit(self.initial);
    }

    fn fit(&self, window: Window) -> Window {
        let widened = Window {
            time: widen_to(Interval::ordered(window.time.min, window.time.max), self.config.min_time_span),
            freq: widen_to(Interval::ordered(window.freq.min, window.freq.max), self.config.min_freq_span),
        };
        clamp_to_bounds(widened, &self.bounds)
    }

    /// Commit a new window, recording the previous one in history.
    pub fn set_window(&mut self, window: Window) -> Window {
        if !is_finite(&window) {
            log::warn!("ignoring non-finite window {window:?}");
            return self.window;
        }
        let next = self.fit(window);
        let previous = self.preview_origin.take().unwrap_or(self.window);
        if next != previous {
            self.remember(previous);
            self.forward.clear();
        }
        self.window = next;
        next
    }

    /// Show `window` without touching history. The next committed change
    /// records the window from before the first preview.
    pub fn preview(&mut self, window: Window) -> Window {
        if !is_finite(&window) {
            return self.window;
        }
        if self.preview_origin.is_none() {
            self.preview_origin = Some(self.window);
        }
        self.window = self.fit(window);
        self.window
    }

    /// Abandon a preview and restore the window it started from.
    pub fn cancel_preview(&mut self) -> Window {
        if let Some(origin) = self.preview_origin.take() {
            self.window = origin;
        }
        self.window
    }

    pub fn zoom_by(&mut self, factor: f64, axis: Axis) -> Window {
        let center = self.window.center();
        self.scale_about(factor, axis, center)
    }

    /// Scale about a fixed data-space point, which keeps its pixel position.
    pub fn scale_about(&mut self, factor: f64, axis: Axis, anchor: Position) -> Window {
        if !(factor.is_finite() && factor > 0.0) {
            return self.window;
        }
        let axis = if self.fixed_aspect_ratio {
            Axis::Both
        } else {
            axis
        };
        let mut next = self.window;
        if matches!(axis, Axis::Time | Axis::Both) {
            next.time = next.time.scaled_about(factor, anchor.time);
        }
        if matches!(axis, Axis::Freq | Axis::Both) {
            next.freq = next.freq.scaled_about(factor, anchor.freq);
        }
        self.set_window(next)
    }

    /// Move to `window`, keeping the frequency/time span ratio when the
    /// aspect ratio is locked.
    pub fn drag_to(&mut self, window: Window) -> Window {
        let next = self.locked(window);
        self.set_window(next)
    }

    /// [`drag_to`](Self::drag_to) for an in-progress gesture.
    pub fn preview_drag(&mut self, window: Window) -> Window {
        let next = self.locked(window);
        self.preview(next)
    }

    fn locked(&self, window: Window) -> Window {
        if !self.fixed_aspect_ratio || self.window.time.span() <= 0.0 {
            return window;
        }
        let ratio = self.window.freq.span() / self.window.time.span();
        let freq_span = window.time.span().abs() * ratio;
        let center = window.freq.center();
        Window {
            time: window.time,
            freq: Interval::new(center - freq_span / 2.0, center + freq_span / 2.0),
        }
    }

    /// Multiply each given axis span about the window centre.
    pub fn scale(&mut self, time: Option<f64>, freq: Option<f64>) -> Window {
        let center = self.window.center();
        let mut next = self.window;
        if let Some(f) = time.filter(|f| f.is_finite() && *f > 0.0) {
            next.time = next.time.scaled_about(f, center.time);
        }
        if let Some(f) = freq.filter(|f| f.is_finite() && *f > 0.0) {
            next.freq = next.freq.scaled_about(f, center.freq);
        }
        self.set_window(next)
    }

    pub fn shift(&mut self, time: Option<f64>, freq: Option<f64>) -> Window {
        let mut next = self.window;
        if let Some(dt) = time {
            next.time = next.time.shifted(dt);
        }
        if let Some(df) = freq {
            next.freq = next.freq.shifted(df);
        }
        self.set_window(next)
    }

    pub fn center_on(&mut self, time: Option<f64>, freq: Option<f64>) -> Window {
        let mut next = self.window;
        if let Some(t) = time {
            next.time = next.time.centered_on(t);
        }
        if let Some(f) = freq {
            next.freq = next.freq.centered_on(f);
        }
        self.set_window(next)
    }

    fn span_unchanged(&self, current: Interval, initial: Interval) -> bool {
        let reference = initial.span().abs().max(f64::EPSILON);
        (current.span() - initial.span()).abs() / reference <= self.config.reset_tolerance
    }

    /// Return to the initial window. If only the position changed since
    /// then, re-centre on the initial centre at the current zoom instead.
    pub fn reset(&mut self) -> Window {
        let panned_only = self.span_unchanged(self.window.time, self.initial.time)
            && self.span_unchanged(self.window.freq, self.initial.freq);
        if panned_only {
            let center = self.initial.center();
            let next = Window {
                time: self.window.time.centered_on(center.time),
                freq: self.window.freq.centered_on(center.freq),
            };
            self.set_window(next)
        } else {
            self.set_window(self.initial)
        }
    }

    pub fn can_go_back(&self) -> bool {
        !self.back.is_empty()
    }

    pub fn can_go_forward(&self) -> bool {
        !self.forward.is_empty()
    }

    fn remember(&mut self, window: Window) {
        self.back.push_back(window);
        if self.back.len() > self.config.history_limit {
            self.back.pop_front();
        }
    }

    pub fn back(&mut self) -> Option<Window> {
        let previous = self.back.pop_back()?;
        self.forward.push(self.window);
        self.window = self.fit(previous);
        Some(self.window)
    }

    pub fn forward(&mut self) -> Option<Window> {
        let next = self.forward.pop()?;
        self.remember(self.window);
        self.window = self.fit(next);
        Some(self.window)
    }
}
