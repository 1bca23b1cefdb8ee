//! Data space (seconds, Hz) ↔ pixel space conversion.
//!
//! Pixel rows grow downward while frequency grows upward, so the frequency
//! axis is inverted. A zero-span window never divides by zero: forward
//! maps saturate to the nearest edge and inverse maps return the window max.

use crate::types::{Dimensions, Pixel, Position, Window};

pub fn to_pixel_x(time: f64, window: &Window, width: f64) -> f64 {
    let span = window.time.span();
    if span == 0.0 {
        return if time >= window.time.max { width } else { 0.0 };
    }
    width * (time - window.time.min) / span
}

pub fn to_pixel_y(freq: f64, window: &Window, height: f64) -> f64 {
    let span = window.freq.span();
    if span == 0.0 {
        return if freq >= window.freq.max { 0.0 } else { height };
    }
    height * (window.freq.max - freq) / span
}

pub fn to_time(x: f64, window: &Window, width: f64) -> f64 {
    let span = window.time.span();
    if span == 0.0 || width == 0.0 {
        return window.time.max;
    }
    window.time.min + x / width * span
}

pub fn to_freq(y: f64, window: &Window, height: f64) -> f64 {
    let span = window.freq.span();
    if span == 0.0 || height == 0.0 {
        return window.freq.max;
    }
    window.freq.max - y / height * span
}

pub fn to_pixel(position: Position, window: &Window, dims: Dimensions) -> Pixel {
    Pixel {
        x: to_pixel_x(position.time, window, dims.width),
        y: to_pixel_y(position.freq, window, dims.height),
    }
}

pub fn to_position(pixel: Pixel, window: &Window, dims: Dimensions) -> Position {
    Position {
        time: to_time(pixel.x, window, dims.width),
        freq: to_freq(pixel.y, window, dims.height),
    }
}

/// Seconds covered by one pixel column.
pub fn seconds_per_pixel(window: &Window, width: f64) -> f64 {
    if width <= 0.0 {
        0.0
    } else {
        window.time.span() / width
    }
}

/// Hz covered by one pixel row.
pub fn hz_per_pixel(window: &Window, height: f64) -> f64 {
    if height <= 0.0 {
        0.0
    } else {
        window.freq.span() / height
    }
}
