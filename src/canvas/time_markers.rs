use sonomark_core::transform;
use sonomark_core::types::{Dimensions, Window};
use web_sys::CanvasRenderingContext2d;

use crate::canvas::colors::freq_marker_label;

// ── Time scale ────────────────────────────────────────────────────────────

/// Nice 1-2-5 progression of tick intervals in seconds, from 0.1 ms to 10 min.
const TICK_INTERVALS: &[f64] = &[
    0.0001, 0.0002, 0.0005,         // sub-ms
    0.001, 0.002, 0.005,             // 1–5 ms
    0.01, 0.02, 0.05,               // 10–50 ms
    0.1, 0.2, 0.5,                  // 100–500 ms
    1.0, 2.0, 5.0,                  // 1–5 s
    10.0, 30.0, 60.0,               // 10 s – 1 min
    120.0, 300.0, 600.0,            // 2–10 min
];

/// Frequency tick intervals in Hz.
const FREQ_INTERVALS: &[f64] = &[
    1.0, 2.0, 5.0, 10.0, 20.0, 50.0, 100.0, 200.0, 500.0,
    1_000.0, 2_000.0, 5_000.0, 10_000.0, 20_000.0, 50_000.0,
];

/// Smallest interval from `steps` keeping ticks at least `min_px` apart.
pub fn pick_interval(steps: &[f64], span: f64, extent_px: f64, min_px: f64) -> f64 {
    let per_px = span / extent_px;
    let min_interval = min_px * per_px;
    steps
        .iter()
        .copied()
        .find(|&i| i >= min_interval)
        .or_else(|| steps.last().copied())
        .unwrap_or(span)
}

/// Label for a tick at `seconds`, precise enough to tell neighbours
/// `interval` apart.
pub fn format_time_label(seconds: f64, interval: f64) -> String {
    match interval {
        i if i < 0.01 => format!("{:.1}ms", seconds * 1000.0),
        i if i < 1.0 => format!("{:.0}ms", seconds * 1000.0),
        i if i < 60.0 => {
            let whole = (seconds - seconds.round()).abs() < 0.001;
            if whole {
                format!("{seconds:.0}s")
            } else {
                format!("{seconds:.1}s")
            }
        }
        _ => {
            let total = seconds.round() as u64;
            match (total / 60, total % 60) {
                (m, 0) => format!("{m}m"),
                (m, s) => format!("{m}m{s:02}s"),
            }
        }
    }
}

fn label_box(ctx: &CanvasRenderingContext2d, label: &str, x: f64, y: f64, limit: f64) {
    if let Ok(metrics) = ctx.measure_text(label) {
        let tw = metrics.width();
        if x + tw < limit - 2.0 {
            ctx.set_fill_style_str("rgba(0,0,0,0.6)");
            ctx.fill_rect(x - 1.0, y - 11.0, tw + 2.0, 12.0);
            ctx.set_fill_style_str("rgba(255,255,255,0.7)");
            let _ = ctx.fill_text(label, x, y);
        }
    }
}

/// Draw time tick marks and labels along the bottom of the canvas.
pub fn draw_time_markers(ctx: &CanvasRenderingContext2d, window: &Window, dims: Dimensions) {
    let span = window.time.span();
    if span <= 0.0 || dims.width <= 0.0 {
        return;
    }
    let interval = pick_interval(TICK_INTERVALS, span, dims.width, 100.0);
    let h = dims.height;

    // ── Minor ticks (no labels) ──
    let minor = interval / 5.0;
    if minor / transform::seconds_per_pixel(window, dims.width) >= 4.0 {
        ctx.set_stroke_style_str("rgba(255,255,255,0.15)");
        ctx.set_line_width(1.0);
        let mut t = (window.time.min / minor).ceil() * minor;
        while t <= window.time.max {
            let on_major = ((t / interval).round() * interval - t).abs() < minor * 0.01;
            if !on_major {
                let x = transform::to_pixel_x(t, window, dims.width);
                ctx.begin_path();
                ctx.move_to(x, h - 6.0);
                ctx.line_to(x, h);
                ctx.stroke();
            }
            t += minor;
        }
    }

    // ── Major ticks + labels ──
    let tick_h = 12.0;
    ctx.set_font("10px sans-serif");
    ctx.set_stroke_style_str("rgba(255,255,255,0.35)");
    ctx.set_line_width(1.0);
    let mut t = (window.time.min / interval).ceil() * interval;
    while t <= window.time.max + interval * 0.01 {
        let x = transform::to_pixel_x(t, window, dims.width);
        ctx.begin_path();
        ctx.move_to(x, h - tick_h);
        ctx.line_to(x, h);
        ctx.stroke();
        label_box(ctx, &format_time_label(t, interval), x + 3.0, h - tick_h - 1.0, dims.width);
        t += interval;
    }
}

/// Draw frequency ticks and labels along the left edge.
pub fn draw_freq_markers(ctx: &CanvasRenderingContext2d, window: &Window, dims: Dimensions) {
    let span = window.freq.span();
    if span <= 0.0 || dims.height <= 0.0 {
        return;
    }
    let interval = pick_interval(FREQ_INTERVALS, span, dims.height, 40.0);
    ctx.set_font("10px sans-serif");
    ctx.set_stroke_style_str("rgba(255,255,255,0.35)");
    ctx.set_line_width(1.0);
    let mut f = (window.freq.min / interval).ceil() * interval;
    while f <= window.freq.max {
        let y = transform::to_pixel_y(f, window, dims.height);
        ctx.begin_path();
        ctx.move_to(0.0, y);
        ctx.line_to(8.0, y);
        ctx.stroke();
        if y > 12.0 {
            label_box(ctx, &freq_marker_label(f, interval), 10.0, y + 4.0, dims.width);
        }
        f += interval;
    }
}

pub fn seek_label(time: f64) -> String {
    format!("{time:.3}s")
}

/// Vertical line at the last double-clicked time, labelled on the time axis.
pub fn draw_seek_marker(ctx: &CanvasRenderingContext2d, time: f64, window: &Window, dims: Dimensions) {
    if !window.time.contains(time) {
        return;
    }
    let x = transform::to_pixel_x(time, window, dims.width);
    ctx.set_stroke_style_str("rgba(255,216,74,0.8)");
    ctx.set_line_width(1.0);
    ctx.begin_path();
    ctx.move_to(x, 0.0);
    ctx.line_to(x, dims.height);
    ctx.stroke();
    ctx.set_font("10px sans-serif");
    label_box(ctx, &seek_label(time), x + 3.0, 12.0, dims.width);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_keeps_labels_apart() {
        // 10 s over 1000 px: 100 px is 1 s.
        assert_eq!(pick_interval(TICK_INTERVALS, 10.0, 1000.0, 100.0), 1.0);
        assert_eq!(pick_interval(TICK_INTERVALS, 10.0, 300.0, 100.0), 5.0);
        assert_eq!(pick_interval(TICK_INTERVALS, 1e6, 100.0, 100.0), 600.0);
    }

    #[test]
    fn time_labels_follow_interval() {
        assert_eq!(format_time_label(0.25, 0.05), "250ms");
        assert_eq!(format_time_label(3.0, 1.0), "3s");
        assert_eq!(format_time_label(150.0, 60.0), "2m30s");
    }

    #[test]
    fn seek_label_keeps_millisecond_precision() {
        assert_eq!(seek_label(1.5), "1.500s");
        assert_eq!(seek_label(0.0123), "0.012s");
    }
}
