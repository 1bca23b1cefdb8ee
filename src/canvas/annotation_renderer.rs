//! Annotation outlines, edit handles, tag chips and the transient overlays
//! (draft shape, measurement, zoom box) drawn over the spectrogram.

use sonomark_core::annotation::{Annotation, AnnotationId};
use sonomark_core::geometry::{Coord, Geometry};
use sonomark_core::interaction::{Measurement, Preview};
use sonomark_core::tag_overlay::ChipCluster;
use sonomark_core::transform;
use sonomark_core::types::{Dimensions, PixelRect, Window};
use web_sys::CanvasRenderingContext2d;

use crate::canvas::colors::{self, rgba};
use crate::canvas::time_markers::format_time_label;

const HANDLE_SIZE: f64 = 6.0;

fn path(ctx: &CanvasRenderingContext2d, coords: &[Coord], close: bool) {
    let Some((first, rest)) = coords.split_first() else { return };
    ctx.begin_path();
    ctx.move_to(first[0], first[1]);
    for c in rest {
        ctx.line_to(c[0], c[1]);
    }
    if close {
        ctx.close_path();
    }
    ctx.stroke();
}

fn dot(ctx: &CanvasRenderingContext2d, c: Coord) {
    ctx.begin_path();
    let _ = ctx.arc(c[0], c[1], 3.0, 0.0, std::f64::consts::TAU);
    ctx.fill();
}

/// Stroke a geometry already mapped to pixel space.
fn stroke_pixels(ctx: &CanvasRenderingContext2d, geometry: &Geometry, dims: Dimensions, color: [u8; 3]) {
    ctx.set_stroke_style_str(&rgba(color, 0.9));
    ctx.set_fill_style_str(&rgba(color, 0.9));
    match geometry {
        Geometry::TimeStamp(x) => path(ctx, &[[*x, 0.0], [*x, dims.height]], false),
        Geometry::TimeInterval([x0, x1]) => {
            ctx.set_fill_style_str(&rgba(color, 0.12));
            ctx.fill_rect(x0.min(*x1), 0.0, (x1 - x0).abs(), dims.height);
            path(ctx, &[[*x0, 0.0], [*x0, dims.height]], false);
            path(ctx, &[[*x1, 0.0], [*x1, dims.height]], false);
        }
        Geometry::Point(c) => dot(ctx, *c),
        Geometry::MultiPoint(points) => points.iter().for_each(|c| dot(ctx, *c)),
        Geometry::BoundingBox([x0, y0, x1, y1]) => ctx.stroke_rect(x0.min(*x1), y0.min(*y1), (x1 - x0).abs(), (y1 - y0).abs()),
        Geometry::LineString(line) => path(ctx, line, false),
        Geometry::MultiLineString(lines) => lines.iter().for_each(|l| path(ctx, l, false)),
        Geometry::Polygon(rings) => rings.iter().for_each(|r| path(ctx, r, true)),
        Geometry::MultiPolygon(polys) => polys.iter().flatten().for_each(|r| path(ctx, r, true)),
    }
}

fn draw_geometry(ctx: &CanvasRenderingContext2d, geometry: &Geometry, window: &Window, dims: Dimensions, color: [u8; 3]) {
    stroke_pixels(ctx, &geometry.scale_to_window(window, dims), dims, color);
}

fn draw_handles(ctx: &CanvasRenderingContext2d, geometry: &Geometry, window: &Window, dims: Dimensions) {
    ctx.set_fill_style_str("#fff");
    ctx.set_stroke_style_str("#000");
    ctx.set_line_width(1.0);
    let half = HANDLE_SIZE / 2.0;
    for h in geometry.handles(window, dims) {
        ctx.fill_rect(h.x - half, h.y - half, HANDLE_SIZE, HANDLE_SIZE);
        ctx.stroke_rect(h.x - half, h.y - half, HANDLE_SIZE, HANDLE_SIZE);
    }
}

/// Every visible annotation, the selection highlighted with handles. An
/// annotation being edited is drawn from its preview instead.
pub fn draw_annotations(
    ctx: &CanvasRenderingContext2d,
    annotations: &[Annotation],
    selection: Option<&AnnotationId>,
    preview: Option<&Preview>,
    window: &Window,
    dims: Dimensions,
) {
    ctx.set_line_width(1.5);
    for annotation in annotations {
        match annotation.geometry.is_in_window(window) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) => {
                log::debug!("not drawing {}: {e}", annotation.id);
                continue;
            }
        }
        let editing = preview.is_some_and(|p| p.id.as_ref() == Some(&annotation.id));
        if editing {
            continue;
        }
        let selected = selection == Some(&annotation.id);
        let color = if selected {
            colors::SELECTED
        } else {
            colors::OUTLINE
        };
        ctx.set_line_width(if selected { 2.0 } else { 1.5 });
        draw_geometry(ctx, &annotation.geometry, window, dims, color);
        if selected {
            draw_handles(ctx, &annotation.geometry, window, dims);
        }
    }

    if let Some(preview) = preview {
        ctx.set_line_width(2.0);
        let _ = ctx.set_line_dash(&js_sys::Array::of2(&6.0.into(), &4.0.into()));
        draw_geometry(ctx, &preview.geometry, window, dims, colors::DRAFT);
        let _ = ctx.set_line_dash(&js_sys::Array::new());
        draw_handles(ctx, &preview.geometry, window, dims);
    }
}

pub fn draw_chips(ctx: &CanvasRenderingContext2d, clusters: &[ChipCluster], chip_height: f64) {
    ctx.set_font("10px sans-serif");
    ctx.set_text_baseline("middle");
    for cluster in clusters {
        let mut last_y = cluster.anchor.y;
        for chip in &cluster.chips {
            let label = chip.tag.to_string();
            let width = ctx.measure_text(&label).map(|m| m.width()).unwrap_or(40.0) + 8.0;
            ctx.set_fill_style_str(&rgba(colors::tag_color(&chip.tag), 0.85));
            ctx.fill_rect(chip.origin.x, chip.origin.y, width, chip_height);
            ctx.set_fill_style_str("#000");
            let _ = ctx.fill_text(&label, chip.origin.x + 4.0, chip.origin.y + chip_height / 2.0);
            last_y = chip.origin.y + chip_height;
        }
        if cluster.hidden > 0 {
            ctx.set_fill_style_str("rgba(255,255,255,0.8)");
            let _ = ctx.fill_text(&format!("+{}", cluster.hidden), cluster.anchor.x + 2.0, last_y + 7.0);
        }
    }
    ctx.set_text_baseline("alphabetic");
}

pub fn draw_measurement(ctx: &CanvasRenderingContext2d, m: &Measurement, window: &Window, dims: Dimensions) {
    let a = transform::to_pixel(m.from, window, dims);
    let b = transform::to_pixel(m.to, window, dims);
    ctx.set_stroke_style_str(&rgba(colors::MEASURE, 0.9));
    ctx.set_line_width(1.0);
    ctx.stroke_rect(a.x.min(b.x), a.y.min(b.y), (b.x - a.x).abs(), (b.y - a.y).abs());

    let label = format!(
        "{} / {:.0} Hz",
        format_time_label(m.duration(), m.duration().max(0.0001)),
        m.bandwidth()
    );
    ctx.set_font("11px sans-serif");
    ctx.set_fill_style_str("rgba(0,0,0,0.7)");
    let tw = ctx.measure_text(&label).map(|t| t.width()).unwrap_or(80.0);
    let x = a.x.max(b.x) + 4.0;
    let y = a.y.min(b.y);
    ctx.fill_rect(x - 2.0, y, tw + 4.0, 14.0);
    ctx.set_fill_style_str(&rgba(colors::MEASURE, 1.0));
    let _ = ctx.fill_text(&label, x, y + 11.0);
}

pub fn draw_zoom_box(ctx: &CanvasRenderingContext2d, rect: &PixelRect) {
    ctx.set_fill_style_str("rgba(255,255,255,0.08)");
    ctx.fill_rect(rect.x, rect.y, rect.width, rect.height);
    ctx.set_stroke_style_str("rgba(255,255,255,0.7)");
    ctx.set_line_width(1.0);
    ctx.stroke_rect(rect.x, rect.y, rect.width, rect.height);
}
