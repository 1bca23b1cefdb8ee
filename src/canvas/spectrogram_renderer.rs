use sonomark_core::segment_cache::{DrawOp, SegmentCache};
use sonomark_core::types::{Dimensions, PixelRect};
use web_sys::CanvasRenderingContext2d;

use crate::canvas::segment_loader::SegmentImage;

/// Clear the canvas and paint a draw plan. Segments still loading get a
/// dark placeholder; failed ones a red tint.
pub fn draw_segments(
    ctx: &CanvasRenderingContext2d,
    ops: &[DrawOp],
    cache: &SegmentCache<SegmentImage>,
    dims: Dimensions,
) {
    ctx.set_fill_style_str("#000");
    ctx.fill_rect(0.0, 0.0, dims.width, dims.height);

    for op in ops {
        match op {
            DrawOp::Image { key, src, dest } => {
                let Some(SegmentImage(bitmap)) = cache.peek(key) else {
                    fill(ctx, dest, "#111");
                    continue;
                };
                let w = bitmap.width() as f64;
                let h = bitmap.height() as f64;
                let sx = src.x0 * w;
                let sw = (src.x1 - src.x0) * w;
                if sw <= 0.0 || h <= 0.0 {
                    continue;
                }
                // Overdraw by a pixel to hide seams between neighbours.
                let res = ctx.draw_image_with_image_bitmap_and_sw_and_sh_and_dx_and_dy_and_dw_and_dh(
                    bitmap,
                    sx,
                    0.0,
                    sw,
                    h,
                    dest.x.floor(),
                    dest.y,
                    dest.width.ceil() + 1.0,
                    dest.height,
                );
                if let Err(e) = res {
                    log::error!("failed to draw segment {key:?}: {e:?}");
                }
            }
            DrawOp::Placeholder { dest } => fill(ctx, dest, "#111"),
            DrawOp::Failed { dest } => {
                fill(ctx, dest, "rgba(140,20,20,0.35)");
                ctx.set_fill_style_str("rgba(255,160,160,0.8)");
                ctx.set_font("11px sans-serif");
                let _ = ctx.fill_text("failed to load", dest.x.max(0.0) + 6.0, dest.y.max(0.0) + 16.0);
            }
        }
    }
}

fn fill(ctx: &CanvasRenderingContext2d, rect: &PixelRect, style: &str) {
    ctx.set_fill_style_str(style);
    ctx.fill_rect(rect.x, rect.y, rect.width, rect.height);
}
