/// Pinch-to-zoom gesture helpers for the spectrogram canvas.
use sonomark_core::motion;
use sonomark_core::types::{Dimensions, Pixel, Window};

/// Snapshot of state at the moment a 2-finger touch begins.
#[derive(Clone, Copy, Debug)]
pub struct PinchState {
    /// Window at gesture start.
    pub origin: Window,
    /// Both fingers in canvas pixels at gesture start.
    pub start: (Pixel, Pixel),
}

/// Canvas-relative positions of exactly two touches.
pub fn two_finger_pixels(touches: &web_sys::TouchList, canvas_left: f64, canvas_top: f64) -> Option<(Pixel, Pixel)> {
    if touches.length() != 2 {
        return None;
    }
    let t0 = touches.get(0)?;
    let t1 = touches.get(1)?;
    let at = |t: &web_sys::Touch| Pixel::new(t.client_x() as f64 - canvas_left, t.client_y() as f64 - canvas_top);
    Some((at(&t0), at(&t1)))
}

/// Window for the current finger positions. Fingers closer than 10 px at
/// the start give no usable ratio and leave the window alone.
pub fn apply_pinch(pinch: &PinchState, current: (Pixel, Pixel), dims: Dimensions) -> Window {
    if dims.width == 0.0 || pinch.start.0.distance_to(pinch.start.1) < 10.0 {
        return pinch.origin;
    }
    motion::pinch_window(&pinch.origin, pinch.start, current, dims)
}
