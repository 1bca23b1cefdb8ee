//! Pan / zoom-box / scroll gesture recognition.
//!
//! The machine reads the current window but never owns it; it emits
//! [`MotionIntent`]s that the caller applies to its viewport.

use crate::config::{InteractionConfig, MotionConfig, ScrollAxis};
use crate::input::{Modifiers, PointerInput};
use crate::transform;
use crate::types::{Dimensions, Pixel, PixelRect, Position, Window};
use crate::viewport::Axis;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MotionState {
    Idle,
    Panning { start: Pixel, origin: Window, moved: bool },
    ZoomBox { start: Pixel, current: Pixel },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MotionIntent {
    /// Show this window while the drag continues.
    Preview(Window),
    /// Final window of a gesture.
    Commit(Window),
    /// Drop any preview and return to the pre-drag window.
    Cancel,
    ScaleAbout { factor: f64, axis: Axis, anchor: Position },
    /// Rubber band to draw while a zoom box is dragged.
    ZoomBox(PixelRect),
    Click { position: Position, modifiers: Modifiers },
    Seek(Position),
    Hover(Position),
}

#[derive(Clone, Debug)]
pub struct MotionMachine {
    state: MotionState,
    enabled: bool,
    bindings: MotionConfig,
    click_tolerance: f64,
    zoom_step: f64,
    hover: Option<Position>,
}

fn scroll_axis(axis: ScrollAxis) -> Axis {
    match axis {
        ScrollAxis::Time => Axis::Time,
        ScrollAxis::Freq => Axis::Freq,
        ScrollAxis::Both => Axis::Both,
    }
}

impl MotionMachine {
    pub fn new(bindings: &MotionConfig, interaction: &InteractionConfig, zoom_step: f64) -> Self {
        Self {
            state: MotionState::Idle,
            enabled: true,
            bindings: bindings.clone(),
            click_tolerance: interaction.click_tolerance_px,
            zoom_step,
            hover: None,
        }
    }

    pub fn state(&self) -> MotionState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Last pointer position over the canvas, tracked even while disabled.
    pub fn hover(&self) -> Option<Position> {
        self.hover
    }

    /// Disabling drops any gesture in progress.
    pub fn set_enabled(&mut self, enabled: bool) -> Option<MotionIntent> {
        self.enabled = enabled;
        if enabled {
            return None;
        }
        let was_panning = matches!(self.state, MotionState::Panning { moved: true, .. });
        self.state = MotionState::Idle;
        was_panning.then_some(MotionIntent::Cancel)
    }

    fn start_state(&self, pixel: Pixel, modifiers: Modifiers, window: &Window) -> MotionState {
        let pan = MotionState::Panning { start: pixel, origin: *window, moved: false };
        let zoom = MotionState::ZoomBox { start: pixel, current: pixel };
        if modifiers.held_specific(self.bindings.zoom_box) {
            zoom
        } else if modifiers.held_specific(self.bindings.pan) {
            pan
        } else if self.bindings.zoom_box == crate::config::Modifier::None {
            zoom
        } else if self.bindings.pan == crate::config::Modifier::None {
            pan
        } else {
            MotionState::Idle
        }
    }

    fn panned(origin: &Window, start: Pixel, pixel: Pixel, dims: Dimensions) -> Window {
        let dt = (pixel.x - start.x) * transform::seconds_per_pixel(origin, dims.width);
        let df = (pixel.y - start.y) * transform::hz_per_pixel(origin, dims.height);
        Window::new(origin.time.shifted(-dt), origin.freq.shifted(df))
    }

    /// Update the hover position only. Used for input another layer has
    /// already consumed.
    pub fn track(&mut self, input: PointerInput, window: &Window, dims: Dimensions) -> Option<MotionIntent> {
        match input {
            PointerInput::Leave => {
                self.hover = None;
                None
            }
            _ => {
                let position = transform::to_position(input.pixel()?, window, dims);
                self.hover = Some(position);
                matches!(input, PointerInput::Move { .. }).then_some(MotionIntent::Hover(position))
            }
        }
    }

    pub fn handle(&mut self, input: PointerInput, window: &Window, dims: Dimensions) -> Vec<MotionIntent> {
        let mut out: Vec<MotionIntent> = self.track(input, window, dims).into_iter().collect();
        if let PointerInput::DoubleClick { pixel, .. } = input {
            out.push(MotionIntent::Seek(transform::to_position(pixel, window, dims)));
            return out;
        }
        if !self.enabled {
            return out;
        }

        match (self.state, input) {
            (MotionState::Idle, PointerInput::Down { pixel, modifiers }) => {
                self.state = self.start_state(pixel, modifiers, window);
            }
            (MotionState::Idle, PointerInput::Wheel { pixel, delta_y, modifiers }) => {
                if delta_y != 0.0 {
                    let factor = if delta_y < 0.0 {
                        self.zoom_step
                    } else {
                        1.0 / self.zoom_step
                    };
                    let axis = if modifiers.held_specific(self.bindings.scroll_alt_modifier) {
                        self.bindings.scroll_alt
                    } else {
                        self.bindings.scroll
                    };
                    out.push(MotionIntent::ScaleAbout {
                        factor,
                        axis: scroll_axis(axis),
                        anchor: transform::to_position(pixel, window, dims),
                    });
                }
            }
            (MotionState::Panning { start, origin, moved }, PointerInput::Move { pixel, .. }) => {
                if moved || start.distance_to(pixel) > self.click_tolerance {
                    self.state = MotionState::Panning { start, origin, moved: true };
                    out.push(MotionIntent::Preview(Self::panned(&origin, start, pixel, dims)));
                }
            }
            (MotionState::Panning { start, origin, moved }, PointerInput::Up { pixel, modifiers }) => {
                self.state = MotionState::Idle;
                if moved || start.distance_to(pixel) > self.click_tolerance {
                    out.push(MotionIntent::Commit(Self::panned(&origin, start, pixel, dims)));
                } else {
                    out.push(MotionIntent::Click { position: transform::to_position(pixel, window, dims), modifiers });
                }
            }
            (MotionState::ZoomBox { start, .. }, PointerInput::Move { pixel, .. }) => {
                self.state = MotionState::ZoomBox { start, current: pixel };
                out.push(MotionIntent::ZoomBox(PixelRect::from_corners(start, pixel)));
            }
            (MotionState::ZoomBox { start, .. }, PointerInput::Up { pixel, modifiers }) => {
                self.state = MotionState::Idle;
                let rect = PixelRect::from_corners(start, pixel);
                if rect.width > self.click_tolerance && rect.height > self.click_tolerance {
                    let a = transform::to_position(start, window, dims);
                    let b = transform::to_position(pixel, window, dims);
                    out.push(MotionIntent::Commit(Window::from_corners(a, b)));
                } else {
                    out.push(MotionIntent::Click { position: transform::to_position(pixel, window, dims), modifiers });
                }
            }
            (MotionState::Panning { moved, .. }, PointerInput::Leave) => {
                self.state = MotionState::Idle;
                if moved {
                    out.push(MotionIntent::Cancel);
                }
            }
            (MotionState::ZoomBox { .. }, PointerInput::Leave) => {
                self.state = MotionState::Idle;
            }
            _ => {}
        }
        out
    }
}

/// Window for a two-finger pinch: scale the starting window by the ratio
/// of finger distances about the gesture's starting midpoint.
pub fn pinch_window(origin: &Window, start: (Pixel, Pixel), current: (Pixel, Pixel), dims: Dimensions) -> Window {
    let d0 = start.0.distance_to(start.1);
    let d1 = current.0.distance_to(current.1);
    if d0 <= 0.0 || d1 <= 0.0 {
        return *origin;
    }
    let factor = d0 / d1;
    let mid0 = Pixel::new((start.0.x + start.1.x) / 2.0, (start.0.y + start.1.y) / 2.0);
    let mid1 = Pixel::new((current.0.x + current.1.x) / 2.0, (current.0.y + current.1.y) / 2.0);
    let anchor = transform::to_position(mid0, origin, dims);
    let scaled = Window::new(origin.time.scaled_about(factor, anchor.time), origin.freq);
    // Follow the midpoint as the fingers travel.
    let dt = (mid1.x - mid0.x) * transform::seconds_per_pixel(&scaled, dims.width);
    Window::new(scaled.time.shifted(-dt), scaled.freq)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Interval;

    fn window() -> Window {
        Window::new(Interval::new(0.0, 10.0), Interval::new(0.0, 1000.0))
    }

    fn dims() -> Dimensions {
        Dimensions::new(100.0, 100.0)
    }

    fn machine() -> MotionMachine {
        MotionMachine::new(&MotionConfig::default(), &InteractionConfig::default(), 0.8)
    }

    fn down(x: f64, y: f64, modifiers: Modifiers) -> PointerInput {
        PointerInput::Down { pixel: Pixel::new(x, y), modifiers }
    }

    fn mv(x: f64, y: f64) -> PointerInput {
        PointerInput::Move { pixel: Pixel::new(x, y), modifiers: Modifiers::NONE }
    }

    fn up(x: f64, y: f64) -> PointerInput {
        PointerInput::Up { pixel: Pixel::new(x, y), modifiers: Modifiers::NONE }
    }

    #[test]
    fn plain_drag_pans_against_pointer() {
        let mut m = machine();
        m.handle(down(50.0, 50.0, Modifiers::NONE), &window(), dims());
        let out = m.handle(mv(40.0, 60.0), &window(), dims());
        let expected = Window::new(Interval::new(1.0, 11.0), Interval::new(100.0, 1100.0));
        assert!(out.contains(&MotionIntent::Preview(expected)));
        let out = m.handle(up(40.0, 60.0), &window(), dims());
        assert_eq!(out, vec![MotionIntent::Commit(expected)]);
        assert_eq!(m.state(), MotionState::Idle);
    }

    #[test]
    fn tiny_drag_is_a_click() {
        let mut m = machine();
        m.handle(down(50.0, 50.0, Modifiers::NONE), &window(), dims());
        assert_eq!(m.handle(mv(51.0, 50.0), &window(), dims()).len(), 1);
        let out = m.handle(up(51.0, 50.0), &window(), dims());
        assert!(matches!(out.as_slice(), [MotionIntent::Click { .. }]));
    }

    #[test]
    fn ctrl_drag_commits_zoom_box() {
        let mut m = machine();
        m.handle(down(20.0, 80.0, Modifiers::ctrl()), &window(), dims());
        assert!(matches!(m.state(), MotionState::ZoomBox { .. }));
        let out = m.handle(up(60.0, 20.0), &window(), dims());
        let expected = Window::new(Interval::new(2.0, 6.0), Interval::new(200.0, 800.0));
        assert_eq!(out.len(), 1);
        match out[0] {
            MotionIntent::Commit(w) => {
                assert!((w.time.min - expected.time.min).abs() < 1e-9);
                assert!((w.time.max - expected.time.max).abs() < 1e-9);
                assert!((w.freq.min - expected.freq.min).abs() < 1e-9);
                assert!((w.freq.max - expected.freq.max).abs() < 1e-9);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn wheel_picks_axis_and_returns_to_idle() {
        let mut m = machine();
        let wheel = |modifiers| PointerInput::Wheel { pixel: Pixel::new(25.0, 50.0), delta_y: -3.0, modifiers };
        let out = m.handle(wheel(Modifiers::NONE), &window(), dims());
        assert_eq!(
            out,
            vec![MotionIntent::ScaleAbout { factor: 0.8, axis: Axis::Time, anchor: Position::new(2.5, 500.0) }]
        );
        assert_eq!(m.state(), MotionState::Idle);
        let out = m.handle(wheel(Modifiers::shift()), &window(), dims());
        assert!(matches!(out[0], MotionIntent::ScaleAbout { axis: Axis::Freq, .. }));
    }

    #[test]
    fn disabled_machine_only_tracks_hover_and_seek() {
        let mut m = machine();
        m.set_enabled(false);
        assert!(m.handle(down(50.0, 50.0, Modifiers::NONE), &window(), dims()).is_empty());
        let out = m.handle(mv(10.0, 50.0), &window(), dims());
        assert_eq!(out, vec![MotionIntent::Hover(Position::new(1.0, 500.0))]);
        assert_eq!(m.hover(), Some(Position::new(1.0, 500.0)));
        assert_eq!(m.state(), MotionState::Idle);
        let out = m.handle(PointerInput::DoubleClick { pixel: Pixel::new(30.0, 0.0), modifiers: Modifiers::NONE }, &window(), dims());
        assert_eq!(out, vec![MotionIntent::Seek(Position::new(3.0, 1000.0))]);
    }

    #[test]
    fn disabling_mid_pan_cancels() {
        let mut m = machine();
        m.handle(down(50.0, 50.0, Modifiers::NONE), &window(), dims());
        m.handle(mv(10.0, 50.0), &window(), dims());
        assert_eq!(m.set_enabled(false), Some(MotionIntent::Cancel));
    }

    #[test]
    fn pinch_out_zooms_in_about_midpoint() {
        let start = (Pixel::new(40.0, 50.0), Pixel::new(60.0, 50.0));
        let current = (Pixel::new(30.0, 50.0), Pixel::new(70.0, 50.0));
        let w = pinch_window(&window(), start, current, dims());
        assert!((w.time.span() - 5.0).abs() < 1e-9);
        assert!((w.time.center() - 5.0).abs() < 1e-9);
        assert_eq!(w.freq, window().freq);
    }
}
