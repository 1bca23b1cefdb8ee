use leptos::prelude::*;
use sonomark_core::input::{Key, Modifiers, PointerInput};
use sonomark_core::interaction::ModeKind;
use sonomark_core::types::{Dimensions, Pixel};
use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};

use crate::actions;
use crate::canvas::segment_loader::schedule_segments;
use crate::canvas::{annotation_renderer, spectrogram_renderer, time_markers};
use crate::components::pinch::{self, PinchState};
use crate::state::{annotations_snapshot, with_controller, AppState, CACHE};

fn modifiers(ev: &web_sys::MouseEvent) -> Modifiers {
    Modifiers { shift: ev.shift_key(), ctrl: ev.ctrl_key(), alt: ev.alt_key(), meta: ev.meta_key() }
}

/// Keyboard shortcuts handled by the engine.
pub fn engine_key(key: &str) -> Option<Key> {
    match key {
        "Escape" => Some(Key::Escape),
        "Enter" => Some(Key::Enter),
        "Backspace" => Some(Key::Backspace),
        "Delete" => Some(Key::Delete),
        "n" | "ArrowDown" => Some(Key::Next),
        "p" | "ArrowUp" => Some(Key::Previous),
        _ => None,
    }
}

fn cursor_for(mode: ModeKind) -> &'static str {
    match mode {
        ModeKind::Draw(_) | ModeKind::Measure => "cursor: crosshair",
        ModeKind::Delete => "cursor: not-allowed",
        ModeKind::Edit => "cursor: move",
        ModeKind::Idle | ModeKind::Select => "cursor: grab",
    }
}

fn context_2d(canvas: &HtmlCanvasElement) -> Option<CanvasRenderingContext2d> {
    canvas.get_context("2d").ok().flatten()?.dyn_into::<CanvasRenderingContext2d>().ok()
}

#[component]
pub fn Spectrogram() -> impl IntoView {
    let state = expect_context::<AppState>();
    let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
    let pinch_state: RwSignal<Option<PinchState>> = RwSignal::new(None);

    // Redraw on any change of window, segments, annotations or overlays
    Effect::new(move || {
        let _ = state.window.get();
        let _ = state.segment_ready_signal.get();
        let _ = state.annotations_version.get();
        let selection = state.selection.get();
        let preview = state.preview.get();
        let measurement = state.measurement.get();
        let zoom_box = state.zoom_box.get();
        let seek = state.seek.get();

        let Some(canvas_el) = canvas_ref.get() else { return };
        let canvas: &HtmlCanvasElement = canvas_el.as_ref();

        // Sync canvas internal resolution with display size
        let rect = canvas.get_bounding_client_rect();
        let display_w = rect.width() as u32;
        let display_h = rect.height() as u32;
        if display_w == 0 || display_h == 0 {
            return;
        }
        let resized = canvas.width() != display_w || canvas.height() != display_h;
        if resized {
            canvas.set_width(display_w);
            canvas.set_height(display_h);
        }
        let Some(ctx) = context_2d(canvas) else { return };
        let dims = Dimensions::new(display_w as f64, display_h as f64);

        let annotations = annotations_snapshot();
        let frame = CACHE.with(|cache| {
            with_controller(|c| {
                c.set_dimensions(dims);
                let ops = c.draw_plan(&mut cache.borrow_mut());
                (ops, c.window(), c.chips(&annotations), c.config().overlay.chip_height)
            })
        });
        let Some((ops, window, chips, chip_height)) = frame else {
            ctx.set_fill_style_str("#000");
            ctx.fill_rect(0.0, 0.0, dims.width, dims.height);
            return;
        };

        CACHE.with(|cache| spectrogram_renderer::draw_segments(&ctx, &ops, &cache.borrow(), dims));
        annotation_renderer::draw_annotations(&ctx, &annotations, selection.as_ref(), preview.as_ref(), &window, dims);
        annotation_renderer::draw_chips(&ctx, &chips, chip_height);
        if let Some(m) = measurement {
            annotation_renderer::draw_measurement(&ctx, &m, &window, dims);
        }
        if let Some(rect) = zoom_box {
            annotation_renderer::draw_zoom_box(&ctx, &rect);
        }
        if let Some(time) = seek {
            time_markers::draw_seek_marker(&ctx, time, &window, dims);
        }
        time_markers::draw_time_markers(&ctx, &window, dims);
        time_markers::draw_freq_markers(&ctx, &window, dims);

        if resized {
            schedule_segments(state);
        }
    });

    let canvas_offset = move || -> Option<(f64, f64)> {
        let canvas = canvas_ref.get_untracked()?;
        let rect = canvas.get_bounding_client_rect();
        Some((rect.left(), rect.top()))
    };
    let canvas_pixel = move |ev: &web_sys::MouseEvent| -> Option<Pixel> {
        let (left, top) = canvas_offset()?;
        Some(Pixel::new(ev.client_x() as f64 - left, ev.client_y() as f64 - top))
    };
    let send = move |input: PointerInput| {
        let annotations = annotations_snapshot();
        let events = with_controller(|c| c.pointer(input, &annotations)).unwrap_or_default();
        actions::dispatch(state, events);
    };

    let on_pointerdown = move |ev: web_sys::PointerEvent| {
        if ev.button() != 0 || pinch_state.get_untracked().is_some() {
            return;
        }
        if let Some(canvas) = canvas_ref.get_untracked() {
            let _ = canvas.set_pointer_capture(ev.pointer_id());
        }
        if let Some(pixel) = canvas_pixel(&ev) {
            send(PointerInput::Down { pixel, modifiers: modifiers(&ev) });
        }
    };
    let on_pointermove = move |ev: web_sys::PointerEvent| {
        if pinch_state.get_untracked().is_some() {
            return;
        }
        if let Some(pixel) = canvas_pixel(&ev) {
            send(PointerInput::Move { pixel, modifiers: modifiers(&ev) });
        }
    };
    let on_pointerup = move |ev: web_sys::PointerEvent| {
        if pinch_state.get_untracked().is_some() {
            return;
        }
        if let Some(pixel) = canvas_pixel(&ev) {
            send(PointerInput::Up { pixel, modifiers: modifiers(&ev) });
        }
    };
    let on_pointerleave = move |_: web_sys::PointerEvent| {
        state.hover.set(None);
        send(PointerInput::Leave);
    };
    let on_dblclick = move |ev: web_sys::MouseEvent| {
        if let Some(pixel) = canvas_pixel(&ev) {
            send(PointerInput::DoubleClick { pixel, modifiers: modifiers(&ev) });
        }
    };
    let on_wheel = move |ev: web_sys::WheelEvent| {
        ev.prevent_default();
        if let Some(pixel) = canvas_pixel(&ev) {
            send(PointerInput::Wheel { pixel, delta_y: ev.delta_y(), modifiers: modifiers(&ev) });
        }
    };

    // ── Two-finger pinch ──
    let on_touchstart = move |ev: web_sys::TouchEvent| {
        let Some((left, top)) = canvas_offset() else { return };
        let Some(start) = pinch::two_finger_pixels(&ev.touches(), left, top) else { return };
        ev.prevent_default();
        // Drop whatever the first finger started.
        send(PointerInput::Leave);
        if let Some(origin) = with_controller(|c| c.window()) {
            pinch_state.set(Some(PinchState { origin, start }));
        }
    };
    let on_touchmove = move |ev: web_sys::TouchEvent| {
        let Some(pinch) = pinch_state.get_untracked() else { return };
        let Some((left, top)) = canvas_offset() else { return };
        let Some(current) = pinch::two_finger_pixels(&ev.touches(), left, top) else { return };
        ev.prevent_default();
        let Some(dims) = with_controller(|c| c.dimensions()) else { return };
        let window = pinch::apply_pinch(&pinch, current, dims);
        actions::viewport(state, |v| Some(v.preview(window)));
    };
    let on_touchend = move |ev: web_sys::TouchEvent| {
        if ev.touches().length() < 2 && pinch_state.get_untracked().is_some() {
            pinch_state.set(None);
            actions::viewport(state, |v| Some(v.set_window(v.window())));
        }
    };

    let key_handle = window_event_listener(leptos::ev::keydown, move |ev| {
        let in_input = ev
            .target()
            .and_then(|t| t.dyn_into::<web_sys::HtmlInputElement>().ok())
            .is_some();
        if in_input {
            return;
        }
        match ev.key().as_str() {
            "f" => actions::cycle_filter(state),
            "r" => actions::viewport(state, |v| Some(v.reset())),
            other => {
                if let Some(key) = engine_key(other) {
                    ev.prevent_default();
                    actions::key(state, key);
                }
            }
        }
    });
    on_cleanup(move || key_handle.remove());

    view! {
        <div class="spectrogram-container">
            <canvas
                node_ref=canvas_ref
                style=move || cursor_for(state.mode.get())
                on:pointerdown=on_pointerdown
                on:pointermove=on_pointermove
                on:pointerup=on_pointerup
                on:pointerleave=on_pointerleave
                on:dblclick=on_dblclick
                on:wheel=on_wheel
                on:touchstart=on_touchstart
                on:touchmove=on_touchmove
                on:touchend=on_touchend
                on:contextmenu=|ev: web_sys::MouseEvent| ev.prevent_default()
            />
        </div>
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shortcut_keys() {
        assert_eq!(engine_key("n"), Some(Key::Next));
        assert_eq!(engine_key("Backspace"), Some(Key::Backspace));
        assert_eq!(engine_key("x"), None);
    }
}
