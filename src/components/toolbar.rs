use leptos::prelude::*;
use sonomark_core::geometry::GeometryKind;
use sonomark_core::interaction::{ModeKind, DRAWABLE};
use sonomark_core::params::SpectrogramParameters;
use sonomark_core::viewport::Axis;

use crate::actions;
use crate::canvas::segment_loader;
use crate::state::{with_controller, AppState};

/// STFT window lengths offered, in seconds.
const WINDOW_SIZES: [f64; 5] = [0.0025, 0.005, 0.01, 0.025, 0.05];

fn mode_class(active: bool) -> &'static str {
    if active {
        "toolbar-btn sel"
    } else {
        "toolbar-btn"
    }
}

fn draw_label(kind: GeometryKind) -> &'static str {
    match kind {
        GeometryKind::TimeStamp => "Stamp",
        GeometryKind::TimeInterval => "Interval",
        GeometryKind::Point => "Point",
        GeometryKind::BoundingBox => "Box",
        GeometryKind::LineString => "Line",
        GeometryKind::Polygon => "Polygon",
        other => other.name(),
    }
}

#[component]
pub fn Toolbar() -> impl IntoView {
    let state = expect_context::<AppState>();
    let is_mode = move |kind: ModeKind| state.mode.get() == kind;

    let zoom = move |factor: f64| actions::viewport(state, move |v| Some(v.zoom_by(factor, Axis::Both)));
    let zoom_step = move || with_controller(|c| c.config().viewport.zoom_step).unwrap_or(0.8);

    view! {
        <div class="toolbar">
            <span class="toolbar-brand"><b>"sono"</b><i>"mark"</i></span>

            // Modes
            <button
                class=move || mode_class(is_mode(ModeKind::Select) || is_mode(ModeKind::Edit))
                on:click=move |_| actions::set_mode(state, ModeKind::Select)
                title="Select and edit (Esc)"
            >"Select"</button>
            {DRAWABLE.into_iter().map(|kind| view! {
                <button
                    class=move || mode_class(is_mode(ModeKind::Draw(kind)))
                    on:click=move |_| actions::set_mode(state, ModeKind::Draw(kind))
                    title=format!("Draw {}", kind.name())
                >{draw_label(kind)}</button>
            }).collect_view()}
            <button
                class=move || mode_class(is_mode(ModeKind::Delete))
                on:click=move |_| actions::set_mode(state, ModeKind::Delete)
                title="Delete by clicking"
            >"Delete"</button>
            <button
                class=move || mode_class(is_mode(ModeKind::Measure))
                on:click=move |_| actions::set_mode(state, ModeKind::Measure)
                title="Measure duration and bandwidth"
            >"Measure"</button>

            <div style="flex: 1;"></div>

            <select
                class="toolbar-select"
                title="STFT window length"
                on:change=move |ev| {
                    if let Ok(window_size) = event_target_value(&ev).parse::<f64>() {
                        let params = SpectrogramParameters { window_size, ..state.params.get_untracked() };
                        actions::set_params(state, params);
                    }
                }
            >
                {WINDOW_SIZES.into_iter().map(|size| view! {
                    <option
                        value=size.to_string()
                        selected=move || (state.params.get().window_size - size).abs() < 1e-9
                    >{format!("{} ms", size * 1000.0)}</option>
                }).collect_view()}
            </select>

            // Viewport
            <button class="toolbar-btn" on:click=move |_| zoom(zoom_step()) title="Zoom in">"+"</button>
            <button class="toolbar-btn" on:click=move |_| zoom(1.0 / zoom_step()) title="Zoom out">"\u{2212}"</button>
            <button
                class="toolbar-btn"
                on:click=move |_| actions::viewport(state, |v| Some(v.reset()))
                title="Reset view (R)"
            >"Reset"</button>
            <button
                class="toolbar-btn"
                on:click=move |_| actions::viewport(state, |v| v.back())
                title="Previous view"
            >"\u{2190}"</button>
            <button
                class="toolbar-btn"
                on:click=move |_| actions::viewport(state, |v| v.forward())
                title="Next view"
            >"\u{2192}"</button>
            <button
                class=move || mode_class(state.fixed_aspect_ratio.get())
                on:click=move |_| {
                    let locked = !state.fixed_aspect_ratio.get_untracked();
                    with_controller(|c| c.viewport_mut().fixed_aspect_ratio = locked);
                    state.fixed_aspect_ratio.set(locked);
                }
                title="Lock aspect ratio"
            >"1:1"</button>

            // Annotations
            <button
                class=move || mode_class(state.filter.get().is_some())
                on:click=move |_| actions::cycle_filter(state)
                title="Cycle tag filter for n/p navigation (F)"
            >{move || match state.filter.get() {
                Some(tag) => format!("Filter: {tag}"),
                None => "Filter: all".to_string(),
            }}</button>
            <button
                class=move || mode_class(!state.editable.get())
                on:click=move |_| {
                    let editable = !state.editable.get_untracked();
                    let events = with_controller(|c| c.set_editable(editable)).unwrap_or_default();
                    state.editable.set(editable);
                    actions::dispatch(state, events);
                }
                title="Lock annotations"
            >"Lock"</button>
            <button
                class="toolbar-btn"
                on:click=move |_| segment_loader::retry_failed(state)
                title="Retry segments that failed to load"
            >"Retry"</button>
        </div>
    }
}
