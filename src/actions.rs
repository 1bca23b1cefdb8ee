//! Applying engine output to the page: reactive state, segment loads and
//! annotation persistence.

use std::rc::Rc;

use leptos::prelude::*;
use sonomark_core::annotation::Mutation;
use sonomark_core::controller::{Controller, EngineEvent};
use sonomark_core::input::Key;
use sonomark_core::interaction::{InteractionEvent, ModeKind};
use sonomark_core::params::{QueryUrlProvider, SpectrogramParameters};
use sonomark_core::segment_cache::SegmentCache;
use sonomark_core::store::{begin_mutation, finish_mutation, MemoryStore, ParentContext};
use sonomark_core::types::{Dimensions, Window};
use sonomark_core::viewport::Viewport;
use wasm_bindgen_futures::spawn_local;

use crate::canvas::segment_loader::schedule_segments;
use crate::state::{
    annotations_snapshot, with_controller, AppState, ViewerSetup, ANNOTATIONS, CACHE, CONTROLLER, MAIN_VIEWER, PARENT,
    PROVIDER, STORE,
};

/// Mirror controller output into `state` and start whatever work it implies.
pub fn dispatch(state: AppState, events: Vec<EngineEvent>) {
    let mut window_changed = false;
    for event in events {
        match event {
            EngineEvent::Window(w) => {
                state.window.set(Some(w));
                window_changed = true;
            }
            EngineEvent::Interaction(event) => match event {
                InteractionEvent::Selected(id) => state.selection.set(Some(id)),
                InteractionEvent::Deselected => state.selection.set(None),
                InteractionEvent::Preview(p) => state.preview.set(Some(p)),
                InteractionEvent::PreviewCleared => state.preview.set(None),
                InteractionEvent::Commit(mutation) => commit(state, mutation),
                InteractionEvent::Measured(m) => state.measurement.set(Some(m)),
            },
            EngineEvent::Seek(p) => state.seek.set(Some(p.time)),
            EngineEvent::ZoomBox(rect) => state.zoom_box.set(rect),
            EngineEvent::Hover(p) => state.hover.set(Some(p)),
        }
    }

    if let Some(kind) = with_controller(|c| c.interaction().mode().kind()) {
        if state.mode.get_untracked() != kind {
            if !matches!(kind, ModeKind::Measure) {
                state.measurement.set(None);
            }
            state.mode.set(kind);
        }
    }
    if window_changed {
        schedule_segments(state);
    }
}

/// Apply a mutation and redraw at once, then persist it in the background.
/// A failed save rolls the change back and surfaces the error.
pub fn commit(state: AppState, mutation: Mutation) {
    let set = ANNOTATIONS.with(Rc::clone);
    let pending = match begin_mutation(&set, mutation) {
        Ok(pending) => pending,
        Err(e) => {
            if e.is_user_facing() {
                state.status.set(Some(e.to_string()));
            }
            return;
        }
    };
    annotations_changed(state);

    let store = STORE.with(|s| s.borrow().clone());
    let parent = PARENT.with(|p| p.borrow().clone());
    let target = pending.target.clone();
    spawn_local(async move {
        match finish_mutation(&set, &*store, &parent, pending).await {
            Ok(record) => {
                log::debug!("saved {}", record.id);
                if target.is_pending() {
                    with_controller(|c| c.interaction_mut().retarget(&target, &record.id));
                    if state.selection.get_untracked().as_ref() == Some(&target) {
                        state.selection.set(Some(record.id));
                    }
                }
            }
            Err(e) => state.status.set(Some(e.to_string())),
        }
        annotations_changed(state);
    });
}

/// Redraw after the annotation list changed and drop a selection that no
/// longer exists.
fn annotations_changed(state: AppState) {
    let annotations = annotations_snapshot();
    let events = with_controller(|c| c.interaction_mut().sync_annotations(&annotations)).unwrap_or_default();
    state.bump_annotations();
    dispatch(state, events.into_iter().map(EngineEvent::Interaction).collect());
}

pub fn key(state: AppState, key: Key) {
    let annotations = annotations_snapshot();
    let events = with_controller(|c| c.key(key, &annotations)).unwrap_or_default();
    dispatch(state, events);
}

pub fn set_mode(state: AppState, mode: ModeKind) {
    match with_controller(|c| c.set_mode(mode)) {
        Some(Ok(events)) => dispatch(state, events),
        Some(Err(e)) => log::warn!("cannot switch mode: {e}"),
        None => {}
    }
}

pub fn cycle_filter(state: AppState) {
    let annotations = annotations_snapshot();
    let tag = with_controller(|c| c.cycle_filter(&annotations).cloned()).flatten();
    state.filter.set(tag);
}

/// Run a viewport operation (zoom buttons, reset, history) and publish the
/// resulting window.
pub fn viewport(state: AppState, f: impl FnOnce(&mut Viewport) -> Option<Window>) {
    if let Some(Some(window)) = with_controller(|c| f(c.viewport_mut())) {
        dispatch(state, vec![EngineEvent::Window(window)]);
    }
}

/// Install a freshly loaded setup: cache, store, controller, reactive state.
pub fn open(state: AppState, setup: ViewerSetup) {
    let ViewerSetup { recording, segment_url, parent, params, initial_window, annotations, default_tags, engine, .. } = setup;
    log::info!("opening {} ({:.1}s, {} annotations)", recording.id, recording.duration, annotations.len());

    let previous = with_controller(|c| c.recording().id.clone());
    CACHE.with(|c| {
        let mut cache = c.borrow_mut();
        cache.release_viewer(MAIN_VIEWER);
        if let Some(old) = previous.filter(|old| *old != recording.id) {
            log::debug!("dropping cached segments of {old}");
            cache.clear_recording(&old);
        }
        if cache.max_bytes() != engine.cache.max_bytes {
            *cache = SegmentCache::new(engine.cache.max_bytes);
        }
    });
    PROVIDER.with(|p| *p.borrow_mut() = QueryUrlProvider { base_url: segment_url });
    PARENT.with(|p| *p.borrow_mut() = parent.unwrap_or_else(|| ParentContext { id: recording.id.clone() }));
    STORE.with(|s| *s.borrow_mut() = Rc::new(MemoryStore::new(annotations.clone())));
    ANNOTATIONS.with(|a| a.borrow_mut().replace_all(annotations));

    let mut controller = Controller::new(engine, recording.clone(), params.clone(), initial_window, Dimensions::new(1.0, 1.0));
    controller.interaction_mut().set_default_tags(default_tags);
    CACHE.with(|c| controller.register(&mut c.borrow_mut(), MAIN_VIEWER));
    let window = controller.window();
    state.fixed_aspect_ratio.set(controller.viewport().fixed_aspect_ratio);
    CONTROLLER.with(|c| *c.borrow_mut() = Some(controller));

    state.recording.set(Some(recording));
    state.params.set(params);
    state.bump_annotations();
    dispatch(state, vec![EngineEvent::Window(window)]);
}

/// Switch render parameters. Loads for the old parameters finish as stale.
pub fn set_params(state: AppState, params: SpectrogramParameters) {
    let window = CACHE.with(|cache| {
        with_controller(|c| {
            let window = c.set_params(params.clone());
            c.register(&mut cache.borrow_mut(), MAIN_VIEWER);
            window
        })
    });
    let Some(window) = window else { return };
    state.params.set(params);
    state.bump_segments();
    dispatch(state, vec![EngineEvent::Window(window)]);
}
