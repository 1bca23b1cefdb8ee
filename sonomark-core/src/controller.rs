//! One spectrogram viewer: viewport, gestures, annotation interaction and
//! the tag filter behind a single input entry point.
//!
//! Pointer input goes to the interaction machine first. Whatever it does
//! not consume falls through to the motion machine, whose intents are
//! applied to the viewport here. Drawing, deleting and measuring switch
//! motion off for as long as they last.

use crate::annotation::{Annotation, Tag};
use crate::config::EngineConfig;
use crate::error::GeometryError;
use crate::input::{Key, PointerInput};
use crate::interaction::{InteractionEvent, InteractionMachine, ModeKind, Preview};
use crate::motion::{MotionIntent, MotionMachine};
use crate::navigation::{self, Direction};
use crate::params::{SegmentUrlProvider, SpectrogramParameters};
use crate::segment_cache::{CachedImage, DrawOp, FetchRequest, SegmentCache, ViewerId};
use crate::segments::Segmentation;
use crate::tag_overlay::{self, ChipCluster, TagFilter};
use crate::types::{Bounds, Dimensions, Interval, PixelRect, Position, RecordingInfo, Window};
use crate::viewport::Viewport;

/// What a front end needs to react to after feeding the controller input.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    /// The visible window changed; redraw and plan fetches.
    Window(Window),
    Interaction(InteractionEvent),
    /// Double click: move playback to this position.
    Seek(Position),
    /// Zoom-box rubber band, `None` once the gesture ends.
    ZoomBox(Option<PixelRect>),
    Hover(Position),
}

pub struct Controller {
    config: EngineConfig,
    recording: RecordingInfo,
    params: SpectrogramParameters,
    segmentation: Segmentation,
    viewport: Viewport,
    motion: MotionMachine,
    interaction: InteractionMachine,
    filter: TagFilter,
    dims: Dimensions,
    zoom_box: Option<PixelRect>,
}

fn data_bounds(recording: &RecordingInfo, params: &SpectrogramParameters) -> Bounds {
    Window::new(Interval::new(0.0, recording.duration), params.image_band(recording))
}

impl Controller {
    /// `initial` defaults to the whole recording.
    pub fn new(
        config: EngineConfig,
        recording: RecordingInfo,
        params: SpectrogramParameters,
        initial: Option<Window>,
        dims: Dimensions,
    ) -> Self {
        let bounds = data_bounds(&recording, &params);
        let viewport = Viewport::new(initial.unwrap_or(bounds), bounds, &config.viewport);
        let segmentation = Segmentation::new(&recording, &params, &config.segments);
        let motion = MotionMachine::new(&config.motion, &config.interaction, config.viewport.zoom_step);
        let interaction = InteractionMachine::new(&config.interaction, &config.motion);
        log::debug!(
            "viewer for {}: {} segments of {:.3}s",
            recording.id,
            segmentation.count(),
            segmentation.segment_duration
        );
        Self {
            config,
            recording,
            params,
            segmentation,
            viewport,
            motion,
            interaction,
            filter: TagFilter::default(),
            dims,
            zoom_box: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn recording(&self) -> &RecordingInfo {
        &self.recording
    }

    pub fn params(&self) -> &SpectrogramParameters {
        &self.params
    }

    pub fn segmentation(&self) -> &Segmentation {
        &self.segmentation
    }

    pub fn window(&self) -> Window {
        self.viewport.window()
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// Direct viewport access for toolbar buttons (zoom, reset, history).
    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    pub fn interaction(&self) -> &InteractionMachine {
        &self.interaction
    }

    pub fn interaction_mut(&mut self) -> &mut InteractionMachine {
        &mut self.interaction
    }

    pub fn motion(&self) -> &MotionMachine {
        &self.motion
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dims
    }

    pub fn set_dimensions(&mut self, dims: Dimensions) {
        self.dims = dims;
    }

    pub fn zoom_box(&self) -> Option<PixelRect> {
        self.zoom_box
    }

    pub fn filter(&self) -> Option<&Tag> {
        self.filter.get()
    }

    pub fn set_filter(&mut self, tag: Option<Tag>) {
        self.filter.set(tag);
    }

    pub fn cycle_filter(&mut self, annotations: &[Annotation]) -> Option<&Tag> {
        self.filter.cycle(annotations)
    }

    /// New render parameters: recompute segments and refit the window to
    /// the band the images cover. The caller re-registers with the cache.
    pub fn set_params(&mut self, params: SpectrogramParameters) -> Window {
        if params == self.params {
            return self.window();
        }
        self.segmentation = Segmentation::new(&self.recording, &params, &self.config.segments);
        self.viewport.set_bounds(data_bounds(&self.recording, &params));
        self.params = params;
        self.viewport.window()
    }

    /// Mark this viewer's recording and parameters as the ones worth
    /// keeping in `cache`.
    pub fn register<I: CachedImage>(&self, cache: &mut SegmentCache<I>, viewer: ViewerId) {
        cache.set_wanted(viewer, &self.recording, self.params.digest());
    }

    pub fn plan_fetches<I: CachedImage, P: SegmentUrlProvider + ?Sized>(
        &self,
        cache: &mut SegmentCache<I>,
        provider: &P,
    ) -> Vec<FetchRequest> {
        cache.plan_fetches(
            provider,
            &self.recording,
            &self.params,
            &self.segmentation,
            &self.viewport.window(),
            self.config.cache.preload,
        )
    }

    pub fn draw_plan<I: CachedImage>(&self, cache: &mut SegmentCache<I>) -> Vec<DrawOp> {
        cache.draw_plan(&self.recording, &self.params, &self.segmentation, &self.viewport.window(), self.dims)
    }

    pub fn chips(&self, annotations: &[Annotation]) -> Vec<ChipCluster> {
        tag_overlay::layout(annotations, &self.viewport.window(), self.dims, &self.config.overlay)
    }

    pub fn draft(&self) -> Option<Preview> {
        self.interaction.draft()
    }

    // ── Modes ───────────────────────────────────────────────────────────────

    /// Switch mode. `Edit` needs a target, so it lands in `Select`.
    pub fn set_mode(&mut self, mode: ModeKind) -> Result<Vec<EngineEvent>, GeometryError> {
        let events = match mode {
            ModeKind::Idle => self.interaction.enter_idle(),
            ModeKind::Select | ModeKind::Edit => self.interaction.enter_select(),
            ModeKind::Draw(kind) => self.interaction.enter_draw(kind)?,
            ModeKind::Delete => self.interaction.enter_delete(),
            ModeKind::Measure => self.interaction.enter_measure(),
        };
        Ok(self.settle(events))
    }

    /// Turn annotation editing on or off. Pan and zoom keep working.
    pub fn set_editable(&mut self, editable: bool) -> Vec<EngineEvent> {
        let events = self.interaction.set_enabled(editable);
        self.settle(events)
    }

    /// Wrap interaction events and bring motion in line with the new mode.
    fn settle(&mut self, events: Vec<InteractionEvent>) -> Vec<EngineEvent> {
        let mut out: Vec<EngineEvent> = events.into_iter().map(EngineEvent::Interaction).collect();
        let enable = !self.interaction.captures_pointer();
        if enable != self.motion.is_enabled() {
            if let Some(intent) = self.motion.set_enabled(enable) {
                self.apply(intent, &mut out);
            }
            if !enable && self.zoom_box.take().is_some() {
                out.push(EngineEvent::ZoomBox(None));
            }
        }
        out
    }

    // ── Input ───────────────────────────────────────────────────────────────

    pub fn pointer(&mut self, input: PointerInput, annotations: &[Annotation]) -> Vec<EngineEvent> {
        let window = self.viewport.window();
        let response = self.interaction.handle(input, annotations, &window, self.dims);
        let mut out = self.settle(response.events);

        if response.consumed {
            if let Some(MotionIntent::Hover(position)) = self.motion.track(input, &window, self.dims) {
                out.push(EngineEvent::Hover(position));
            }
            return out;
        }
        for intent in self.motion.handle(input, &window, self.dims) {
            self.apply(intent, &mut out);
        }
        out
    }

    pub fn key(&mut self, key: Key, annotations: &[Annotation]) -> Vec<EngineEvent> {
        match key {
            Key::Next => self.navigate(Direction::Next, annotations),
            Key::Previous => self.navigate(Direction::Previous, annotations),
            _ => {
                let events = self.interaction.handle_key(key);
                self.settle(events)
            }
        }
    }

    /// Select the next or previous annotation passing the tag filter,
    /// bringing it into view when it is off screen.
    pub fn navigate(&mut self, direction: Direction, annotations: &[Annotation]) -> Vec<EngineEvent> {
        let target = navigation::navigate(
            annotations,
            self.interaction.selection(),
            direction,
            &self.filter,
            &self.viewport.window(),
        );
        let Some(target) = target else {
            return Vec::new();
        };
        let events = self.interaction.select(target.id);
        let mut out = self.settle(events);
        if let Some((time, freq)) = target.center_on {
            out.push(EngineEvent::Window(self.viewport.center_on(Some(time), freq)));
        }
        out
    }

    fn apply(&mut self, intent: MotionIntent, out: &mut Vec<EngineEvent>) {
        match intent {
            MotionIntent::Preview(window) => out.push(EngineEvent::Window(self.viewport.preview_drag(window))),
            MotionIntent::Commit(window) => {
                self.clear_zoom_box(out);
                out.push(EngineEvent::Window(self.viewport.drag_to(window)));
            }
            MotionIntent::Cancel => {
                self.clear_zoom_box(out);
                out.push(EngineEvent::Window(self.viewport.cancel_preview()));
            }
            MotionIntent::ScaleAbout { factor, axis, anchor } => {
                out.push(EngineEvent::Window(self.viewport.scale_about(factor, axis, anchor)));
            }
            MotionIntent::ZoomBox(rect) => {
                self.zoom_box = Some(rect);
                out.push(EngineEvent::ZoomBox(Some(rect)));
            }
            MotionIntent::Click { .. } => {
                self.clear_zoom_box(out);
                // A click on empty space drops the selection.
                if self.interaction.mode().kind() == ModeKind::Edit {
                    let events = self.interaction.abort();
                    out.extend(events.into_iter().map(EngineEvent::Interaction));
                }
            }
            MotionIntent::Seek(position) => out.push(EngineEvent::Seek(position)),
            MotionIntent::Hover(position) => out.push(EngineEvent::Hover(position)),
        }
    }

    fn clear_zoom_box(&mut self, out: &mut Vec<EngineEvent>) {
        if self.zoom_box.take().is_some() {
            out.push(EngineEvent::ZoomBox(None));
        }
    }
}
