//! Annotation interaction modes: select, draw, edit, delete and measure.
//!
//! The current selection lives inside [`Mode::Edit`], so "editing with
//! nothing selected" cannot be expressed. Entering any other mode drops
//! the selection. The machine never touches the annotation list; it emits
//! [`InteractionEvent::Commit`] mutations for the caller to persist.

use crate::annotation::{Annotation, AnnotationId, Mutation, Tag};
use crate::config::{InteractionConfig, Modifier, MotionConfig};
use crate::error::GeometryError;
use crate::geometry::{Geometry, GeometryKind};
use crate::input::{Key, Modifiers, PointerInput};
use crate::transform;
use crate::types::{Dimensions, Pixel, Position, Window};

/// Fieldless view of [`Mode`] for toolbars and logging.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeKind {
    Idle,
    Select,
    Draw(GeometryKind),
    Edit,
    Delete,
    Measure,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Mode {
    Idle,
    Select,
    Draw { kind: GeometryKind, progress: DrawProgress },
    Edit { id: AnnotationId, drag: Option<EditDrag> },
    Delete,
    Measure { first: Option<Position>, last: Option<Measurement> },
}

impl Mode {
    pub fn kind(&self) -> ModeKind {
        match self {
            Mode::Idle => ModeKind::Idle,
            Mode::Select => ModeKind::Select,
            Mode::Draw { kind, .. } => ModeKind::Draw(*kind),
            Mode::Edit { .. } => ModeKind::Edit,
            Mode::Delete => ModeKind::Delete,
            Mode::Measure { .. } => ModeKind::Measure,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum DrawProgress {
    #[default]
    Empty,
    /// Pointer held since `start`.
    Dragging { start: Position, start_pixel: Pixel, current: Position },
    /// Click-by-click vertices for lines and polygons.
    Vertices { points: Vec<Position>, cursor: Option<Position> },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragHandle {
    Vertex(usize),
    Body,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EditDrag {
    pub handle: DragHandle,
    pub start: Position,
    pub start_pixel: Pixel,
    pub duplicate: bool,
    pub original: Annotation,
    pub current: Geometry,
    pub moved: bool,
}

/// On-screen distance read-out. Never persisted.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Measurement {
    pub from: Position,
    pub to: Position,
}

impl Measurement {
    pub fn duration(&self) -> f64 {
        (self.to.time - self.from.time).abs()
    }

    pub fn bandwidth(&self) -> f64 {
        (self.to.freq - self.from.freq).abs()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Preview {
    /// `None` for shapes that do not exist yet (drawing, duplicating).
    pub id: Option<AnnotationId>,
    pub geometry: Geometry,
}

#[derive(Clone, Debug, PartialEq)]
pub enum InteractionEvent {
    Selected(AnnotationId),
    Deselected,
    Preview(Preview),
    PreviewCleared,
    Commit(Mutation),
    Measured(Measurement),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Response {
    /// The pointer event was used here and should not drive motion.
    pub consumed: bool,
    pub events: Vec<InteractionEvent>,
}

impl Response {
    fn consumed(events: Vec<InteractionEvent>) -> Self {
        Self { consumed: true, events }
    }

    fn passed() -> Self {
        Self::default()
    }
}

/// The annotation under `position`, if any. Culls by window first; when
/// several match, the one with the smallest bounding box wins so nested
/// shapes stay reachable, ties going to the lower id.
pub fn hit_test<'a>(
    annotations: &'a [Annotation],
    position: Position,
    window: &Window,
    dims: Dimensions,
    threshold: f64,
) -> Option<&'a Annotation> {
    annotations
        .iter()
        .filter_map(|a| {
            let hit = a.geometry.is_in_window(window).and_then(|visible| {
                if visible {
                    a.geometry.is_near_position(position, window, dims, threshold)
                } else {
                    Ok(false)
                }
            });
            match hit {
                Ok(true) => {
                    let area = a
                        .geometry
                        .bounding_box(window)
                        .map(|[t0, f0, t1, f1]| (t1 - t0).abs() * (f1 - f0).abs())
                        .unwrap_or(f64::INFINITY);
                    Some((area, a))
                }
                Ok(false) => None,
                Err(e) => {
                    log::warn!("skipping {} in hit test: {e}", a.id);
                    None
                }
            }
        })
        .min_by(|(area_a, a), (area_b, b)| area_a.total_cmp(area_b).then_with(|| a.id.cmp(&b.id)))
        .map(|(_, a)| a)
}

/// Shapes that can be drawn interactively.
pub const DRAWABLE: [GeometryKind; 6] = [
    GeometryKind::TimeStamp,
    GeometryKind::TimeInterval,
    GeometryKind::Point,
    GeometryKind::BoundingBox,
    GeometryKind::LineString,
    GeometryKind::Polygon,
];

#[derive(Clone, Debug)]
pub struct InteractionMachine {
    mode: Mode,
    enabled: bool,
    config: InteractionConfig,
    duplicate: Modifier,
    move_body: Modifier,
    default_tags: Vec<Tag>,
}

impl InteractionMachine {
    pub fn new(config: &InteractionConfig, bindings: &MotionConfig) -> Self {
        Self {
            mode: Mode::Select,
            enabled: true,
            config: config.clone(),
            duplicate: bindings.duplicate,
            move_body: bindings.move_body,
            default_tags: Vec::new(),
        }
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn selection(&self) -> Option<&AnnotationId> {
        match &self.mode {
            Mode::Edit { id, .. } => Some(id),
            _ => None,
        }
    }

    /// Whether pan/zoom gestures should be suspended.
    pub fn captures_pointer(&self) -> bool {
        matches!(self.mode, Mode::Draw { .. } | Mode::Delete | Mode::Measure { .. })
    }

    /// Tags attached to every newly drawn annotation.
    pub fn set_default_tags(&mut self, tags: Vec<Tag>) {
        self.default_tags = tags;
    }

    pub fn default_tags(&self) -> &[Tag] {
        &self.default_tags
    }

    fn transition(&mut self, next: Mode) -> Vec<InteractionEvent> {
        let mut events = Vec::new();
        let had_preview = matches!(
            self.mode,
            Mode::Edit { drag: Some(_), .. }
                | Mode::Draw { progress: DrawProgress::Dragging { .. } | DrawProgress::Vertices { .. }, .. }
                | Mode::Measure { first: Some(_), .. }
        );
        if had_preview {
            events.push(InteractionEvent::PreviewCleared);
        }
        let was_selected = self.selection().cloned();
        let now_selected = match &next {
            Mode::Edit { id, .. } => Some(id.clone()),
            _ => None,
        };
        if was_selected.is_some() && now_selected.is_none() {
            events.push(InteractionEvent::Deselected);
        }
        if let Some(id) = now_selected.filter(|id| Some(id) != was_selected.as_ref()) {
            events.push(InteractionEvent::Selected(id));
        }
        self.mode = next;
        events
    }

    /// While disabled the machine rests in `Idle` and ignores input.
    pub fn set_enabled(&mut self, enabled: bool) -> Vec<InteractionEvent> {
        self.enabled = enabled;
        if enabled {
            if self.mode == Mode::Idle {
                return self.transition(Mode::Select);
            }
            Vec::new()
        } else {
            self.transition(Mode::Idle)
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn enter_idle(&mut self) -> Vec<InteractionEvent> {
        self.transition(Mode::Idle)
    }

    pub fn enter_select(&mut self) -> Vec<InteractionEvent> {
        if !self.enabled {
            return Vec::new();
        }
        self.transition(Mode::Select)
    }

    pub fn enter_draw(&mut self, kind: GeometryKind) -> Result<Vec<InteractionEvent>, GeometryError> {
        if !DRAWABLE.contains(&kind) {
            return Err(GeometryError::UnsupportedVariant(kind.name().to_string()));
        }
        if !self.enabled {
            return Ok(Vec::new());
        }
        Ok(self.transition(Mode::Draw { kind, progress: DrawProgress::Empty }))
    }

    pub fn enter_delete(&mut self) -> Vec<InteractionEvent> {
        if !self.enabled {
            return Vec::new();
        }
        self.transition(Mode::Delete)
    }

    pub fn enter_measure(&mut self) -> Vec<InteractionEvent> {
        if !self.enabled {
            return Vec::new();
        }
        self.transition(Mode::Measure { first: None, last: None })
    }

    /// Select `id` for editing, e.g. from sequential navigation.
    pub fn select(&mut self, id: AnnotationId) -> Vec<InteractionEvent> {
        if !self.enabled {
            return Vec::new();
        }
        self.transition(Mode::Edit { id, drag: None })
    }

    /// Abort gesture: back to `Select`, or `Idle` while disabled.
    pub fn abort(&mut self) -> Vec<InteractionEvent> {
        let next = if self.enabled {
            Mode::Select
        } else {
            Mode::Idle
        };
        self.transition(next)
    }

    /// Re-resolve the selection after the annotation list changed.
    pub fn sync_annotations(&mut self, annotations: &[Annotation]) -> Vec<InteractionEvent> {
        match &self.mode {
            Mode::Edit { id, .. } if !annotations.iter().any(|a| &a.id == id) => self.transition(Mode::Select),
            _ => Vec::new(),
        }
    }

    /// Follow a pending id to the id the store assigned.
    pub fn retarget(&mut self, from: &AnnotationId, to: &AnnotationId) {
        if let Mode::Edit { id, .. } = &mut self.mode {
            if id == from {
                *id = to.clone();
            }
        }
    }

    /// The in-progress shape, in data space, for drawing.
    pub fn draft(&self) -> Option<Preview> {
        match &self.mode {
            Mode::Draw { kind, progress } => draft_geometry(*kind, progress).map(|geometry| Preview { id: None, geometry }),
            Mode::Edit { id, drag: Some(drag) } => Some(Preview {
                id: (!drag.duplicate).then(|| id.clone()),
                geometry: drag.current.clone(),
            }),
            Mode::Measure { first: Some(from), .. } => Some(Preview {
                id: None,
                geometry: Geometry::Point([from.time, from.freq]),
            }),
            _ => None,
        }
    }

    pub fn handle_key(&mut self, key: Key) -> Vec<InteractionEvent> {
        match key {
            Key::Escape => self.abort(),
            Key::Enter => self.finish(),
            Key::Backspace => self.undo_vertex().map(|p| vec![InteractionEvent::Preview(p)]).unwrap_or_default(),
            Key::Delete => match &self.mode {
                Mode::Edit { id, .. } => {
                    let id = id.clone();
                    let mut events = vec![InteractionEvent::Commit(Mutation::Delete { id })];
                    events.extend(self.transition(Mode::Select));
                    events
                }
                _ => Vec::new(),
            },
            Key::Next | Key::Previous => Vec::new(),
        }
    }

    /// Drop the last placed vertex of a line or polygon being drawn.
    pub fn undo_vertex(&mut self) -> Option<Preview> {
        let Mode::Draw { kind, progress: DrawProgress::Vertices { points, .. } } = &mut self.mode else {
            return None;
        };
        points.pop();
        let kind = *kind;
        match &self.mode {
            Mode::Draw { progress, .. } => draft_geometry(kind, progress).map(|geometry| Preview { id: None, geometry }),
            _ => None,
        }
    }

    /// Complete a line or polygon. Too few vertices leaves drawing as is.
    pub fn finish(&mut self) -> Vec<InteractionEvent> {
        let Mode::Draw { kind, progress: DrawProgress::Vertices { points, .. } } = &self.mode else {
            return Vec::new();
        };
        let kind = *kind;
        let Some(geometry) = vertex_geometry(kind, points) else {
            log::debug!("not enough vertices to finish {}", kind.name());
            return Vec::new();
        };
        self.mode = Mode::Draw { kind, progress: DrawProgress::Empty };
        vec![
            InteractionEvent::PreviewCleared,
            InteractionEvent::Commit(Mutation::Create { geometry, tags: self.default_tags.clone() }),
        ]
    }

    pub fn handle(
        &mut self,
        input: PointerInput,
        annotations: &[Annotation],
        window: &Window,
        dims: Dimensions,
    ) -> Response {
        if !self.enabled {
            return Response::passed();
        }
        let mode = std::mem::replace(&mut self.mode, Mode::Idle);
        let (mode, response) = match mode {
            Mode::Idle => (Mode::Idle, Response::passed()),
            Mode::Select => self.on_select(input, annotations, window, dims),
            Mode::Edit { id, drag } => self.on_edit(id, drag, input, annotations, window, dims),
            Mode::Draw { kind, progress } => self.on_draw(kind, progress, input, window, dims),
            Mode::Delete => self.on_delete(input, annotations, window, dims),
            Mode::Measure { first, last } => self.on_measure(first, last, input, window, dims),
        };
        self.mode = mode;
        response
    }

    fn on_select(
        &self,
        input: PointerInput,
        annotations: &[Annotation],
        window: &Window,
        dims: Dimensions,
    ) -> (Mode, Response) {
        let PointerInput::Down { pixel, .. } = input else {
            return (Mode::Select, Response::passed());
        };
        let position = transform::to_position(pixel, window, dims);
        match hit_test(annotations, position, window, dims, self.config.hit_threshold_px) {
            Some(hit) => (
                Mode::Edit { id: hit.id.clone(), drag: None },
                Response::consumed(vec![InteractionEvent::Selected(hit.id.clone())]),
            ),
            None => (Mode::Select, Response::passed()),
        }
    }

    fn on_edit(
        &self,
        id: AnnotationId,
        drag: Option<EditDrag>,
        input: PointerInput,
        annotations: &[Annotation],
        window: &Window,
        dims: Dimensions,
    ) -> (Mode, Response) {
        match (drag, input) {
            (None, PointerInput::Down { pixel, modifiers }) => self.edit_down(id, pixel, modifiers, annotations, window, dims),
            (Some(mut drag), PointerInput::Move { pixel, .. }) => {
                let position = transform::to_position(pixel, window, dims);
                let moved = match drag.handle {
                    DragHandle::Vertex(index) => drag.original.geometry.move_vertex(index, position),
                    DragHandle::Body => Ok(drag.original.geometry.shift(drag.start, position)),
                };
                match moved {
                    Ok(geometry) => {
                        drag.current = geometry;
                        drag.moved |= drag.start_pixel.distance_to(pixel) > self.config.click_tolerance_px;
                        let preview = Preview {
                            id: (!drag.duplicate).then(|| id.clone()),
                            geometry: drag.current.clone(),
                        };
                        (Mode::Edit { id, drag: Some(drag) }, Response::consumed(vec![InteractionEvent::Preview(preview)]))
                    }
                    Err(e) => {
                        log::warn!("edit of {id} aborted: {e}");
                        (Mode::Edit { id, drag: None }, Response::consumed(vec![InteractionEvent::PreviewCleared]))
                    }
                }
            }
            (Some(drag), PointerInput::Up { .. }) => {
                let mut events = vec![InteractionEvent::PreviewCleared];
                if drag.moved {
                    let geometry = drag.current.normalized();
                    let mutation = if drag.duplicate {
                        Mutation::Create { geometry, tags: drag.original.tags.clone() }
                    } else {
                        Mutation::UpdateGeometry { id: id.clone(), geometry }
                    };
                    events.push(InteractionEvent::Commit(mutation));
                }
                (Mode::Edit { id, drag: None }, Response::consumed(events))
            }
            (Some(_), PointerInput::Leave) => {
                (Mode::Edit { id, drag: None }, Response::consumed(vec![InteractionEvent::PreviewCleared]))
            }
            (drag @ Some(_), _) => (Mode::Edit { id, drag }, Response::consumed(Vec::new())),
            (None, _) => (Mode::Edit { id, drag: None }, Response::passed()),
        }
    }

    fn edit_down(
        &self,
        id: AnnotationId,
        pixel: Pixel,
        modifiers: Modifiers,
        annotations: &[Annotation],
        window: &Window,
        dims: Dimensions,
    ) -> (Mode, Response) {
        let Some(selected) = annotations.iter().find(|a| a.id == id) else {
            return (Mode::Select, Response::consumed(vec![InteractionEvent::Deselected]));
        };
        let position = transform::to_position(pixel, window, dims);
        let duplicate = modifiers.held_specific(self.duplicate);
        let body = duplicate || modifiers.held_specific(self.move_body);
        let near = match selected.geometry.is_near_position(position, window, dims, self.config.hit_threshold_px) {
            Ok(near) => near,
            Err(e) => {
                log::warn!("cannot edit {id}: {e}");
                false
            }
        };

        let handle = match selected.geometry.nearest_handle(pixel, window, dims, self.config.vertex_threshold_px) {
            Some(index) => Some(DragHandle::Vertex(index)),
            None if near && body => Some(DragHandle::Body),
            None => None,
        };
        if let Some(handle) = handle {
            let drag = EditDrag {
                handle,
                start: position,
                start_pixel: pixel,
                duplicate,
                original: selected.clone(),
                current: selected.geometry.clone(),
                moved: false,
            };
            return (Mode::Edit { id, drag: Some(drag) }, Response::consumed(Vec::new()));
        }
        if near {
            return (Mode::Edit { id, drag: None }, Response::consumed(Vec::new()));
        }
        match hit_test(annotations, position, window, dims, self.config.hit_threshold_px) {
            Some(other) => (
                Mode::Edit { id: other.id.clone(), drag: None },
                Response::consumed(vec![InteractionEvent::Selected(other.id.clone())]),
            ),
            None => (Mode::Edit { id, drag: None }, Response::passed()),
        }
    }

    fn on_draw(
        &self,
        kind: GeometryKind,
        progress: DrawProgress,
        input: PointerInput,
        window: &Window,
        dims: Dimensions,
    ) -> (Mode, Response) {
        let at = |pixel: Pixel| transform::to_position(pixel, window, dims);
        let by_vertex = matches!(kind, GeometryKind::LineString | GeometryKind::Polygon);
        let draw = |progress| Mode::Draw { kind, progress };
        let preview_of = |progress: &DrawProgress| match draft_geometry(kind, progress) {
            Some(geometry) => vec![InteractionEvent::Preview(Preview { id: None, geometry })],
            None => Vec::new(),
        };

        match (progress, input) {
            (DrawProgress::Empty, PointerInput::Down { pixel, .. }) if !by_vertex => {
                let start = at(pixel);
                (draw(DrawProgress::Dragging { start, start_pixel: pixel, current: start }), Response::consumed(Vec::new()))
            }
            (DrawProgress::Dragging { start, start_pixel, .. }, PointerInput::Move { pixel, .. }) => {
                let progress = DrawProgress::Dragging { start, start_pixel, current: at(pixel) };
                let events = preview_of(&progress);
                (draw(progress), Response::consumed(events))
            }
            (DrawProgress::Dragging { start, start_pixel, .. }, PointerInput::Up { pixel, .. }) => {
                let end = at(pixel);
                let min = self.config.min_draw_px;
                let wide = (pixel.x - start_pixel.x).abs() >= min;
                let tall = (pixel.y - start_pixel.y).abs() >= min;
                let geometry = match kind {
                    GeometryKind::TimeStamp => Some(Geometry::TimeStamp(end.time)),
                    GeometryKind::Point => Some(Geometry::Point([end.time, end.freq])),
                    GeometryKind::TimeInterval if wide => Some(Geometry::TimeInterval([start.time, end.time])),
                    GeometryKind::BoundingBox if wide && tall => {
                        Some(Geometry::BoundingBox([start.time, start.freq, end.time, end.freq]))
                    }
                    _ => None,
                };
                let mut events = vec![InteractionEvent::PreviewCleared];
                match geometry {
                    Some(geometry) => events.push(InteractionEvent::Commit(Mutation::Create {
                        geometry: geometry.normalized(),
                        tags: self.default_tags.clone(),
                    })),
                    None => log::debug!("ignoring degenerate {} drag", kind.name()),
                }
                (draw(DrawProgress::Empty), Response::consumed(events))
            }
            (DrawProgress::Dragging { .. }, PointerInput::Leave) => {
                (draw(DrawProgress::Empty), Response::consumed(vec![InteractionEvent::PreviewCleared]))
            }
            (DrawProgress::Empty, PointerInput::Up { pixel, .. }) if by_vertex => {
                let progress = DrawProgress::Vertices { points: vec![at(pixel)], cursor: Some(at(pixel)) };
                let events = preview_of(&progress);
                (draw(progress), Response::consumed(events))
            }
            (DrawProgress::Vertices { mut points, .. }, PointerInput::Up { pixel, .. }) => {
                let duplicate = points.last().is_some_and(|last| {
                    transform::to_pixel(*last, window, dims).distance_to(pixel) <= self.config.click_tolerance_px
                });
                if !duplicate {
                    points.push(at(pixel));
                }
                let progress = DrawProgress::Vertices { points, cursor: Some(at(pixel)) };
                let events = preview_of(&progress);
                (draw(progress), Response::consumed(events))
            }
            (DrawProgress::Vertices { points, .. }, PointerInput::Move { pixel, .. }) => {
                let progress = DrawProgress::Vertices { points, cursor: Some(at(pixel)) };
                let events = preview_of(&progress);
                (draw(progress), Response::consumed(events))
            }
            (DrawProgress::Vertices { points, cursor }, PointerInput::DoubleClick { .. }) => {
                match vertex_geometry(kind, &points) {
                    Some(geometry) => {
                        let events = vec![
                            InteractionEvent::PreviewCleared,
                            InteractionEvent::Commit(Mutation::Create { geometry, tags: self.default_tags.clone() }),
                        ];
                        (draw(DrawProgress::Empty), Response::consumed(events))
                    }
                    None => (draw(DrawProgress::Vertices { points, cursor }), Response::consumed(Vec::new())),
                }
            }
            (progress, PointerInput::Wheel { .. }) => (draw(progress), Response::passed()),
            (progress, _) => (draw(progress), Response::consumed(Vec::new())),
        }
    }

    fn on_delete(
        &self,
        input: PointerInput,
        annotations: &[Annotation],
        window: &Window,
        dims: Dimensions,
    ) -> (Mode, Response) {
        match input {
            PointerInput::Down { pixel, .. } => {
                let position = transform::to_position(pixel, window, dims);
                match hit_test(annotations, position, window, dims, self.config.hit_threshold_px) {
                    Some(hit) => (
                        Mode::Idle,
                        Response::consumed(vec![InteractionEvent::Commit(Mutation::Delete { id: hit.id.clone() })]),
                    ),
                    None => (Mode::Delete, Response::consumed(Vec::new())),
                }
            }
            PointerInput::Wheel { .. } => (Mode::Delete, Response::passed()),
            _ => (Mode::Delete, Response::consumed(Vec::new())),
        }
    }

    fn on_measure(
        &self,
        first: Option<Position>,
        last: Option<Measurement>,
        input: PointerInput,
        window: &Window,
        dims: Dimensions,
    ) -> (Mode, Response) {
        let at = |pixel: Pixel| transform::to_position(pixel, window, dims);
        match (first, input) {
            (None, PointerInput::Down { pixel, .. }) => (Mode::Measure { first: Some(at(pixel)), last }, Response::consumed(Vec::new())),
            (Some(from), PointerInput::Move { pixel, .. }) => {
                let to = at(pixel);
                let preview = Preview {
                    id: None,
                    geometry: Geometry::LineString(vec![[from.time, from.freq], [to.time, to.freq]]),
                };
                (Mode::Measure { first, last }, Response::consumed(vec![InteractionEvent::Preview(preview)]))
            }
            (Some(from), PointerInput::Down { pixel, .. }) => {
                let measurement = Measurement { from, to: at(pixel) };
                (
                    Mode::Measure { first: None, last: Some(measurement) },
                    Response::consumed(vec![InteractionEvent::PreviewCleared, InteractionEvent::Measured(measurement)]),
                )
            }
            (_, PointerInput::Wheel { .. }) => (Mode::Measure { first, last }, Response::passed()),
            _ => (Mode::Measure { first, last }, Response::consumed(Vec::new())),
        }
    }
}

/// Finished line or polygon from clicked vertices, if there are enough.
fn vertex_geometry(kind: GeometryKind, points: &[Position]) -> Option<Geometry> {
    let mut coords: Vec<[f64; 2]> = points.iter().map(|p| [p.time, p.freq]).collect();
    match kind {
        GeometryKind::Polygon if coords.len() >= 3 => {
            coords.push(coords[0]);
            Some(Geometry::Polygon(vec![coords]))
        }
        GeometryKind::LineString if coords.len() >= 2 => Some(Geometry::LineString(coords)),
        _ => None,
    }
}

fn draft_geometry(kind: GeometryKind, progress: &DrawProgress) -> Option<Geometry> {
    match progress {
        DrawProgress::Empty => None,
        DrawProgress::Dragging { start, current, .. } => match kind {
            GeometryKind::TimeStamp => Some(Geometry::TimeStamp(current.time)),
            GeometryKind::Point => Some(Geometry::Point([current.time, current.freq])),
            GeometryKind::TimeInterval => Some(Geometry::TimeInterval([start.time, current.time]).normalized()),
            _ => Some(Geometry::BoundingBox([start.time, start.freq, current.time, current.freq]).normalized()),
        },
        DrawProgress::Vertices { points, cursor } => {
            let mut coords: Vec<[f64; 2]> = points.iter().map(|p| [p.time, p.freq]).collect();
            if let Some(c) = cursor {
                coords.push([c.time, c.freq]);
            }
            if coords.is_empty() {
                return None;
            }
            if kind == GeometryKind::Polygon && coords.len() >= 3 {
                let first = coords[0];
                coords.push(first);
                Some(Geometry::Polygon(vec![coords]))
            } else {
                Some(Geometry::LineString(coords))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Interval;

    // 100 px = 10 s, 100 px = 1000 Hz, so one pixel is 0.1 s by 10 Hz.
    fn window() -> Window {
        Window::new(Interval::new(0.0, 10.0), Interval::new(0.0, 1000.0))
    }

    fn dims() -> Dimensions {
        Dimensions::new(100.0, 100.0)
    }

    fn px(t: f64, f: f64) -> Pixel {
        transform::to_pixel(Position::new(t, f), &window(), dims())
    }

    fn machine() -> InteractionMachine {
        InteractionMachine::new(&InteractionConfig::default(), &MotionConfig::default())
    }

    fn down(p: Pixel, modifiers: Modifiers) -> PointerInput {
        PointerInput::Down { pixel: p, modifiers }
    }

    fn mv(p: Pixel) -> PointerInput {
        PointerInput::Move { pixel: p, modifiers: Modifiers::NONE }
    }

    fn up(p: Pixel) -> PointerInput {
        PointerInput::Up { pixel: p, modifiers: Modifiers::NONE }
    }

    fn annotations() -> Vec<Annotation> {
        vec![
            Annotation::new("big", Geometry::BoundingBox([1.0, 100.0, 8.0, 900.0])).with_tags([Tag::new("call", "social")]),
            Annotation::new("small", Geometry::BoundingBox([3.0, 300.0, 5.0, 500.0])).with_tags([Tag::new("species", "Myotis")]),
        ]
    }

    fn commits(events: &[InteractionEvent]) -> Vec<&Mutation> {
        events
            .iter()
            .filter_map(|e| match e {
                InteractionEvent::Commit(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    fn approx(a: &Geometry, b: &Geometry) -> bool {
        match (a, b) {
            (Geometry::BoundingBox(x), Geometry::BoundingBox(y)) => x.iter().zip(y).all(|(p, q)| (p - q).abs() < 1e-9),
            _ => a == b,
        }
    }

    #[test]
    fn draw_box_commits_normalized_box() {
        let mut m = machine();
        m.enter_draw(GeometryKind::BoundingBox).unwrap();
        let anns = annotations();
        m.handle(down(px(5.0, 400.0), Modifiers::NONE), &anns, &window(), dims());
        m.handle(mv(px(3.0, 200.0)), &anns, &window(), dims());
        let r = m.handle(up(px(2.0, 100.0)), &anns, &window(), dims());
        let created = commits(&r.events);
        assert_eq!(created.len(), 1);
        match created[0] {
            Mutation::Create { geometry, tags } => {
                assert!(approx(geometry, &Geometry::BoundingBox([2.0, 100.0, 5.0, 400.0])), "{geometry:?}");
                assert!(tags.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(m.mode().kind(), ModeKind::Draw(GeometryKind::BoundingBox));
    }

    #[test]
    fn degenerate_box_is_dropped() {
        let mut m = machine();
        m.enter_draw(GeometryKind::BoundingBox).unwrap();
        m.handle(down(Pixel::new(10.0, 10.0), Modifiers::NONE), &[], &window(), dims());
        let r = m.handle(up(Pixel::new(30.0, 11.0)), &[], &window(), dims());
        assert!(commits(&r.events).is_empty());
    }

    #[test]
    fn multi_variants_cannot_be_drawn() {
        let mut m = machine();
        assert!(matches!(m.enter_draw(GeometryKind::MultiPolygon), Err(GeometryError::UnsupportedVariant(_))));
        assert_eq!(m.mode(), &Mode::Select);
    }

    #[test]
    fn select_prefers_smallest_shape_and_arms_edit() {
        let mut m = machine();
        let anns = annotations();
        let r = m.handle(down(px(3.5, 350.0), Modifiers::NONE), &anns, &window(), dims());
        assert!(r.consumed);
        assert_eq!(r.events, vec![InteractionEvent::Selected("small".into())]);
        assert_eq!(m.selection(), Some(&AnnotationId::from("small")));
    }

    #[test]
    fn miss_in_select_passes_through() {
        let mut m = machine();
        let r = m.handle(down(px(9.5, 950.0), Modifiers::NONE), &annotations(), &window(), dims());
        assert!(!r.consumed);
        assert_eq!(m.mode(), &Mode::Select);
    }

    #[test]
    fn vertex_drag_previews_then_updates() {
        let mut m = machine();
        let anns = annotations();
        m.select("small".into());
        // Corner 2 is (t1, f1) = (5 s, 500 Hz).
        m.handle(down(px(5.0, 500.0), Modifiers::NONE), &anns, &window(), dims());
        let r = m.handle(mv(px(6.0, 600.0)), &anns, &window(), dims());
        assert!(matches!(
            r.events.as_slice(),
            [InteractionEvent::Preview(Preview { id: Some(_), .. })]
        ));
        let r = m.handle(up(px(6.0, 600.0)), &anns, &window(), dims());
        match commits(&r.events).as_slice() {
            [Mutation::UpdateGeometry { id, geometry }] => {
                assert_eq!(id, &AnnotationId::from("small"));
                assert!(approx(geometry, &Geometry::BoundingBox([3.0, 300.0, 6.0, 600.0])), "{geometry:?}");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(m.selection(), Some(&AnnotationId::from("small")));
    }

    #[test]
    fn duplicate_drag_creates_copy_with_tags() {
        let mut m = machine();
        let anns = annotations();
        m.select("small".into());
        m.handle(down(px(4.0, 400.0), Modifiers::alt()), &anns, &window(), dims());
        m.handle(mv(px(6.0, 400.0)), &anns, &window(), dims());
        let r = m.handle(up(px(6.0, 400.0)), &anns, &window(), dims());
        match commits(&r.events).as_slice() {
            [Mutation::Create { geometry, tags }] => {
                assert!(approx(geometry, &Geometry::BoundingBox([5.0, 300.0, 7.0, 500.0])), "{geometry:?}");
                assert_eq!(tags, &vec![Tag::new("species", "Myotis")]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(anns[1].geometry, Geometry::BoundingBox([3.0, 300.0, 5.0, 500.0]));
        assert_eq!(m.selection(), Some(&AnnotationId::from("small")));
    }

    #[test]
    fn plain_drag_inside_selection_does_not_move_it() {
        let mut m = machine();
        let anns = annotations();
        m.select("big".into());
        let r = m.handle(down(px(5.0, 500.0), Modifiers::NONE), &anns, &window(), dims());
        assert!(r.consumed);
        let r = m.handle(up(px(6.0, 500.0)), &anns, &window(), dims());
        assert!(commits(&r.events).is_empty());
    }

    #[test]
    fn abort_returns_to_select_or_idle() {
        let mut m = machine();
        m.select("big".into());
        assert_eq!(m.abort(), vec![InteractionEvent::Deselected]);
        assert_eq!(m.mode(), &Mode::Select);
        m.enter_measure();
        m.set_enabled(false);
        assert_eq!(m.mode(), &Mode::Idle);
        m.abort();
        assert_eq!(m.mode(), &Mode::Idle);
        let r = m.handle(down(px(3.5, 350.0), Modifiers::NONE), &annotations(), &window(), dims());
        assert!(!r.consumed);
    }

    #[test]
    fn delete_emits_intent_and_goes_idle() {
        let mut m = machine();
        m.enter_delete();
        let anns = annotations();
        let r = m.handle(down(px(9.5, 50.0), Modifiers::NONE), &anns, &window(), dims());
        assert!(commits(&r.events).is_empty());
        assert_eq!(m.mode(), &Mode::Delete);
        let r = m.handle(down(px(1.5, 150.0), Modifiers::NONE), &anns, &window(), dims());
        assert_eq!(commits(&r.events), vec![&Mutation::Delete { id: "big".into() }]);
        assert_eq!(m.mode(), &Mode::Idle);
    }

    #[test]
    fn polygon_is_drawn_by_clicks() {
        let mut m = machine();
        m.enter_draw(GeometryKind::Polygon).unwrap();
        for (t, f) in [(1.0, 100.0), (3.0, 100.0), (3.0, 300.0), (5.0, 500.0)] {
            m.handle(down(px(t, f), Modifiers::NONE), &[], &window(), dims());
            m.handle(up(px(t, f)), &[], &window(), dims());
        }
        // Repeated release on the same spot does not add a vertex.
        m.handle(up(px(5.0, 500.0)), &[], &window(), dims());
        assert!(m.undo_vertex().is_some());
        let events = m.handle_key(Key::Enter);
        match commits(&events).as_slice() {
            [Mutation::Create { geometry: Geometry::Polygon(rings), .. }] => {
                assert_eq!(rings[0].len(), 4);
                assert_eq!(rings[0].first(), rings[0].last());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn line_needs_two_vertices() {
        let mut m = machine();
        m.enter_draw(GeometryKind::LineString).unwrap();
        m.handle(up(px(1.0, 100.0)), &[], &window(), dims());
        assert!(m.finish().is_empty());
        m.handle(up(px(2.0, 200.0)), &[], &window(), dims());
        let r = m.handle(
            PointerInput::DoubleClick { pixel: px(2.0, 200.0), modifiers: Modifiers::NONE },
            &[],
            &window(),
            dims(),
        );
        assert!(matches!(commits(&r.events).as_slice(), [Mutation::Create { geometry: Geometry::LineString(cs), .. }] if cs.len() == 2));
    }

    #[test]
    fn measure_takes_two_clicks() {
        let mut m = machine();
        m.enter_measure();
        m.handle(down(px(1.0, 100.0), Modifiers::NONE), &[], &window(), dims());
        let r = m.handle(down(px(4.0, 500.0), Modifiers::NONE), &[], &window(), dims());
        let measured = r.events.iter().find_map(|e| match e {
            InteractionEvent::Measured(m) => Some(*m),
            _ => None,
        });
        let measured = measured.unwrap();
        assert!((measured.duration() - 3.0).abs() < 1e-9);
        assert!((measured.bandwidth() - 400.0).abs() < 1e-9);
    }

    #[test]
    fn sync_drops_vanished_selection() {
        let mut m = machine();
        m.select("gone".into());
        assert_eq!(m.sync_annotations(&annotations()), vec![InteractionEvent::Deselected]);
        assert_eq!(m.mode(), &Mode::Select);
    }

    #[test]
    fn hit_test_skips_empty_geometry() {
        let anns = vec![
            Annotation::new("empty", Geometry::LineString(vec![])),
            Annotation::new("ts", Geometry::TimeStamp(5.0)),
        ];
        let hit = hit_test(&anns, Position::new(5.0, 10.0), &window(), dims(), 5.0);
        assert_eq!(hit.map(|a| a.id.0.as_str()), Some("ts"));
    }

    #[test]
    fn selection_follows_a_confirmed_creation() {
        let mut m = machine();
        let pending = AnnotationId::pending(0);
        m.select(pending.clone());
        assert_eq!(m.selection(), Some(&pending));

        m.retarget(&AnnotationId::from("other"), &AnnotationId::from("x"));
        assert_eq!(m.selection(), Some(&pending));
        m.retarget(&pending, &AnnotationId::from("clip-7"));
        assert_eq!(m.selection(), Some(&AnnotationId::from("clip-7")));
        let confirmed = vec![Annotation::new("clip-7", Geometry::TimeStamp(1.0))];
        assert!(m.sync_annotations(&confirmed).is_empty());
    }
}
