use std::cell::RefCell;
use std::rc::Rc;

use leptos::prelude::*;
use serde::Deserialize;
use sonomark_core::annotation::{Annotation, AnnotationId, AnnotationSet, Tag};
use sonomark_core::controller::Controller;
use sonomark_core::interaction::{Measurement, ModeKind, Preview};
use sonomark_core::params::{QueryUrlProvider, SpectrogramParameters};
use sonomark_core::segment_cache::{SegmentCache, ViewerId};
use sonomark_core::store::{MemoryStore, ParentContext};
use sonomark_core::types::{PixelRect, Position, RecordingInfo, Window};
use sonomark_core::EngineConfig;

use crate::canvas::segment_loader::SegmentImage;

/// The one spectrogram on the page. Extra viewers (e.g. a thumbnail
/// strip) would take further ids and share the cache.
pub const MAIN_VIEWER: ViewerId = 0;

/// What the page is told to open, read from `sonomark.yaml` next to the
/// page (JSON works too).
#[derive(Clone, Debug, Deserialize)]
pub struct ViewerSetup {
    pub recording: RecordingInfo,
    /// Endpoint rendering spectrogram segments as images.
    pub segment_url: String,
    #[serde(default)]
    pub parent: Option<ParentContext>,
    #[serde(default)]
    pub params: SpectrogramParameters,
    #[serde(default)]
    pub initial_window: Option<Window>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    #[serde(default)]
    pub default_tags: Vec<Tag>,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl ViewerSetup {
    pub fn from_text(text: &str) -> Result<Self, String> {
        let setup: ViewerSetup = yaml_serde::from_str(text).map_err(|e| e.to_string())?;
        setup.engine.validate().map_err(|e| e.to_string())?;
        Ok(setup)
    }

    pub fn log_level(&self) -> log::Level {
        self.log_level.parse().unwrap_or(log::Level::Info)
    }
}

thread_local! {
    /// Segment images shared by every viewer on the page.
    pub static CACHE: Rc<RefCell<SegmentCache<SegmentImage>>> =
        Rc::new(RefCell::new(SegmentCache::new(EngineConfig::default().cache.max_bytes)));
    /// Viewport, gesture and interaction state of the main viewer.
    pub static CONTROLLER: RefCell<Option<Controller>> = const { RefCell::new(None) };
    /// Authoritative annotation list, updated optimistically.
    pub static ANNOTATIONS: Rc<RefCell<AnnotationSet>> = Rc::new(RefCell::new(AnnotationSet::default()));
    pub static STORE: RefCell<Rc<MemoryStore>> = RefCell::new(Rc::new(MemoryStore::new(Vec::new())));
    pub static PROVIDER: RefCell<QueryUrlProvider> = RefCell::new(QueryUrlProvider { base_url: String::new() });
    pub static PARENT: RefCell<ParentContext> = RefCell::new(ParentContext { id: String::new() });
}

/// Run `f` against the controller, if one has been set up.
pub fn with_controller<R>(f: impl FnOnce(&mut Controller) -> R) -> Option<R> {
    CONTROLLER.with(|c| c.borrow_mut().as_mut().map(f))
}

/// Snapshot of the annotation list for handing to the controller.
pub fn annotations_snapshot() -> Vec<Annotation> {
    ANNOTATIONS.with(|a| a.borrow().as_slice().to_vec())
}

/// Reactive mirror of the engine state for the view layer.
#[derive(Clone, Copy)]
pub struct AppState {
    pub setup_error: RwSignal<Option<String>>,
    pub recording: RwSignal<Option<RecordingInfo>>,
    pub params: RwSignal<SpectrogramParameters>,
    pub window: RwSignal<Option<Window>>,
    pub mode: RwSignal<ModeKind>,
    pub selection: RwSignal<Option<AnnotationId>>,
    pub preview: RwSignal<Option<Preview>>,
    pub measurement: RwSignal<Option<Measurement>>,
    pub hover: RwSignal<Option<Position>>,
    pub zoom_box: RwSignal<Option<PixelRect>>,
    pub filter: RwSignal<Option<Tag>>,
    pub fixed_aspect_ratio: RwSignal<bool>,
    pub editable: RwSignal<bool>,
    /// Bumped whenever the annotation set changes.
    pub annotations_version: RwSignal<u32>,
    /// Bumped when a segment load finishes.
    pub segment_ready_signal: RwSignal<u32>,
    /// Last user-facing message (failed save, rejected tag).
    pub status: RwSignal<Option<String>>,
    /// Playback position from double clicks.
    pub seek: RwSignal<Option<f64>>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            setup_error: RwSignal::new(None),
            recording: RwSignal::new(None),
            params: RwSignal::new(SpectrogramParameters::default()),
            window: RwSignal::new(None),
            mode: RwSignal::new(ModeKind::Select),
            selection: RwSignal::new(None),
            preview: RwSignal::new(None),
            measurement: RwSignal::new(None),
            hover: RwSignal::new(None),
            zoom_box: RwSignal::new(None),
            filter: RwSignal::new(None),
            fixed_aspect_ratio: RwSignal::new(false),
            editable: RwSignal::new(true),
            annotations_version: RwSignal::new(0),
            segment_ready_signal: RwSignal::new(0),
            status: RwSignal::new(None),
            seek: RwSignal::new(None),
        }
    }

    pub fn bump_annotations(&self) {
        self.annotations_version.update(|n| *n = n.wrapping_add(1));
    }

    pub fn bump_segments(&self) {
        self.segment_ready_signal.update(|n| *n = n.wrapping_add(1));
    }
}
