//! Spectrogram viewport and annotation geometry engine.
//!
//! Everything here is plain data and synchronous state machines, plus two
//! small async drivers (segment loading, annotation persistence) that are
//! generic over the I/O they need. The wasm front end in the root crate
//! supplies the browser implementations.

pub mod annotation;
pub mod config;
pub mod controller;
pub mod error;
pub mod geometry;
pub mod input;
pub mod interaction;
pub mod loader;
pub mod motion;
pub mod navigation;
pub mod params;
pub mod segment_cache;
pub mod segments;
pub mod store;
pub mod tag_overlay;
pub mod transform;
pub mod types;
pub mod viewport;

pub use config::EngineConfig;
pub use error::{ConfigError, FetchError, GeometryError, MutationError, StoreError};
pub use geometry::Geometry;
pub use types::{Dimensions, Interval, Pixel, Position, Window};
