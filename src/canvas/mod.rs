pub mod annotation_renderer;
pub mod colors;
pub mod segment_loader;
pub mod spectrogram_renderer;
pub mod time_markers;
