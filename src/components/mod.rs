pub mod analysis_panel;
pub mod app;
pub mod pinch;
pub mod spectrogram;
pub mod toolbar;
