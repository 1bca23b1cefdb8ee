//! Engine tunables. Every section defaults sensibly, so a config file only
//! needs the values it changes.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub cache: CacheConfig,
    pub segments: SegmentConfig,
    pub viewport: ViewportConfig,
    pub interaction: InteractionConfig,
    pub motion: MotionConfig,
    pub overlay: OverlayConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Ceiling on decoded image bytes held across all viewers.
    pub max_bytes: usize,
    pub fetch_timeout_ms: u64,
    /// Segments preloaded on each side of the visible ones.
    pub preload: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { max_bytes: 256 * 1024 * 1024, fetch_timeout_ms: 20_000, preload: 1 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    /// Approximate pixels per rendered segment.
    pub pixel_budget: f64,
    /// Overlap on each side, in hops.
    pub buffer_hops: f64,
    /// Lower limit on segment duration in seconds.
    pub min_duration: f64,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self { pixel_budget: 1024.0 * 1024.0, buffer_hops: 4.0, min_duration: 0.05 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    /// Scroll zoom factor per wheel notch (< 1 zooms in).
    pub zoom_step: f64,
    /// Relative span difference under which `reset` treats the window as
    /// only panned.
    pub reset_tolerance: f64,
    pub min_time_span: f64,
    pub min_freq_span: f64,
    pub fixed_aspect_ratio: bool,
    pub history_limit: usize,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            zoom_step: 0.8,
            reset_tolerance: 0.01,
            min_time_span: 0.001,
            min_freq_span: 10.0,
            fixed_aspect_ratio: false,
            history_limit: 50,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionConfig {
    /// Distance in pixels within which a pointer is "on" a geometry.
    pub hit_threshold_px: f64,
    /// Distance in pixels within which a pointer grabs a vertex handle.
    pub vertex_threshold_px: f64,
    /// Pointer movement below this is a click, not a drag.
    pub click_tolerance_px: f64,
    /// Drawn boxes and intervals narrower than this are dropped.
    pub min_draw_px: f64,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self { hit_threshold_px: 5.0, vertex_threshold_px: 8.0, click_tolerance_px: 3.0, min_draw_px: 2.0 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modifier {
    None,
    Shift,
    Ctrl,
    Alt,
    Meta,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollAxis {
    Time,
    Freq,
    Both,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    pub pan: Modifier,
    pub zoom_box: Modifier,
    /// Axis scaled by a plain wheel turn.
    pub scroll: ScrollAxis,
    /// Axis scaled by a wheel turn with `scroll_alt_modifier` held.
    pub scroll_alt: ScrollAxis,
    pub scroll_alt_modifier: Modifier,
    /// Held while dragging an annotation to copy it instead.
    pub duplicate: Modifier,
    /// Held while dragging inside an annotation to move the whole shape.
    pub move_body: Modifier,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            pan: Modifier::None,
            zoom_box: Modifier::Ctrl,
            scroll: ScrollAxis::Time,
            scroll_alt: ScrollAxis::Freq,
            scroll_alt_modifier: Modifier::Shift,
            duplicate: Modifier::Alt,
            move_body: Modifier::Shift,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub chip_height: f64,
    pub chip_gap: f64,
    pub max_chips: usize,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self { chip_height: 16.0, chip_gap: 2.0, max_chips: 6 }
    }
}

impl EngineConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = yaml_serde::from_str(text).map_err(|e| ConfigError::Yaml(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn positive(name: &str, value: f64) -> Result<(), ConfigError> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(ConfigError::Invalid(format!("{name} must be positive, got {value}")))
            }
        }

        if self.cache.max_bytes == 0 {
            return Err(ConfigError::Invalid("cache.max_bytes must be positive".into()));
        }
        if self.cache.fetch_timeout_ms == 0 {
            return Err(ConfigError::Invalid("cache.fetch_timeout_ms must be positive".into()));
        }
        positive("segments.pixel_budget", self.segments.pixel_budget)?;
        positive("segments.min_duration", self.segments.min_duration)?;
        if self.segments.buffer_hops < 0.0 {
            return Err(ConfigError::Invalid("segments.buffer_hops must not be negative".into()));
        }
        positive("viewport.zoom_step", self.viewport.zoom_step)?;
        positive("viewport.min_time_span", self.viewport.min_time_span)?;
        positive("viewport.min_freq_span", self.viewport.min_freq_span)?;
        if !(0.0..1.0).contains(&self.viewport.reset_tolerance) {
            return Err(ConfigError::Invalid("viewport.reset_tolerance must be in [0, 1)".into()));
        }
        positive("interaction.hit_threshold_px", self.interaction.hit_threshold_px)?;
        positive("interaction.vertex_threshold_px", self.interaction.vertex_threshold_px)?;
        positive("interaction.click_tolerance_px", self.interaction.click_tolerance_px)?;
        positive("overlay.chip_height", self.overlay.chip_height)?;
        if self.motion.pan == self.motion.zoom_box {
            return Err(ConfigError::Invalid("motion.pan and motion.zoom_box need different modifiers".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = EngineConfig::from_json(r#"{"cache": {"max_bytes": 1024}, "overlay": {"max_chips": 2}}"#).unwrap();
        assert_eq!(config.cache.max_bytes, 1024);
        assert_eq!(config.cache.fetch_timeout_ms, CacheConfig::default().fetch_timeout_ms);
        assert_eq!(config.overlay.max_chips, 2);
        assert_eq!(config.viewport, ViewportConfig::default());
    }

    #[test]
    fn yaml_sections_parse() {
        let text = "motion:\n  pan: shift\n  zoom_box: none\ninteraction:\n  hit_threshold_px: 7.5\n";
        let config = EngineConfig::from_yaml(text).unwrap();
        assert_eq!(config.motion.pan, Modifier::Shift);
        assert_eq!(config.motion.zoom_box, Modifier::None);
        assert_eq!(config.interaction.hit_threshold_px, 7.5);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(EngineConfig::from_json(r#"{"cache": {"max_bytes": 0}}"#), Err(ConfigError::Invalid(_))));
        assert!(matches!(
            EngineConfig::from_json(r#"{"motion": {"pan": "ctrl", "zoom_box": "ctrl"}}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(EngineConfig::from_json("{"), Err(ConfigError::Json(_))));
        assert!(matches!(EngineConfig::from_yaml("cache: [1, 2"), Err(ConfigError::Yaml(_))));
    }
}
