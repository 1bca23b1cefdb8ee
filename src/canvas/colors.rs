use sonomark_core::annotation::Tag;

/// Palette cycled through by tag key, picked to stay readable over a dark
/// spectrogram.
const TAG_PALETTE: [[u8; 3]; 10] = [
    [255, 99, 71],   // tomato
    [255, 215, 0],   // gold
    [124, 252, 0],   // lawn green
    [0, 206, 209],   // turquoise
    [30, 144, 255],  // dodger blue
    [186, 85, 211],  // orchid
    [255, 140, 0],   // dark orange
    [60, 179, 113],  // sea green
    [255, 105, 180], // hot pink
    [176, 196, 222], // steel
];

/// FNV-1a over the tag key, so every tag sharing a key shares a colour
/// across sessions.
fn key_hash(key: &str) -> u32 {
    key.bytes().fold(0x811c_9dc5u32, |h, b| (h ^ b as u32).wrapping_mul(0x0100_0193))
}

pub fn tag_color(tag: &Tag) -> [u8; 3] {
    TAG_PALETTE[key_hash(&tag.key) as usize % TAG_PALETTE.len()]
}

pub fn rgba(color: [u8; 3], alpha: f64) -> String {
    format!("rgba({},{},{},{})", color[0], color[1], color[2], alpha)
}

pub const OUTLINE: [u8; 3] = [0, 255, 160];
pub const SELECTED: [u8; 3] = [255, 255, 255];
pub const DRAFT: [u8; 3] = [255, 200, 0];
pub const MEASURE: [u8; 3] = [120, 200, 255];

/// Label for a frequency marker.
pub fn freq_marker_label(freq_hz: f64, interval_hz: f64) -> String {
    if interval_hz >= 1000.0 {
        format!("{} kHz", (freq_hz / 1000.0).round() as i64)
    } else if freq_hz >= 1000.0 {
        format!("{:.1} kHz", freq_hz / 1000.0)
    } else {
        format!("{} Hz", freq_hz.round() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_key_same_color() {
        let a = Tag::new("species", "Myotis");
        let b = Tag::new("species", "Pipistrellus");
        assert_eq!(tag_color(&a), tag_color(&b));
    }

    #[test]
    fn freq_labels() {
        assert_eq!(freq_marker_label(20_000.0, 10_000.0), "20 kHz");
        assert_eq!(freq_marker_label(1_500.0, 500.0), "1.5 kHz");
        assert_eq!(freq_marker_label(200.0, 100.0), "200 Hz");
    }
}
