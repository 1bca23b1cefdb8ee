//! Spectrogram render parameters and segment image addressing.

use serde::{Deserialize, Serialize};

use crate::types::{Interval, RecordingInfo};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowFunction {
    Hann,
    Hamming,
    Blackman,
    BlackmanHarris,
    Boxcar,
}

impl WindowFunction {
    fn as_str(self) -> &'static str {
        match self {
            WindowFunction::Hann => "hann",
            WindowFunction::Hamming => "hamming",
            WindowFunction::Blackman => "blackman",
            WindowFunction::BlackmanHarris => "blackmanharris",
            WindowFunction::Boxcar => "boxcar",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmplitudeScale {
    Decibels,
    Amplitude,
    Power,
}

impl AmplitudeScale {
    fn as_str(self) -> &'static str {
        match self {
            AmplitudeScale::Decibels => "dB",
            AmplitudeScale::Amplitude => "amplitude",
            AmplitudeScale::Power => "power",
        }
    }
}

/// Everything that changes the pixels of a rendered segment. Any change
/// yields a different [`ParamsDigest`] and therefore different cache keys.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrogramParameters {
    /// STFT window length in seconds.
    pub window_size: f64,
    /// Hop length as a fraction of the window length.
    pub hop_fraction: f64,
    pub window: WindowFunction,
    pub scale: AmplitudeScale,
    pub min_db: f64,
    pub max_db: f64,
    pub normalize: bool,
    pub pcen: bool,
    pub channel: u32,
    pub colormap: String,
    /// Resample to this rate before the STFT.
    pub resample: Option<u32>,
    pub min_freq: Option<f64>,
    pub max_freq: Option<f64>,
}

impl Default for SpectrogramParameters {
    fn default() -> Self {
        Self {
            window_size: 0.025,
            hop_fraction: 0.5,
            window: WindowFunction::Hann,
            scale: AmplitudeScale::Decibels,
            min_db: -80.0,
            max_db: 0.0,
            normalize: true,
            pcen: false,
            channel: 0,
            colormap: "gray".into(),
            resample: None,
            min_freq: None,
            max_freq: None,
        }
    }
}

/// Compact hash of a parameter set, used inside cache keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamsDigest(pub u64);

impl SpectrogramParameters {
    pub fn digest(&self) -> ParamsDigest {
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        let hash = blake3::hash(&canonical);
        let mut head = [0u8; 8];
        head.copy_from_slice(&hash.as_bytes()[..8]);
        ParamsDigest(u64::from_le_bytes(head))
    }

    pub fn samplerate(&self, recording: &RecordingInfo) -> u32 {
        self.resample.unwrap_or(recording.samplerate)
    }

    /// Hop length in seconds.
    pub fn hop_seconds(&self) -> f64 {
        self.window_size * self.hop_fraction
    }

    /// Frequency band covered by a rendered image.
    pub fn image_band(&self, recording: &RecordingInfo) -> Interval {
        let nyquist = self.samplerate(recording) as f64 / 2.0;
        let min = self.min_freq.unwrap_or(0.0).max(0.0);
        let max = self.max_freq.unwrap_or(nyquist).min(nyquist);
        Interval::ordered(min, max)
    }
}

/// Produces the address of a rendered segment image. Fetching and decoding
/// are the cache's job, not the provider's.
pub trait SegmentUrlProvider {
    fn segment_url(&self, recording: &RecordingInfo, interval: Interval, params: &SpectrogramParameters) -> String;
}

/// `GET {base}?recording=..&start_time=..&end_time=..&<parameters>`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryUrlProvider {
    pub base_url: String,
}

impl SegmentUrlProvider for QueryUrlProvider {
    fn segment_url(&self, recording: &RecordingInfo, interval: Interval, params: &SpectrogramParameters) -> String {
        let mut url = format!(
            "{}?recording={}&start_time={:.6}&end_time={:.6}&window_size={}&hop_fraction={}&window={}&scale={}&min_db={}&max_db={}&normalize={}&pcen={}&channel={}&cmap={}",
            self.base_url,
            encode_component(&recording.id),
            interval.min,
            interval.max,
            params.window_size,
            params.hop_fraction,
            params.window.as_str(),
            params.scale.as_str(),
            params.min_db,
            params.max_db,
            params.normalize,
            params.pcen,
            params.channel,
            encode_component(&params.colormap),
        );
        if let Some(rate) = params.resample {
            url.push_str(&format!("&samplerate={rate}"));
        }
        if let Some(f) = params.min_freq {
            url.push_str(&format!("&min_freq={f}"));
        }
        if let Some(f) = params.max_freq {
            url.push_str(&format!("&max_freq={f}"));
        }
        url
    }
}

/// Percent-encode everything outside the RFC 3986 unreserved set.
fn encode_component(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(b as char),
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording() -> RecordingInfo {
        RecordingInfo { id: "rec 1/a".into(), duration: 10.0, samplerate: 96_000, channels: 1 }
    }

    #[test]
    fn digest_tracks_every_parameter() {
        let base = SpectrogramParameters::default();
        assert_eq!(base.digest(), SpectrogramParameters::default().digest());
        let mut changed = base.clone();
        changed.min_db = -90.0;
        assert_ne!(base.digest(), changed.digest());
        let mut changed = base.clone();
        changed.colormap = "viridis".into();
        assert_ne!(base.digest(), changed.digest());
    }

    #[test]
    fn image_band_is_clamped_to_nyquist() {
        let params = SpectrogramParameters { max_freq: Some(80_000.0), ..Default::default() };
        assert_eq!(params.image_band(&recording()), Interval::new(0.0, 48_000.0));
        let params = SpectrogramParameters { resample: Some(44_100), ..Default::default() };
        assert_eq!(params.image_band(&recording()), Interval::new(0.0, 22_050.0));
    }

    #[test]
    fn url_encodes_recording_and_interval() {
        let provider = QueryUrlProvider { base_url: "/api/spectrograms".into() };
        let url = provider.segment_url(&recording(), Interval::new(1.5, 3.0), &SpectrogramParameters::default());
        assert!(url.starts_with("/api/spectrograms?recording=rec%201%2Fa&start_time=1.500000&end_time=3.000000"));
        assert!(url.contains("&window=hann&scale=dB"));
        assert!(!url.contains("samplerate="));
    }
}
