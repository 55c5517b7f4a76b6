use std::{path::Path, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{BeatSyncError, Result};

/// Rate the transcoder resamples to before analysis. 8 kHz mono keeps the
/// windowed scans cheap while leaving enough resolution for 25 ms hops.
pub const ANALYSIS_SAMPLE_RATE: u32 = 8_000;

const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(120);

/// Top-level configuration structure for the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub ingest: IngestConfig,
    pub detector: DetectorConfig,
    pub tempo: TempoConfig,
    pub segments: SegmentConfig,
    pub mux: MuxConfig,
}

impl AppConfig {
    /// Loads a configuration file. Missing fields keep their defaults so a
    /// file may override a single threshold.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.ingest.sample_rate == 0 {
            return Err(BeatSyncError::Config("ingest.sample_rate must be positive".into()));
        }
        if !is_positive(self.ingest.tool_timeout_secs) {
            return Err(BeatSyncError::Config("ingest.tool_timeout_secs must be positive".into()));
        }
        let d = &self.detector;
        if !is_positive(d.window_ms) || !is_positive(d.hop_ms) {
            return Err(BeatSyncError::Config("detector window and hop must be positive".into()));
        }
        if !d.threshold_sigma.is_finite() {
            return Err(BeatSyncError::Config("detector.threshold_sigma must be finite".into()));
        }
        if !is_positive(self.segments.segment_seconds) {
            return Err(BeatSyncError::Config("segments.segment_seconds must be positive".into()));
        }
        let s = &self.segments;
        if !(s.medium_threshold <= s.high_threshold && s.high_threshold <= s.peak_threshold) {
            return Err(BeatSyncError::Config(
                "energy thresholds must be ordered medium <= high <= peak".into(),
            ));
        }
        let t = &self.tempo;
        if ![t.default_bpm, t.min_bpm, t.max_bpm].iter().all(|bpm| is_positive(*bpm)) {
            return Err(BeatSyncError::Config("tempo values must be positive".into()));
        }
        if t.min_bpm > t.max_bpm {
            return Err(BeatSyncError::Config("tempo.min_bpm exceeds tempo.max_bpm".into()));
        }
        Ok(())
    }
}

/// Finite and strictly above zero. NaN fails.
fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// Settings for the probe/transcode boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IngestConfig {
    pub sample_rate: u32,
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    /// Directory that receives per-request PCM scratch files. Falls back to
    /// the system temp dir.
    pub scratch_dir: Option<PathBuf>,
    pub tool_timeout_secs: f64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            sample_rate: ANALYSIS_SAMPLE_RATE,
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            scratch_dir: None,
            tool_timeout_secs: DEFAULT_TOOL_TIMEOUT.as_secs_f64(),
        }
    }
}

impl IngestConfig {
    /// Budget for each external tool run. Values [`AppConfig::validate`]
    /// would reject fall back to the default budget.
    pub fn tool_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.tool_timeout_secs)
            .ok()
            .filter(|budget| !budget.is_zero())
            .unwrap_or(DEFAULT_TOOL_TIMEOUT)
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Energy-peak detector tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectorConfig {
    pub window_ms: f64,
    pub hop_ms: f64,
    /// Standard deviations above the mean energy a window must reach.
    pub threshold_sigma: f32,
    /// Minimum distance between accepted beats, in hops.
    pub min_beat_spacing: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            window_ms: 50.0,
            hop_ms: 25.0,
            threshold_sigma: 1.5,
            min_beat_spacing: 3,
        }
    }
}

impl DetectorConfig {
    /// Window size in samples.
    pub fn window_samples(&self, sample_rate: u32) -> usize {
        ms_to_samples(self.window_ms, sample_rate)
    }

    /// Hop size in samples.
    pub fn hop_samples(&self, sample_rate: u32) -> usize {
        ms_to_samples(self.hop_ms, sample_rate)
    }
}

fn ms_to_samples(ms: f64, sample_rate: u32) -> usize {
    (ms / 1000.0 * f64::from(sample_rate)).round() as usize
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TempoConfig {
    /// Reported when fewer than two beats were detected.
    pub default_bpm: f64,
    pub min_bpm: f64,
    pub max_bpm: f64,
}

impl Default for TempoConfig {
    fn default() -> Self {
        Self {
            default_bpm: 120.0,
            min_bpm: 60.0,
            max_bpm: 200.0,
        }
    }
}

/// Segment length and the lower bounds of each energy band. A band's bound
/// is inclusive: an average of exactly `medium_threshold` is medium.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SegmentConfig {
    pub segment_seconds: f64,
    pub medium_threshold: f32,
    pub high_threshold: f32,
    pub peak_threshold: f32,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            segment_seconds: 2.0,
            medium_threshold: 0.1,
            high_threshold: 0.3,
            peak_threshold: 0.6,
        }
    }
}

/// Encoder settings used when replacing a video's soundtrack.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MuxConfig {
    pub video_codec: String,
    pub audio_codec: String,
    /// Stop at the end of the shorter input.
    pub shortest: bool,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            video_codec: "copy".to_string(),
            audio_codec: "aac".to_string(),
            shortest: true,
        }
    }
}
