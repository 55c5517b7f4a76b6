use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{analysis::mean_abs, SegmentConfig};

/// Loudness band of an [`AudioSegment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnergyLevel {
    Low,
    Medium,
    High,
    Peak,
}

impl fmt::Display for EnergyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Peak => "peak",
        };
        f.write_str(label)
    }
}

/// Half-open time span `[start, end)` with its loudness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSegment {
    pub start: f64,
    pub end: f64,
    pub energy: EnergyLevel,
    pub avg_amplitude: f32,
}

impl AudioSegment {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Splits a track into fixed-length segments labelled by average amplitude.
#[derive(Debug, Clone, Default)]
pub struct EnergySegmenter {
    config: SegmentConfig,
}

impl EnergySegmenter {
    pub fn new(config: SegmentConfig) -> Self {
        Self { config }
    }

    /// Maps an average amplitude to its band. Each band includes its lower
    /// bound.
    pub fn classify(&self, avg_amplitude: f32) -> EnergyLevel {
        if avg_amplitude < self.config.medium_threshold {
            EnergyLevel::Low
        } else if avg_amplitude < self.config.high_threshold {
            EnergyLevel::Medium
        } else if avg_amplitude < self.config.peak_threshold {
            EnergyLevel::High
        } else {
            EnergyLevel::Peak
        }
    }

    /// Segments covering `[0, samples.len() / sample_rate)` without gaps. The
    /// last segment is shorter when the track does not divide evenly.
    pub fn segment(&self, samples: &[f32], sample_rate: u32) -> Vec<AudioSegment> {
        if sample_rate == 0 || samples.is_empty() {
            return Vec::new();
        }
        let rate = f64::from(sample_rate);
        let span = ((self.config.segment_seconds * rate).round() as usize).max(1);

        samples
            .chunks(span)
            .enumerate()
            .map(|(index, chunk)| {
                let first = index * span;
                let avg_amplitude = mean_abs(chunk);
                AudioSegment {
                    start: first as f64 / rate,
                    end: (first + chunk.len()) as f64 / rate,
                    energy: self.classify(avg_amplitude),
                    avg_amplitude,
                }
            })
            .collect()
    }
}
