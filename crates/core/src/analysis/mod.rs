//! Time-domain beat detection and tempo estimation.
//!
//! Beats are picked from the short-term energy envelope: a window is a beat
//! when its mean absolute amplitude is a local maximum standing
//! `threshold_sigma` standard deviations above the track average. This is not
//! an onset tracker and will misfire on loud sustained low-frequency content.

use serde::{Deserialize, Serialize};

use crate::{DetectorConfig, TempoConfig};

/// One detected rhythmic onset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Beat {
    /// Seconds from the start of the track.
    pub time: f64,
    /// How far the window's energy stood above the mean, in `[0, 1]`.
    pub strength: f32,
}

/// Energy-peak beat detector.
#[derive(Debug, Clone, Default)]
pub struct BeatDetector {
    config: DetectorConfig,
}

impl BeatDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Minimum distance between two reported beats, in seconds.
    pub fn min_beat_spacing_seconds(&self, sample_rate: u32) -> f64 {
        if sample_rate == 0 {
            return 0.0;
        }
        let hop = self.config.hop_samples(sample_rate);
        (self.config.min_beat_spacing * hop) as f64 / f64::from(sample_rate)
    }

    /// Returns beats in ascending time order.
    pub fn detect(&self, samples: &[f32], sample_rate: u32) -> Vec<Beat> {
        if sample_rate == 0 {
            return Vec::new();
        }
        let window = self.config.window_samples(sample_rate);
        let hop = self.config.hop_samples(sample_rate);
        let energies = window_energies(samples, window, hop);
        if energies.len() < 3 {
            return Vec::new();
        }

        let (mean, stddev) = mean_and_stddev(&energies);
        if stddev <= 0.0 {
            tracing::debug!(windows = energies.len(), "flat energy envelope, no beats");
            return Vec::new();
        }
        let threshold = mean + self.config.threshold_sigma * stddev;

        let mut beats = Vec::new();
        let mut last_index: Option<usize> = None;
        for i in 1..energies.len() - 1 {
            let energy = energies[i];
            let is_peak =
                energy > threshold && energy > energies[i - 1] && energy > energies[i + 1];
            if !is_peak {
                continue;
            }
            if last_index.is_some_and(|last| i - last < self.config.min_beat_spacing) {
                continue;
            }

            beats.push(Beat {
                time: (i * hop) as f64 / f64::from(sample_rate),
                strength: ((energy - mean) / (2.0 * stddev)).clamp(0.0, 1.0),
            });
            last_index = Some(i);
        }

        tracing::debug!(
            windows = energies.len(),
            mean,
            stddev,
            threshold,
            beats = beats.len(),
            "beat detection finished"
        );
        beats
    }
}

/// Mean absolute amplitude of each `window`-sample frame, advancing by `hop`.
/// Only full windows are scanned.
pub fn window_energies(samples: &[f32], window: usize, hop: usize) -> Vec<f32> {
    if window == 0 || hop == 0 || samples.len() < window {
        return Vec::new();
    }

    (0..=samples.len() - window)
        .step_by(hop)
        .map(|start| mean_abs(&samples[start..start + window]))
        .collect()
}

pub(crate) fn mean_abs(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|s| f64::from(s.abs())).sum();
    (sum / samples.len() as f64) as f32
}

/// Population mean and standard deviation.
fn mean_and_stddev(values: &[f32]) -> (f32, f32) {
    let n = values.len() as f64;
    let mean = values.iter().map(|v| f64::from(*v)).sum::<f64>() / n;
    let variance = values
        .iter()
        .map(|v| {
            let d = f64::from(*v) - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    (mean as f32, variance.sqrt() as f32)
}

/// Reduces a beat list to a single BPM figure.
#[derive(Debug, Clone, Default)]
pub struct TempoEstimator {
    config: TempoConfig,
}

impl TempoEstimator {
    pub fn new(config: TempoConfig) -> Self {
        Self { config }
    }

    /// Mean inter-beat interval converted to BPM, rounded and clamped into the
    /// configured range. Falls back to the default tempo when fewer than two
    /// beats are available.
    pub fn estimate(&self, beats: &[Beat]) -> f64 {
        if beats.len() < 2 {
            return self.config.default_bpm;
        }

        let total: f64 = beats.windows(2).map(|pair| pair[1].time - pair[0].time).sum();
        let mean_interval = total / (beats.len() - 1) as f64;
        if mean_interval <= 0.0 {
            return self.config.default_bpm;
        }

        (60.0 / mean_interval)
            .round()
            .clamp(self.config.min_bpm, self.config.max_bpm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 8_000;

    fn beat(time: f64) -> Beat {
        Beat {
            time,
            strength: 1.0,
        }
    }

    /// Decaying hits of 10 ms time constant placed at `times`.
    fn click_track(seconds: f64, times: &[f64]) -> Vec<f32> {
        let len = (seconds * f64::from(RATE)) as usize;
        let mut samples = vec![0.0_f32; len];
        for &t in times {
            let start = (t * f64::from(RATE)).round() as usize;
            for (offset, sample) in samples.iter_mut().skip(start).take(800).enumerate() {
                *sample += 0.9 * (-(offset as f32) / 80.0).exp();
            }
        }
        samples
    }

    #[test]
    fn energies_use_mean_absolute_amplitude() {
        let samples = [0.5, -0.5, 1.0, -1.0, 0.0, 0.0];
        let energies = window_energies(&samples, 2, 2);
        assert_eq!(energies, vec![0.5, 1.0, 0.0]);
    }

    #[test]
    fn energies_skip_trailing_partial_window() {
        let energies = window_energies(&[1.0; 10], 4, 2);
        assert_eq!(energies.len(), 4);
        assert!(window_energies(&[1.0; 3], 4, 2).is_empty());
    }

    #[test]
    fn silence_has_no_beats() {
        let detector = BeatDetector::default();
        assert!(detector.detect(&vec![0.0; 80_000], RATE).is_empty());
    }

    #[test]
    fn constant_signal_has_no_beats() {
        let detector = BeatDetector::default();
        assert!(detector.detect(&vec![0.4; 16_000], RATE).is_empty());
    }

    #[test]
    fn detects_regular_hits() {
        let times: Vec<f64> = (0..20).map(|k| k as f64 * 0.5).collect();
        let samples = click_track(10.0, &times);
        let beats = BeatDetector::default().detect(&samples, RATE);

        assert!((19..=20).contains(&beats.len()), "got {} beats", beats.len());
        for beat in &beats {
            let nearest = (beat.time / 0.5).round() * 0.5;
            assert!((beat.time - nearest).abs() < 0.03);
            assert!((0.0..=1.0).contains(&beat.strength));
        }
    }

    /// Signal whose per-window energies equal `levels` when windows do not
    /// overlap.
    fn stepped(levels: &[(usize, f32)], blocks: usize, block: usize) -> Vec<f32> {
        let mut samples = vec![0.0_f32; blocks * block];
        for &(index, level) in levels {
            for (n, sample) in samples[index * block..(index + 1) * block]
                .iter_mut()
                .enumerate()
            {
                *sample = if n % 2 == 0 { level } else { -level };
            }
        }
        samples
    }

    #[test]
    fn enforces_minimum_spacing() {
        let detector = BeatDetector::new(DetectorConfig {
            window_ms: 25.0,
            hop_ms: 25.0,
            ..Default::default()
        });
        // 25 samples per window at 1 kHz. Peak 12 sits two hops after 10 and
        // is dropped; 33 sits exactly three hops after 30 and is kept.
        let samples = stepped(&[(10, 1.0), (12, 0.9), (30, 1.0), (33, 1.0)], 50, 25);
        let beats = detector.detect(&samples, 1_000);

        let times: Vec<f64> = beats.iter().map(|b| b.time).collect();
        assert_eq!(times, vec![0.25, 0.75, 0.825]);
        assert!((detector.min_beat_spacing_seconds(1_000) - 0.075).abs() < 1e-12);
        assert!((BeatDetector::default().min_beat_spacing_seconds(RATE) - 0.075).abs() < 1e-12);
    }

    #[test]
    fn strength_is_clamped() {
        let samples = click_track(6.0, &[3.0]);
        let beats = BeatDetector::default().detect(&samples, RATE);
        assert_eq!(beats.len(), 1);
        assert_eq!(beats[0].strength, 1.0);
    }

    #[test]
    fn tempo_defaults_without_two_beats() {
        let estimator = TempoEstimator::default();
        assert_eq!(estimator.estimate(&[]), 120.0);
        assert_eq!(estimator.estimate(&[beat(1.0)]), 120.0);
    }

    #[test]
    fn tempo_from_mean_interval() {
        let estimator = TempoEstimator::default();
        let beats: Vec<Beat> = (0..8).map(|k| beat(k as f64 * 0.5)).collect();
        assert_eq!(estimator.estimate(&beats), 120.0);

        let uneven = [beat(0.0), beat(0.4), beat(1.0)];
        assert_eq!(estimator.estimate(&uneven), 120.0);
    }

    #[test]
    fn tempo_is_rounded_and_clamped() {
        let estimator = TempoEstimator::default();
        assert_eq!(estimator.estimate(&[beat(0.0), beat(0.7)]), 86.0);
        assert_eq!(estimator.estimate(&[beat(0.0), beat(0.1)]), 200.0);
        assert_eq!(estimator.estimate(&[beat(0.0), beat(4.0)]), 60.0);
    }
}
