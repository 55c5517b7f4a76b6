use serde::{Deserialize, Serialize};

use crate::{Beat, BeatSyncError, Result};

/// Ascending cut timestamps in seconds, always starting at `0.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CutPlan {
    cuts: Vec<f64>,
}

impl CutPlan {
    pub fn cuts(&self) -> &[f64] {
        &self.cuts
    }

    pub fn len(&self) -> usize {
        self.cuts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cuts.is_empty()
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.cuts
    }

    /// Consecutive `(start, end)` clip spans between cuts, the last one ending
    /// at `target_duration`. Zero-length spans are skipped.
    pub fn clips(&self, target_duration: f64) -> Vec<(f64, f64)> {
        let mut bounds = self.cuts.clone();
        bounds.push(target_duration);
        bounds
            .windows(2)
            .filter(|pair| pair[1] > pair[0])
            .map(|pair| (pair[0], pair[1]))
            .collect()
    }
}

impl AsRef<[f64]> for CutPlan {
    fn as_ref(&self) -> &[f64] {
        &self.cuts
    }
}

/// Picks beat times to use as video cut points.
#[derive(Debug, Clone, Copy, Default)]
pub struct CutTimingGenerator;

impl CutTimingGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Takes every `cuts_per_beat`-th beat at or before `target_duration`.
    pub fn generate(
        &self,
        beats: &[Beat],
        target_duration: f64,
        cuts_per_beat: usize,
    ) -> Result<CutPlan> {
        if cuts_per_beat == 0 {
            return Err(BeatSyncError::InvalidInput("cuts_per_beat must be at least 1"));
        }

        let mut cuts = vec![0.0];
        cuts.extend(
            beats
                .iter()
                .filter(|beat| beat.time <= target_duration)
                .step_by(cuts_per_beat)
                .map(|beat| beat.time)
                .filter(|time| *time > 0.0),
        );
        cuts.sort_by(f64::total_cmp);

        Ok(CutPlan { cuts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn beats(times: &[f64]) -> Vec<Beat> {
        times
            .iter()
            .map(|&time| Beat {
                time,
                strength: 0.5,
            })
            .collect()
    }

    #[test]
    fn starts_at_zero_and_respects_target() {
        let plan = CutTimingGenerator::new()
            .generate(&beats(&[0.5, 1.0, 1.5, 2.0, 2.5]), 2.0, 1)
            .unwrap();
        assert_eq!(plan.cuts(), &[0.0, 0.5, 1.0, 1.5, 2.0]);
    }

    #[test]
    fn strides_over_filtered_beats() {
        let plan = CutTimingGenerator::new()
            .generate(&beats(&[0.5, 1.0, 1.5, 2.0, 2.5, 3.0]), 10.0, 2)
            .unwrap();
        assert_eq!(plan.cuts(), &[0.0, 0.5, 1.5, 2.5]);
    }

    #[test]
    fn beat_at_zero_is_not_duplicated() {
        let plan = CutTimingGenerator::new()
            .generate(&beats(&[0.0, 0.75]), 5.0, 1)
            .unwrap();
        assert_eq!(plan.cuts(), &[0.0, 0.75]);
    }

    #[test]
    fn no_beats_yields_single_cut() {
        let plan = CutTimingGenerator::new().generate(&[], 30.0, 1).unwrap();
        assert_eq!(plan.into_inner(), vec![0.0]);
    }

    #[test]
    fn zero_stride_is_rejected() {
        let err = CutTimingGenerator::new().generate(&beats(&[1.0]), 5.0, 0);
        assert!(matches!(err, Err(BeatSyncError::InvalidInput(_))));
    }

    #[test]
    fn clips_span_to_target() {
        let plan = CutTimingGenerator::new()
            .generate(&beats(&[1.0, 2.5]), 4.0, 1)
            .unwrap();
        assert_eq!(plan.clips(4.0), vec![(0.0, 1.0), (1.0, 2.5), (2.5, 4.0)]);
    }

    #[test]
    fn clips_skip_empty_tail() {
        let plan = CutTimingGenerator::new()
            .generate(&beats(&[1.0, 2.0]), 2.0, 1)
            .unwrap();
        assert_eq!(plan.clips(2.0), vec![(0.0, 1.0), (1.0, 2.0)]);
    }
}
