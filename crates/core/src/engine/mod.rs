use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    record::MuxRequest, AppConfig, AudioIngest, AudioMetadata, AudioSegment, Beat, BeatDetector,
    BeatSyncError, CutPlan, CutTimingGenerator, EnergyLevel, EnergySegmenter, FfmpegToolkit,
    MediaToolkit, Result, TempoEstimator,
};

/// Everything one analysis pass learned about a track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeatSyncResult {
    /// Length of the analysed signal in seconds.
    pub duration: f64,
    pub tempo_bpm: f64,
    pub beats: Vec<Beat>,
    pub segments: Vec<AudioSegment>,
    pub metadata: AudioMetadata,
}

impl BeatSyncResult {
    /// Segments labelled with `level`, in time order.
    pub fn segments_with(&self, level: EnergyLevel) -> impl Iterator<Item = &AudioSegment> {
        self.segments.iter().filter(move |s| s.energy == level)
    }

    /// The `count` strongest beats, returned in time order.
    pub fn strongest_beats(&self, count: usize) -> Vec<Beat> {
        let mut beats = self.beats.clone();
        beats.sort_by(|a, b| b.strength.total_cmp(&a.strength));
        beats.truncate(count);
        beats.sort_by(|a, b| a.time.total_cmp(&b.time));
        beats
    }
}

/// Stateless analysis service. Construct once and share by reference; calls
/// never touch each other's data.
#[derive(Debug, Clone)]
pub struct BeatSyncEngine<T = FfmpegToolkit> {
    ingest: AudioIngest<T>,
    detector: BeatDetector,
    tempo: TempoEstimator,
    segmenter: EnergySegmenter,
    cuts: CutTimingGenerator,
}

impl BeatSyncEngine<FfmpegToolkit> {
    /// Creates an engine that drives the FFmpeg executables named in
    /// `config`.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let toolkit = FfmpegToolkit::new(&config.ingest, &config.mux);
        Self::with_toolkit(toolkit, config)
    }
}

impl<T: MediaToolkit> BeatSyncEngine<T> {
    /// Creates an engine over any toolkit. `config` is validated first.
    pub fn with_toolkit(toolkit: T, config: &AppConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            ingest: AudioIngest::new(toolkit, config.ingest.clone()),
            detector: BeatDetector::new(config.detector.clone()),
            tempo: TempoEstimator::new(config.tempo.clone()),
            segmenter: EnergySegmenter::new(config.segments.clone()),
            cuts: CutTimingGenerator::new(),
        })
    }

    pub fn ingest(&self) -> &AudioIngest<T> {
        &self.ingest
    }

    /// Decodes `source` and runs the full analysis. Fails as a whole if the
    /// source cannot be probed or transcoded.
    pub async fn analyze_audio(&self, source: impl AsRef<Path>) -> Result<BeatSyncResult> {
        let source = source.as_ref();
        let audio = self.ingest.load(source).await?;
        let result = self.analyze_samples(&audio.samples, audio.sample_rate, audio.metadata);

        tracing::info!(
            source = %source.display(),
            duration = result.duration,
            tempo_bpm = result.tempo_bpm,
            beats = result.beats.len(),
            segments = result.segments.len(),
            "analysis complete"
        );
        Ok(result)
    }

    /// Runs detection, tempo estimation and segmentation over decoded samples.
    pub fn analyze_samples(
        &self,
        samples: &[f32],
        sample_rate: u32,
        metadata: AudioMetadata,
    ) -> BeatSyncResult {
        let duration = if sample_rate == 0 {
            0.0
        } else {
            samples.len() as f64 / f64::from(sample_rate)
        };

        let beats = self.detector.detect(samples, sample_rate);
        if beats.len() < 2 {
            tracing::warn!(beats = beats.len(), "too few beats to infer tempo, using default");
        }
        let tempo_bpm = self.tempo.estimate(&beats);
        let segments = self.segmenter.segment(samples, sample_rate);

        BeatSyncResult {
            duration,
            tempo_bpm,
            beats,
            segments,
            metadata,
        }
    }

    /// Cut plan for an existing analysis.
    pub fn cut_plan(
        &self,
        result: &BeatSyncResult,
        target_duration: f64,
        cuts_per_beat: usize,
    ) -> Result<CutPlan> {
        self.cuts.generate(&result.beats, target_duration, cuts_per_beat)
    }

    /// Analyses `source` and returns the beat-aligned cut points up to
    /// `target_duration`.
    pub async fn generate_beat_synced_cuts(
        &self,
        source: impl AsRef<Path>,
        target_duration: f64,
        cuts_per_beat: usize,
    ) -> Result<CutPlan> {
        if cuts_per_beat == 0 {
            return Err(BeatSyncError::InvalidInput("cuts_per_beat must be at least 1"));
        }
        let result = self.analyze_audio(source).await?;
        let plan = self.cut_plan(&result, target_duration, cuts_per_beat)?;
        tracing::debug!(cuts = plan.len(), target_duration, cuts_per_beat, "cut plan ready");
        Ok(plan)
    }

    /// Writes `output`: the video stream of `video` with `audio` as its
    /// soundtrack.
    pub async fn create_beat_matched_video(
        &self,
        video: impl AsRef<Path>,
        audio: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> Result<()> {
        let request = MuxRequest::new(video.as_ref(), audio.as_ref(), output.as_ref());
        request.validate()?;
        self.ingest.toolkit().mux(&request).await?;
        tracing::info!(output = %request.output.display(), "beat-matched video written");
        Ok(())
    }
}
