//! Core library for the BeatSync engine.
//!
//! The crate turns an audio (or video) file into beats, a tempo estimate and
//! loudness segments, then derives cut points that let a video editor land
//! clip transitions on the music. Each module owns one stage of that
//! pipeline; [`BeatSyncEngine`] wires them together behind a single
//! stateless service.

pub mod analysis;
pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod record;
pub mod segment;
pub mod timeline;

pub use async_trait::async_trait;

pub use analysis::{Beat, BeatDetector, TempoEstimator};
pub use audio::{AudioIngest, AudioMetadata, DecodedAudio, FfmpegToolkit, MediaToolkit};
pub use config::{
    AppConfig, DetectorConfig, IngestConfig, MuxConfig, SegmentConfig, TempoConfig,
    ANALYSIS_SAMPLE_RATE,
};
pub use engine::{BeatSyncEngine, BeatSyncResult};
pub use error::{BeatSyncError, Result};
pub use record::MuxRequest;
pub use segment::{AudioSegment, EnergyLevel, EnergySegmenter};
pub use timeline::{CutPlan, CutTimingGenerator};
