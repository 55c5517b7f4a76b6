//! Boundary between the engine and the external media tools.
//!
//! [`AudioIngest`] probes a source, asks the transcoder for mono 16-bit PCM
//! at the analysis rate and decodes it into normalised samples. The tools
//! themselves sit behind [`MediaToolkit`] so the pipeline can run against
//! FFmpeg in production and against in-memory fakes in tests.

mod ffmpeg;
pub mod pcm;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tempfile::TempPath;

use crate::{record::MuxRequest, BeatSyncError, IngestConfig, Result};

pub use ffmpeg::{build_ffmpeg_pcm_args, build_ffprobe_args, parse_ffprobe_json, FfmpegToolkit};

/// Stream properties reported by the prober.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioMetadata {
    pub duration_seconds: f64,
    pub sample_rate_hz: u32,
    pub channel_count: u32,
    /// Bits per second, zero when the container does not report one.
    pub bitrate: u64,
}

/// Output of [`AudioIngest::load`]: metadata plus mono samples in `[-1, 1]`.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub metadata: AudioMetadata,
    pub samples: Vec<f32>,
    /// Rate of `samples`, which is the analysis rate rather than the source
    /// rate in `metadata`.
    pub sample_rate: u32,
}

impl DecodedAudio {
    /// Length of the decoded signal in seconds.
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / f64::from(self.sample_rate)
    }
}

/// External media prober, PCM transcoder and video muxer.
#[async_trait]
pub trait MediaToolkit: Send + Sync {
    /// Reads stream metadata without decoding.
    async fn probe(&self, source: &Path) -> Result<AudioMetadata>;

    /// Writes `source` to `dest` as mono s16le PCM at `sample_rate`.
    async fn transcode_pcm(&self, source: &Path, sample_rate: u32, dest: &Path) -> Result<()>;

    /// Replaces the soundtrack of a video.
    async fn mux(&self, request: &MuxRequest) -> Result<()>;
}

/// Produces [`DecodedAudio`] for a file through a [`MediaToolkit`].
#[derive(Debug, Clone)]
pub struct AudioIngest<T> {
    toolkit: T,
    config: IngestConfig,
}

impl<T: MediaToolkit> AudioIngest<T> {
    pub fn new(toolkit: T, config: IngestConfig) -> Self {
        Self { toolkit, config }
    }

    pub fn toolkit(&self) -> &T {
        &self.toolkit
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Probes and decodes `source`.
    ///
    /// The PCM scratch file is private to this call and removed on every exit
    /// path, including when the returned future is dropped mid-transcode.
    pub async fn load(&self, source: &Path) -> Result<DecodedAudio> {
        let metadata = self.toolkit.probe(source).await?;
        tracing::debug!(
            source = %source.display(),
            duration = metadata.duration_seconds,
            sample_rate = metadata.sample_rate_hz,
            channels = metadata.channel_count,
            "probed source"
        );

        let sample_rate = self.config.sample_rate;
        let scratch = ScratchFile::create(&self.config.scratch_dir())?;
        self.toolkit
            .transcode_pcm(source, sample_rate, scratch.path())
            .await?;

        let bytes = tokio::fs::read(scratch.path()).await.map_err(|err| {
            BeatSyncError::decode(source, format!("transcoder output unreadable: {err}"))
        })?;
        scratch.release();

        let samples = pcm::decode_s16le(&bytes, source)?;
        tracing::debug!(samples = samples.len(), sample_rate, "decoded PCM");

        Ok(DecodedAudio {
            metadata,
            samples,
            sample_rate,
        })
    }
}

/// Uniquely named scratch file that is deleted when released or dropped.
#[derive(Debug)]
pub(crate) struct ScratchFile {
    path: Option<TempPath>,
}

impl ScratchFile {
    pub(crate) fn create(dir: &Path) -> Result<Self> {
        let file = tempfile::Builder::new()
            .prefix("beatsync-")
            .suffix(".pcm")
            .tempfile_in(dir)?;
        Ok(Self {
            path: Some(file.into_temp_path()),
        })
    }

    pub(crate) fn path(&self) -> &Path {
        self.path.as_deref().unwrap_or_else(|| Path::new(""))
    }

    /// Deletes the file now. Failures are logged, never returned.
    pub(crate) fn release(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        if let Some(path) = self.path.take() {
            let shown: PathBuf = path.to_path_buf();
            if let Err(err) = path.close() {
                tracing::warn!(path = %shown.display(), %err, "failed to remove scratch file");
            }
        }
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        self.remove();
    }
}
