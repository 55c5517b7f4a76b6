//! [`MediaToolkit`] backed by the `ffprobe` and `ffmpeg` executables.

use std::{
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use async_trait::async_trait;
use serde::Deserialize;

use super::{AudioMetadata, MediaToolkit};
use crate::{
    record::{build_mux_args, MuxRequest},
    BeatSyncError, IngestConfig, MuxConfig, Result,
};

/// Runs FFmpeg tools as child processes, each bounded by `timeout`.
#[derive(Debug, Clone)]
pub struct FfmpegToolkit {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    timeout: Duration,
    mux: MuxConfig,
}

impl FfmpegToolkit {
    pub fn new(ingest: &IngestConfig, mux: &MuxConfig) -> Self {
        Self {
            ffmpeg: ingest.ffmpeg_path.clone(),
            ffprobe: ingest.ffprobe_path.clone(),
            timeout: ingest.tool_timeout(),
            mux: mux.clone(),
        }
    }
}

impl Default for FfmpegToolkit {
    fn default() -> Self {
        Self::new(&IngestConfig::default(), &MuxConfig::default())
    }
}

#[async_trait]
impl MediaToolkit for FfmpegToolkit {
    async fn probe(&self, source: &Path) -> Result<AudioMetadata> {
        let args = build_ffprobe_args(source);
        let stdout = run_tool(&self.ffprobe, &args, self.timeout, |message| {
            BeatSyncError::decode(source, message)
        })
        .await?;
        parse_ffprobe_json(&String::from_utf8_lossy(&stdout), source)
    }

    async fn transcode_pcm(&self, source: &Path, sample_rate: u32, dest: &Path) -> Result<()> {
        let args = build_ffmpeg_pcm_args(source, sample_rate, dest);
        run_tool(&self.ffmpeg, &args, self.timeout, |message| {
            BeatSyncError::decode(source, message)
        })
        .await?;
        Ok(())
    }

    async fn mux(&self, request: &MuxRequest) -> Result<()> {
        let args = build_mux_args(request, &self.mux);
        run_tool(&self.ffmpeg, &args, self.timeout, |message| BeatSyncError::Mux {
            message,
        })
        .await?;
        Ok(())
    }
}

/// Arguments asking ffprobe for container and stream details as JSON.
pub fn build_ffprobe_args(source: &Path) -> Vec<String> {
    vec![
        "-v".to_string(),
        "error".to_string(),
        "-print_format".to_string(),
        "json".to_string(),
        "-show_format".to_string(),
        "-show_streams".to_string(),
        source.to_string_lossy().to_string(),
    ]
}

/// Arguments transcoding the first audio stream of `source` into raw mono
/// s16le PCM written to `dest`.
pub fn build_ffmpeg_pcm_args(source: &Path, sample_rate: u32, dest: &Path) -> Vec<String> {
    vec![
        "-nostdin".to_string(),
        "-y".to_string(),
        "-v".to_string(),
        "error".to_string(),
        "-i".to_string(),
        source.to_string_lossy().to_string(),
        "-vn".to_string(),
        "-ac".to_string(),
        "1".to_string(),
        "-ar".to_string(),
        sample_rate.to_string(),
        "-f".to_string(),
        "s16le".to_string(),
        "-acodec".to_string(),
        "pcm_s16le".to_string(),
        dest.to_string_lossy().to_string(),
    ]
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    sample_rate: Option<String>,
    channels: Option<u32>,
    duration: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
}

/// Parses ffprobe's JSON report into [`AudioMetadata`] using the first audio
/// stream. Numeric fields arrive as strings; missing ones default to zero.
pub fn parse_ffprobe_json(json: &str, source: &Path) -> Result<AudioMetadata> {
    let parsed: ProbeOutput = serde_json::from_str(json).map_err(|err| {
        BeatSyncError::decode(source, format!("unreadable ffprobe output: {err}"))
    })?;

    let stream = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("audio"))
        .ok_or_else(|| BeatSyncError::decode(source, "no audio stream found"))?;
    let format = parsed.format.as_ref();

    let duration_seconds = parse_field::<f64>(stream.duration.as_deref())
        .or_else(|| parse_field(format.and_then(|f| f.duration.as_deref())))
        .unwrap_or(0.0);
    let bitrate = parse_field::<u64>(stream.bit_rate.as_deref())
        .or_else(|| parse_field(format.and_then(|f| f.bit_rate.as_deref())))
        .unwrap_or(0);

    Ok(AudioMetadata {
        duration_seconds,
        sample_rate_hz: parse_field(stream.sample_rate.as_deref()).unwrap_or(0),
        channel_count: stream.channels.unwrap_or(0),
        bitrate,
    })
}

fn parse_field<T: std::str::FromStr>(value: Option<&str>) -> Option<T> {
    value.and_then(|v| v.trim().parse().ok())
}

/// Runs `program` to completion and returns its stdout.
///
/// Launch failures and non-zero exits are turned into errors by `on_failure`,
/// which receives the tool's stderr. When `budget` elapses the child is
/// killed and [`BeatSyncError::Timeout`] is returned.
pub(crate) async fn run_tool<F>(
    program: &Path,
    args: &[String],
    budget: Duration,
    on_failure: F,
) -> Result<Vec<u8>>
where
    F: FnOnce(String) -> BeatSyncError,
{
    let tool = program.display().to_string();
    tracing::debug!(%tool, ?args, "running external tool");

    let child = tokio::process::Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output();

    let output = match tokio::time::timeout(budget, child).await {
        Ok(Ok(output)) => output,
        Ok(Err(err)) => return Err(on_failure(format!("failed to execute {tool}: {err}"))),
        Err(_) => {
            tracing::warn!(%tool, budget_secs = budget.as_secs_f64(), "external tool timed out");
            return Err(BeatSyncError::Timeout {
                tool,
                after: budget,
            });
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(on_failure(format!(
            "{tool} exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    Ok(output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROBE_MP4: &str = r#"{
        "streams": [
            { "codec_type": "video", "codec_name": "h264", "width": 1080, "height": 1920 },
            { "codec_type": "audio", "codec_name": "aac", "sample_rate": "44100",
              "channels": 2, "duration": "31.486000", "bit_rate": "128000" }
        ],
        "format": { "duration": "31.520000", "bit_rate": "2500000" }
    }"#;

    #[test]
    fn ffprobe_args_request_json() {
        let args = build_ffprobe_args(Path::new("/media/track.mp3"));
        assert_eq!(args[2], "-print_format");
        assert_eq!(args[3], "json");
        assert_eq!(args.last().unwrap(), "/media/track.mp3");
    }

    #[test]
    fn pcm_args_request_mono_s16le() {
        let args = build_ffmpeg_pcm_args(Path::new("in.mp4"), 8_000, Path::new("/tmp/out.pcm"));
        let joined = args.join(" ");
        assert!(joined.contains("-i in.mp4"));
        assert!(joined.contains("-ac 1"));
        assert!(joined.contains("-ar 8000"));
        assert!(joined.contains("-f s16le"));
        assert!(joined.contains("-acodec pcm_s16le"));
        assert_eq!(args.last().unwrap(), "/tmp/out.pcm");
    }

    #[test]
    fn parses_audio_stream_from_video_container() {
        let metadata = parse_ffprobe_json(PROBE_MP4, Path::new("clip.mp4")).unwrap();
        assert_eq!(metadata.sample_rate_hz, 44_100);
        assert_eq!(metadata.channel_count, 2);
        assert_eq!(metadata.bitrate, 128_000);
        assert!((metadata.duration_seconds - 31.486).abs() < 1e-9);
    }

    #[test]
    fn falls_back_to_format_fields() {
        let json = r#"{
            "streams": [{ "codec_type": "audio", "sample_rate": "48000", "channels": 1 }],
            "format": { "duration": "12.5", "bit_rate": "96000" }
        }"#;
        let metadata = parse_ffprobe_json(json, Path::new("voice.ogg")).unwrap();
        assert_eq!(metadata.duration_seconds, 12.5);
        assert_eq!(metadata.bitrate, 96_000);
    }

    #[test]
    fn rejects_sources_without_audio() {
        let json = r#"{ "streams": [{ "codec_type": "video" }], "format": {} }"#;
        let err = parse_ffprobe_json(json, Path::new("silent.mp4")).unwrap_err();
        assert!(err.is_decode());
        assert!(err.to_string().contains("no audio stream"));
    }

    #[test]
    fn rejects_garbage_output() {
        let err = parse_ffprobe_json("not json", Path::new("x.mp3")).unwrap_err();
        assert!(err.is_decode());
    }

    #[tokio::test]
    async fn missing_binary_is_a_decode_error() {
        let ingest = IngestConfig {
            ffprobe_path: PathBuf::from("/nonexistent/ffprobe"),
            ..Default::default()
        };
        let toolkit = FfmpegToolkit::new(&ingest, &MuxConfig::default());
        let err = toolkit.probe(Path::new("track.mp3")).await.unwrap_err();
        assert!(err.is_decode());
        assert!(err.to_string().contains("failed to execute"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn hung_tool_times_out() {
        let err = run_tool(
            Path::new("sleep"),
            &["5".to_string()],
            Duration::from_millis(50),
            BeatSyncError::msg,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, BeatSyncError::Timeout { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_carries_stderr() {
        let err = run_tool(
            Path::new("sh"),
            &["-c".to_string(), "echo 'Invalid data found' >&2; exit 1".to_string()],
            Duration::from_secs(5),
            |message| BeatSyncError::decode("broken.mp3", message),
        )
        .await
        .unwrap_err();
        assert!(err.is_decode());
        assert!(err.to_string().contains("Invalid data found"));
    }
}
