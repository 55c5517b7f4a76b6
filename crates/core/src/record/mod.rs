use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{BeatSyncError, MuxConfig, Result};

/// Request to replace the soundtrack of `video` with `audio`, written to
/// `output`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MuxRequest {
    pub video: PathBuf,
    pub audio: PathBuf,
    pub output: PathBuf,
}

impl MuxRequest {
    pub fn new(
        video: impl Into<PathBuf>,
        audio: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
    ) -> Self {
        Self {
            video: video.into(),
            audio: audio.into(),
            output: output.into(),
        }
    }

    /// Checks the request before an encoder is launched so that obvious
    /// mistakes surface with a readable message instead of FFmpeg's.
    pub fn validate(&self) -> Result<()> {
        for (label, path) in [("video", &self.video), ("audio", &self.audio)] {
            if !path.is_file() {
                return Err(BeatSyncError::Mux {
                    message: format!("{label} input `{}` does not exist", path.display()),
                });
            }
        }
        if self.output == self.video || self.output == self.audio {
            return Err(BeatSyncError::Mux {
                message: "output must not overwrite an input".to_string(),
            });
        }
        if let Some(parent) = self.output.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                return Err(BeatSyncError::Mux {
                    message: format!("output directory `{}` does not exist", parent.display()),
                });
            }
        }
        Ok(())
    }
}

/// FFmpeg arguments that take the first video stream from the video input and
/// the first audio stream from the audio input.
pub fn build_mux_args(request: &MuxRequest, settings: &MuxConfig) -> Vec<String> {
    let mut args = vec![
        "-nostdin".to_string(),
        "-y".to_string(),
        "-v".to_string(),
        "error".to_string(),
        "-i".to_string(),
        path_arg(&request.video),
        "-i".to_string(),
        path_arg(&request.audio),
        "-map".to_string(),
        "0:v:0".to_string(),
        "-map".to_string(),
        "1:a:0".to_string(),
        "-c:v".to_string(),
        settings.video_codec.clone(),
        "-c:a".to_string(),
        settings.audio_codec.clone(),
    ];
    if settings.shortest {
        args.push("-shortest".to_string());
    }
    args.push(path_arg(&request.output));
    args
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}
