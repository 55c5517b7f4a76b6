use std::{path::PathBuf, time::Duration};

/// Result alias that carries the custom [`BeatSyncError`] type.
pub type Result<T> = std::result::Result<T, BeatSyncError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum BeatSyncError {
    /// The source could not be probed or transcoded. `message` carries the
    /// diagnostic reported by the external tool.
    #[error("failed to decode `{}`: {message}", .path.display())]
    Decode { path: PathBuf, message: String },
    /// The video muxer rejected the request or exited unsuccessfully.
    #[error("failed to mux video: {message}")]
    Mux { message: String },
    /// An external tool did not finish within the configured budget.
    #[error("{tool} timed out after {}s", .after.as_secs_f64())]
    Timeout { tool: String, after: Duration },
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl BeatSyncError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub(crate) fn decode(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Decode {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns true when the failure originated in probing or transcoding.
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }
}

impl From<&str> for BeatSyncError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for BeatSyncError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

impl From<serde_json::Error> for BeatSyncError {
    fn from(value: serde_json::Error) -> Self {
        Self::Config(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_error_mentions_path_and_cause() {
        let err = BeatSyncError::decode("/tmp/broken.mp3", "Invalid data found");
        let text = err.to_string();
        assert!(text.contains("/tmp/broken.mp3"));
        assert!(text.contains("Invalid data found"));
        assert!(err.is_decode());
    }

    #[test]
    fn timeout_reports_tool_and_budget() {
        let err = BeatSyncError::Timeout {
            tool: "ffmpeg".to_string(),
            after: Duration::from_millis(1500),
        };
        assert_eq!(err.to_string(), "ffmpeg timed out after 1.5s");
        assert!(!err.is_decode());
    }
}
