use thiserror::Error;

/// Result alias used throughout the crate.
pub type SpatialResult<T> = Result<T, SpatialError>;

#[derive(Debug, Error)]
pub enum SpatialError {
    /// Malformed or unreadable source audio. Fatal to the current job.
    #[error("Failed to decode source audio: {0}")]
    Decode(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The host cannot run a realtime audio callback. Callers fall back
    /// to batch processing of an already-rendered buffer.
    #[error("Realtime audio path is unavailable on this host")]
    UnsupportedRealtimePath,

    /// Cooperative cancellation. Not a failure.
    #[error("Render cancelled")]
    Cancelled,

    /// Header or buffer construction invariant was violated.
    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Invalid sample buffer: {0}")]
    InvalidBuffer(String),

    #[error("A live preview is already running; stop it before starting another")]
    PreviewBusy,

    /// Render options or parameters could not be parsed.
    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpatialError {
    /// Whether the caller can recover by switching execution strategy.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SpatialError::UnsupportedRealtimePath | SpatialError::PreviewBusy)
    }
}

impl From<hound::Error> for SpatialError {
    fn from(e: hound::Error) -> Self {
        match e {
            hound::Error::IoError(io) => SpatialError::Io(io),
            other => SpatialError::Decode(other.to_string()),
        }
    }
}
