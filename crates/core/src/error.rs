use std::path::PathBuf;

/// Result alias that carries the custom [`CapsuleError`] type.
pub type Result<T> = std::result::Result<T, CapsuleError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum CapsuleError {
    /// Rejected run configuration. Raised before any track is touched.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// No track survived the validity filter, so there is nothing to mix.
    #[error(
        "no usable tracks: {analysed} analysed, none longer than \
         {intermission:.3}s intermission plus two {transition:.3}s transitions"
    )]
    InsufficientTracks {
        analysed: usize,
        intermission: f64,
        transition: f64,
    },
    /// A source file could not be analysed or its analysis cache is unreadable.
    #[error("failed to analyse `{}`: {}", .path.display(), .reason)]
    Analysis { path: PathBuf, reason: String },
    /// Feature resampling could not produce a matrix for a track.
    #[error("failed to resample features for `{track}`: {reason}")]
    Features { track: String, reason: String },
    /// Renderer failure, reported as-is.
    #[error("render failed: {0}")]
    Render(String),
    #[error("{0}")]
    Message(String),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl CapsuleError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub(crate) fn analysis(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Analysis {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
