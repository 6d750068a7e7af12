/// Failures surfaced by the video repository and the reaction updater.
#[derive(Debug, thiserror::Error)]
pub enum VideoError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Video not found")]
    NotFound,

    /// The store or the media service failed.
    #[error("upstream failure: {0:#}")]
    Upstream(#[from] anyhow::Error),
}

impl VideoError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}

pub type VideoResult<T> = Result<T, VideoError>;
