/// Unified error types for the vidpipe system.
use thiserror::Error;

/// Top-level error type for vidpipe operations.
#[derive(Debug, Error)]
pub enum VidpipeError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("no video id found in URL: {0}")]
    InvalidUrl(String),

    #[error("metadata endpoint returned HTTP {0}")]
    MetadataFetch(u16),

    #[error("download service error: {0}")]
    DownloadService(String),

    #[error("extractor error: {0}")]
    Extractor(String),

    #[error("stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Mid-transfer failure from an upstream byte source.
///
/// Kept separate from [`VidpipeError`] so it can be the error type of an
/// outbound response body stream.
#[derive(Debug, Clone, Error)]
pub enum StreamError {
    #[error("upstream source failed: {0}")]
    Upstream(String),
}

/// Result type alias for vidpipe operations.
pub type VidpipeResult<T> = Result<T, VidpipeError>;
