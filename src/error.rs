//! Error types for the fusion studio.

use std::time::Duration;

/// Longest provider error message kept verbatim before truncation.
const MAX_ERROR_MESSAGE_CHARS: usize = 500;

/// Errors that can occur while preparing, fusing, generating or editing images.
#[derive(Debug, thiserror::Error)]
pub enum StudioError {
    /// API key missing, invalid or rejected by the service.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Sanitized response body.
        message: String,
    },

    /// Rate limit exceeded.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// Server hint, if any.
        retry_after: Option<Duration>,
    },

    /// Request or output was blocked by safety filters.
    #[error("content blocked: {0}")]
    ContentBlocked(String),

    /// The model answered with text instead of an image.
    #[error("model refused to generate image: \"{0}\"")]
    Refused(String),

    /// The model stopped with an abnormal finish reason and no content.
    #[error("generation stopped due to: {0}")]
    Stopped(String),

    /// The response carried nothing usable.
    #[error("no image: {0}")]
    NoImage(String),

    /// Invalid request parameters.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Required user input is missing; no remote call was made.
    #[error("missing input: {0}")]
    MissingInput(String),

    /// Network or HTTP error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Failed to decode base64 data or a background task.
    #[error("failed to decode: {0}")]
    Decode(String),

    /// Image decoding or encoding failed.
    #[error("image processing failed: {0}")]
    Image(#[from] ::image::ImageError),

    /// I/O error (reading uploads, saving results).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StudioError {
    /// Returns true if this error is likely transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Network(_))
    }

    /// Returns the suggested retry delay, if available.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            Self::Network(_) => Some(Duration::from_secs(2)),
            _ => None,
        }
    }

    /// Returns true if the credential should be considered unusable.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

/// Result type alias for studio operations.
pub type Result<T> = std::result::Result<T, StudioError>;

/// Collapses whitespace and truncates a provider error body for display.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= MAX_ERROR_MESSAGE_CHARS {
        return collapsed;
    }
    let mut truncated: String = collapsed.chars().take(MAX_ERROR_MESSAGE_CHARS).collect();
    truncated.push_str("...");
    truncated
}

/// Reads a `Retry-After` header expressed in seconds.
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}
