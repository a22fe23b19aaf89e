//! Error types for the HTTP binding.

use mailpane_core::MessageId;

/// Result type alias for HTTP API operations.
pub type Result<T> = std::result::Result<T, ApiError>;

/// HTTP API error types.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Transport failure or unreadable response.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was not the expected JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The server does not know the message.
    #[error("Message not found: {0}")]
    NotFound(MessageId),

    /// The server answered with a non-success status.
    #[error("Server returned {status}: {detail}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Error detail from the response body, or the raw body.
        detail: String,
    },

    /// URL parsing error.
    #[error("URL error: {0}")]
    UrlError(#[from] url::ParseError),
}

impl ApiError {
    /// Creates a status error.
    #[must_use]
    pub fn status(status: u16, detail: impl Into<String>) -> Self {
        Self::Status {
            status,
            detail: detail.into(),
        }
    }
}

impl From<ApiError> for mailpane_core::Error {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::NotFound(id) => Self::NotFound(id),
            other => Self::network(other),
        }
    }
}
