//! Error types for the core library.

use thiserror::Error;

use crate::model::MessageId;

/// Errors that can occur in core operations.
///
/// The type is `Clone` because a single failed fetch is delivered to every
/// caller that attached to it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The mail store was unreachable or answered with a non-success status.
    #[error("Network failure: {0}")]
    Network(String),

    /// The mail store no longer knows the message.
    #[error("Message not found: {0}")]
    NotFound(MessageId),

    /// The request was rejected locally before any network call.
    #[error("Validation failed: {0}")]
    Validation(String),
}

/// Coarse classification of an [`Error`], suitable for display decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`Error::Network`].
    NetworkFailure,
    /// See [`Error::NotFound`].
    NotFound,
    /// See [`Error::Validation`].
    ValidationFailure,
}

impl Error {
    /// Creates a network error from any displayable cause.
    #[must_use]
    pub fn network(cause: impl std::fmt::Display) -> Self {
        Self::Network(cause.to_string())
    }

    /// Creates a validation error.
    #[must_use]
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    /// Returns the kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) => ErrorKind::NetworkFailure,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Validation(_) => ErrorKind::ValidationFailure,
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
