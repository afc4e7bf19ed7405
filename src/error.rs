//! Unified error type.

use http::StatusCode;

/// The error type returned by handlers, middleware and the server.
///
/// Handlers return [`Error::Status`] to signal an HTTP-level failure (404,
/// 422, 500, ...). The router's error handler turns it into a response, and
/// the request log keeps its message.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Binding to a port or accepting a connection failed.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// An HTTP-level failure with the status code it should produce.
    #[error("{message}")]
    Status { status: StatusCode, message: String },

    /// Any other handler failure. Translated to `500` by default.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// An HTTP error carrying the canonical reason phrase as its message.
    ///
    /// `Error::status(StatusCode::UNPROCESSABLE_ENTITY)` displays as
    /// `"Unprocessable Entity"`.
    pub fn status(status: StatusCode) -> Self {
        let message = status.canonical_reason().unwrap_or("Unknown Status").to_owned();
        Self::Status { status, message }
    }

    pub fn with_message(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Status { status, message: message.into() }
    }

    pub fn other(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Other(Box::new(err))
    }

    /// The status code this error translates to.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Status { status, .. } => *status,
            Self::Io(_) | Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_uses_reason_phrase() {
        let err = Error::status(StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.to_string(), "Unprocessable Entity");
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn other_errors_translate_to_500() {
        let err = Error::other(std::fmt::Error);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "an error occurred when formatting an argument");
    }
}
