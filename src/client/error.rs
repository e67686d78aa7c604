//! Errors raised while talking to the configuration API.

use thiserror::Error;

use super::credentials::CredentialsError;

/// A non-2xx answer from the configuration API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("HTTP {status}: {message}")]
pub struct RestError {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body.
    pub message: String,
}

impl RestError {
    /// Create a new REST error.
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Whether the API reported the object as missing.
    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    /// Whether the API failed on its side (5xx).
    pub fn is_service_error(&self) -> bool {
        self.status >= 500
    }
}

/// Errors returned by [`ConfigClient`](super::ConfigClient) implementations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The API answered with an error status.
    #[error(transparent)]
    Rest(#[from] RestError),

    /// The request could not be sent or the response could not be read.
    #[error("failed to execute request: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body did not match the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The bearer token cannot be sent as a header value.
    #[error("invalid bearer token: {0}")]
    InvalidToken(#[from] reqwest::header::InvalidHeaderValue),

    /// Service account credentials could not be loaded.
    #[error("failed to load credentials: {0}")]
    Credentials(#[from] CredentialsError),
}

impl ClientError {
    /// Whether the error is an HTTP 404.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Rest(e) if e.is_not_found())
    }

    /// Whether the error is an HTTP 5xx.
    pub fn is_service_error(&self) -> bool {
        matches!(self, Self::Rest(e) if e.is_service_error())
    }
}
