//! Error types for the IndyKite provider.
//!
//! Every failure surfaced to the host ends up as an error diagnostic whose
//! summary is the `Display` text of a [`ProviderError`].

use thiserror::Error;

use crate::client::ClientError;

/// Summary used whenever the configuration API answers with a server error.
pub const SERVICE_ERROR_SUMMARY: &str = "Communication with IndyKite failed, please try again later";

#[derive(Debug, Error)]
pub enum ProviderError {
    /// The object is gone on the IndyKite side.
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),

    /// Missing or unusable provider configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No resource or data source is registered under this type name.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    /// 401 or 403 from the configuration API.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// 5xx from the configuration API.
    #[error("Communication with IndyKite failed, please try again later: {0}")]
    Unavailable(String),

    /// A request or a readiness wait ran out of time.
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// The remote object is in a state that forbids the operation,
    /// e.g. deletion protection is on.
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    #[error("Unimplemented: {0}")]
    Unimplemented(String),

    /// 400 or 422 from the configuration API.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Any other configuration API failure.
    #[error("API error: {0}")]
    Api(ClientError),
}

impl ProviderError {
    /// The bare message without the variant prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(msg)
            | Self::Validation(msg)
            | Self::Internal(msg)
            | Self::Configuration(msg)
            | Self::UnknownResource(msg)
            | Self::AlreadyExists(msg)
            | Self::PermissionDenied(msg)
            | Self::ResourceExhausted(msg)
            | Self::Unavailable(msg)
            | Self::DeadlineExceeded(msg)
            | Self::FailedPrecondition(msg)
            | Self::Unimplemented(msg)
            | Self::InvalidRequest(msg) => msg,
            Self::Serialization(_) => "malformed JSON payload",
            Self::Api(_) => "configuration API request failed",
        }
    }

    /// Whether the error means the remote object no longer exists.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<ClientError> for ProviderError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Rest(rest) => match rest.status {
                400 | 422 => Self::InvalidRequest(rest.message),
                401 | 403 => Self::PermissionDenied(rest.message),
                404 => Self::NotFound(rest.message),
                409 => Self::AlreadyExists(rest.message),
                429 => Self::ResourceExhausted(rest.message),
                status if status >= 500 => Self::Unavailable(rest.to_string()),
                _ => Self::Api(ClientError::Rest(rest)),
            },
            ClientError::Http(e) if e.is_timeout() => Self::DeadlineExceeded(e.to_string()),
            other => Self::Api(other),
        }
    }
}
