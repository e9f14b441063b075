//! Error types for pull-progress
//!
//! The progress engine itself (trackers, sessions, registry) is infallible by
//! contract: malformed input is normalized and stray events are dropped. The
//! errors below come from the layers around it:
//! - Pull requests that cannot be started (empty model name, shutdown)
//! - The registry transport (HTTP status, failure lines, decoding)
//! - Configuration loading
//! - The REST API server

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for pull-progress operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for pull-progress
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "registry.host")
        key: Option<String>,
    },

    /// The pull request cannot be accepted as given
    #[error("invalid pull request: {0}")]
    InvalidRequest(String),

    /// The registry reported a failure inside the progress stream
    #[error("transport error: {0}")]
    Transport(String),

    /// The registry answered with an HTTP error status
    #[error("registry returned {status}: {message}")]
    Registry {
        /// HTTP status code returned by the registry
        status: u16,
        /// Error message from the response body, or the status reason
        message: String,
    },

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Pull session not found
    #[error("pull not found: {0}")]
    NotFound(String),

    /// The pull session is still in flight and cannot be dismissed
    #[error("pull {0} is still in flight; cancel it first")]
    InFlight(String),

    /// Shutdown in progress - not accepting new pulls
    #[error("shutdown in progress: not accepting new pulls")]
    ShuttingDown,

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),
}

impl Error {
    /// Shorthand for a configuration error tied to a config key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

/// API error response format
///
/// Returned by API endpoints when an error occurs.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "not_found",
///     "message": "pull not found: llama3:8b"
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_found", "invalid_request")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create a "not found" error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new("not_found", format!("{} not found", resource.into()))
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            Error::Config { .. } => 400,
            Error::InvalidRequest(_) => 400,
            Error::Serialization(_) => 400,

            Error::NotFound(_) => 404,
            Error::InFlight(_) => 409,

            // 502 Bad Gateway - the registry misbehaved or failed
            Error::Transport(_) => 502,
            Error::Registry { .. } => 502,
            Error::Network(_) => 502,

            Error::ShuttingDown => 503,

            Error::Io(_) => 500,
            Error::ApiServerError(_) => 500,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::InvalidRequest(_) => "invalid_request",
            Error::Transport(_) => "transport_error",
            Error::Registry { .. } => "registry_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::Io(_) => "io_error",
            Error::NotFound(_) => "not_found",
            Error::InFlight(_) => "in_flight",
            Error::ShuttingDown => "shutting_down",
            Error::ApiServerError(_) => "api_server_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({ "key": key })),
            Error::Registry { status, .. } => Some(serde_json::json!({ "registry_status": status })),
            Error::NotFound(model) | Error::InFlight(model) => {
                Some(serde_json::json!({ "model": model }))
            }
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
