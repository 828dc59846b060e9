//! Error types for the clickscope-fakes crate.
//!
//! Request-level failures are turned into explicit HTTP statuses by
//! [`FakeError::status`]; nothing is swallowed into an empty 200.

use axum::http::StatusCode;

/// Errors produced while configuring or serving a fake backend.
#[derive(Debug, thiserror::Error)]
pub enum FakeError {
    /// No route was declared for the request.
    #[error("no route declared for {method} {path}")]
    NoRoute {
        /// Request method.
        method: String,
        /// Request path.
        path: String,
    },

    /// The route matched but the resource it points at does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The route requires an `Authorization` header and none was sent.
    #[error("not authorized")]
    Unauthorized,

    /// Invalid route table or response rule.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error while reading a fixture file or binding a socket.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Route table (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FakeError {
    /// HTTP status reported to the client for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NoRoute { .. } => StatusCode::NOT_IMPLEMENTED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Config(_) | Self::Io(_) | Self::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Convenience type alias for clickscope-fakes results.
pub type Result<T> = std::result::Result<T, FakeError>;
