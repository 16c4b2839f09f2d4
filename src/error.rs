//! Server error types with HTTP status code mapping.
//!
//! [`LobbyError`] is the central error type for the server. Boot-phase
//! variants (configuration, database, bind, signal) abort startup; the
//! remaining variants are produced by the services at runtime and map to a
//! structured JSON error response on the control plane.

use std::net::SocketAddr;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::domain::{GameId, PlayerId};

/// Structured JSON error response body.
///
/// ```json
/// {
///   "error": {
///     "code": 2001,
///     "message": "player not found: 42"
///   }
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
}

/// Server-side error enum.
///
/// # Error Code Ranges
///
/// | Range     | Category            | HTTP Status               |
/// |-----------|---------------------|---------------------------|
/// | 1000–1999 | Validation          | 400 Bad Request           |
/// | 2000–2999 | State/Not Found     | 404 Not Found / 409       |
/// | 3000–3999 | Server / boot phase | 500 Internal Server Error |
#[derive(Debug, thiserror::Error)]
pub enum LobbyError {
    /// Missing or invalid configuration parameter.
    #[error("configuration error: {0}")]
    Config(String),

    /// Database pool could not be acquired or a query failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A listener could not bind its address.
    #[error("failed to bind {listener} listener on {addr}: {source}")]
    Bind {
        /// Name of the listener that failed.
        listener: &'static str,
        /// Address the bind was attempted on.
        addr: SocketAddr,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// Termination signal handlers could not be installed.
    #[error("failed to install signal handler: {0}")]
    Signal(#[source] std::io::Error),

    /// Generic I/O failure outside of binding.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Service construction or wiring failed.
    #[error("service error: {0}")]
    Service(String),

    /// No online player with the given ID.
    #[error("player not found: {0}")]
    PlayerNotFound(PlayerId),

    /// No game with the given ID.
    #[error("game not found: {0}")]
    GameNotFound(GameId),

    /// The player is already waiting in the matchmaking queue.
    #[error("player {0} is already searching")]
    AlreadySearching(PlayerId),

    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl LobbyError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::PlayerNotFound(_) => 2001,
            Self::GameNotFound(_) => 2002,
            Self::AlreadySearching(_) => 2003,
            Self::Internal(_) => 3000,
            Self::Config(_) => 3001,
            Self::Database(_) => 3002,
            Self::Bind { .. } => 3003,
            Self::Signal(_) => 3004,
            Self::Io(_) => 3005,
            Self::Service(_) => 3006,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::PlayerNotFound(_) | Self::GameNotFound(_) => StatusCode::NOT_FOUND,
            Self::AlreadySearching(_) => StatusCode::CONFLICT,
            Self::Internal(_)
            | Self::Config(_)
            | Self::Database(_)
            | Self::Bind { .. }
            | Self::Signal(_)
            | Self::Io(_)
            | Self::Service(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns `true` if the error belongs to the boot phase and must
    /// terminate the process.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::Database(_)
                | Self::Bind { .. }
                | Self::Signal(_)
                | Self::Service(_)
        )
    }
}

impl IntoResponse for LobbyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
