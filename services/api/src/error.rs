//! services/api/src/error.rs
//!
//! Defines the primary error type for the API service, plus the mapping from core
//! errors to HTTP responses used by every handler.

use crate::config::ConfigError;
use agent_metrics_core::ports::PortError;
use agent_metrics_core::window::WindowError;
use axum::http::StatusCode;
use tracing::error;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a failure while applying the embedded migrations.
    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

/// The error half of every handler's `Result`.
pub type HandlerError = (StatusCode, String);

/// Maps a port failure to a status code, logging anything the caller can't fix.
pub fn port_failure(context: &str, e: PortError) -> HandlerError {
    match e {
        PortError::NotFound(what) => (StatusCode::NOT_FOUND, what),
        PortError::Conflict(what) => (StatusCode::CONFLICT, what),
        PortError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
        PortError::Unexpected(detail) => {
            error!("{}: {}", context, detail);
            (StatusCode::INTERNAL_SERVER_ERROR, format!("{}", context))
        }
    }
}

/// Invalid periods are the caller's fault.
pub fn window_failure(e: WindowError) -> HandlerError {
    (StatusCode::BAD_REQUEST, e.to_string())
}

pub fn bad_request(message: impl Into<String>) -> HandlerError {
    (StatusCode::BAD_REQUEST, message.into())
}

pub fn forbidden(message: impl Into<String>) -> HandlerError {
    (StatusCode::FORBIDDEN, message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn port_errors_map_to_statuses() {
        let (status, body) = port_failure("Failed", PortError::NotFound("Record x".into()));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, "Record x");

        let (status, _) = port_failure("Failed", PortError::Conflict("dup".into()));
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = port_failure("Failed to load", PortError::Unexpected("boom".into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "Failed to load");
    }

    #[test]
    fn window_errors_are_client_errors() {
        let start = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let (status, body) = window_failure(WindowError::EndBeforeStart { start, end });
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("before"));
    }
}
