//! Unified application error types for ChatHub.
//!
//! All crates map their internal errors into [`AppError`] for consistent
//! propagation through the ? operator. The session and gateway failure
//! modes are first-class [`ErrorKind`]s so that callers (HTTP handlers,
//! the WebSocket driver, the reconnecting client) can branch on them
//! without string matching.

use std::fmt;
use thiserror::Error;

/// Top-level error kind categorization used across the entire application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// No credential, or a credential that failed verification.
    Unauthenticated,
    /// A refresh token that matches no active session.
    InvalidToken,
    /// The access token is past its TTL; the client must refresh.
    Expired,
    /// The session behind the credential is no longer active.
    Revoked,
    /// A refresh token that was already rotated was presented again.
    ReplayedRefreshToken,
    /// Entitlement check failed.
    Forbidden,
    /// The connection's outbound queue is saturated with critical events.
    SlowConsumer,
    /// The per-user session cap was reached at issue time.
    TooManySessions,
    /// The requested resource was not found.
    NotFound,
    /// Input validation failed.
    Validation,
    /// A conflict occurred (duplicate entry, concurrent modification, etc.).
    Conflict,
    /// A database error occurred.
    Database,
    /// A configuration error occurred.
    Configuration,
    /// A serialization/deserialization error occurred.
    Serialization,
    /// The service is temporarily unavailable.
    ServiceUnavailable,
    /// An internal server error occurred.
    Internal,
}

impl ErrorKind {
    /// Stable machine-readable code sent to clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::Expired => "EXPIRED",
            Self::Revoked => "REVOKED",
            Self::ReplayedRefreshToken => "REPLAYED_REFRESH_TOKEN",
            Self::Forbidden => "FORBIDDEN",
            Self::SlowConsumer => "SLOW_CONSUMER",
            Self::TooManySessions => "TOO_MANY_SESSIONS",
            Self::NotFound => "NOT_FOUND",
            Self::Validation => "VALIDATION",
            Self::Conflict => "CONFLICT",
            Self::Database => "DATABASE",
            Self::Configuration => "CONFIGURATION",
            Self::Serialization => "SERIALIZATION",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            Self::Internal => "INTERNAL",
        }
    }

    /// Inverse of [`Self::code`], used by clients decoding error frames.
    pub fn from_code(code: &str) -> Option<Self> {
        const ALL: [ErrorKind; 16] = [
            ErrorKind::Unauthenticated,
            ErrorKind::InvalidToken,
            ErrorKind::Expired,
            ErrorKind::Revoked,
            ErrorKind::ReplayedRefreshToken,
            ErrorKind::Forbidden,
            ErrorKind::SlowConsumer,
            ErrorKind::TooManySessions,
            ErrorKind::NotFound,
            ErrorKind::Validation,
            ErrorKind::Conflict,
            ErrorKind::Database,
            ErrorKind::Configuration,
            ErrorKind::Serialization,
            ErrorKind::ServiceUnavailable,
            ErrorKind::Internal,
        ];
        ALL.into_iter().find(|kind| kind.code() == code)
    }

    /// Whether an operation failing with this kind may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Database | Self::ServiceUnavailable)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// The unified application error used throughout ChatHub.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    /// The category of error.
    pub kind: ErrorKind,
    /// A human-readable error message.
    pub message: String,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new application error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create a new application error with an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an unauthenticated error.
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthenticated, message)
    }

    /// Create an invalid-token error.
    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidToken, message)
    }

    /// Create an expired-credential error.
    pub fn expired(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Expired, message)
    }

    /// Create a revoked-session error.
    pub fn revoked(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Revoked, message)
    }

    /// Create a replayed-refresh-token error.
    pub fn replayed_refresh_token(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ReplayedRefreshToken, message)
    }

    /// Create a forbidden error.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, message)
    }

    /// Create a slow-consumer error.
    pub fn slow_consumer(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SlowConsumer, message)
    }

    /// Create a too-many-sessions error.
    pub fn too_many_sessions(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TooManySessions, message)
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Create a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Database, message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Create a service-unavailable error.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ServiceUnavailable, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Returns `true` if this error has the given kind.
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(
            ErrorKind::Serialization,
            format!("JSON serialization error: {err}"),
            err,
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorKind::Internal, format!("I/O error: {err}"), err)
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Configuration error: {err}"),
            err,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_uses_code() {
        let err = AppError::revoked("session gone");
        assert_eq!(err.to_string(), "REVOKED: session gone");
    }

    #[test]
    fn test_code_round_trip() {
        assert_eq!(ErrorKind::from_code("EXPIRED"), Some(ErrorKind::Expired));
        assert_eq!(
            ErrorKind::from_code(ErrorKind::TooManySessions.code()),
            Some(ErrorKind::TooManySessions)
        );
        assert_eq!(ErrorKind::from_code("NOPE"), None);
    }

    #[test]
    fn test_transient_kinds() {
        assert!(ErrorKind::Database.is_transient());
        assert!(ErrorKind::ServiceUnavailable.is_transient());
        assert!(!ErrorKind::Revoked.is_transient());
        assert!(!ErrorKind::ReplayedRefreshToken.is_transient());
    }

    #[test]
    fn test_clone_drops_source() {
        let io = std::io::Error::other("disk");
        let err = AppError::from(io);
        assert!(std::error::Error::source(&err).is_some());
        let cloned = err.clone();
        assert_eq!(cloned.kind, ErrorKind::Internal);
        assert!(std::error::Error::source(&cloned).is_none());
    }
}
