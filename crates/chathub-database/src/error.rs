//! Mapping of `sqlx` failures into [`AppError`].

use chathub_core::error::{AppError, ErrorKind};

/// Returns a closure that wraps a `sqlx::Error` with `context`.
///
/// Pool exhaustion and I/O failures are reported as `ServiceUnavailable`
/// so callers treat them as transient; everything else is `Database`.
pub fn map_sqlx(context: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |err| {
        let kind = match &err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                ErrorKind::ServiceUnavailable
            }
            _ => ErrorKind::Database,
        };
        AppError::with_source(kind, context, err)
    }
}
