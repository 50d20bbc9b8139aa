//! Observer hook for session revocation.

use crate::models::Session;

/// Notified synchronously after a session leaves the active state.
///
/// Implementations must not block; the connection registry forwards the
/// notification to its shard actors and returns.
pub trait SessionRevocationListener: Send + Sync + 'static {
    /// Called once per revoked session.
    fn on_session_revoked(&self, session: &Session);
}
