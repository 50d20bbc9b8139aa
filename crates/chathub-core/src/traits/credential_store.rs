//! Durable session storage.
//!
//! The store is the only place where session state lives; every other
//! component reads through it (possibly via a short-lived cache). The
//! mutating operations are atomic with respect to each other: a cap check
//! and the insert that follows it cannot interleave with a concurrent
//! issue, and a refresh rotation is a compare-and-swap on the stored hash.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::Session;
use crate::result::AppResult;
use crate::types::{SessionId, SessionLimit, TenantId, UserId};

/// Result of an atomic refresh-token rotation.
#[derive(Debug, Clone, PartialEq)]
pub enum RotationOutcome {
    /// The presented hash was current; the session now stores the new hash.
    Rotated(Session),
    /// The presented hash was current once but has since been rotated away.
    Replayed(Session),
    /// The presented hash is current but the session is past its expiry.
    Expired(Session),
    /// The presented hash matches no active session.
    Unknown,
}

/// Persistence seam for sessions.
#[async_trait]
pub trait CredentialStore: Send + Sync + 'static {
    /// Insert a new session if the user holds fewer active sessions than
    /// `limit` allows. Fails with `TooManySessions` otherwise.
    async fn create(&self, session: &Session, limit: SessionLimit) -> AppResult<Session>;

    /// Find a session by ID regardless of state.
    async fn find_by_id(&self, id: SessionId) -> AppResult<Option<Session>>;

    /// List the user's active, unexpired sessions, newest first.
    async fn find_active_by_user(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Session>>;

    /// Swap `presented_hash` for `new_hash` on the owning session.
    ///
    /// Exactly one of any number of concurrent callers presenting the same
    /// hash observes `Rotated`; the rest observe `Replayed`.
    async fn rotate_refresh_token(
        &self,
        presented_hash: &str,
        new_hash: &str,
        now: DateTime<Utc>,
    ) -> AppResult<RotationOutcome>;

    /// Mark a session inactive. Returns the session if it was active.
    async fn deactivate(&self, id: SessionId, reason: &str) -> AppResult<Option<Session>>;

    /// Mark every active session of a user inactive. Returns the sessions
    /// that changed state.
    async fn deactivate_user(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        reason: &str,
    ) -> AppResult<Vec<Session>>;

    /// Deactivate (or delete, if `hard_delete`) sessions past `expires_at`.
    /// Returns the sessions that were still marked active.
    async fn sweep_expired(&self, now: DateTime<Utc>, hard_delete: bool)
    -> AppResult<Vec<Session>>;
}
