//! Session: one row per issued refresh token lineage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{SessionId, TenantId, UserId, UserRole};

/// A user session as held by the credential store.
///
/// Only the one-way hash of the current refresh token is kept. Rotation
/// overwrites `refresh_token_hash` in place; the session id is stable for
/// the whole lineage, which is what access tokens and live connections
/// reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Session ID.
    pub id: SessionId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Owning user.
    pub user_id: UserId,
    /// Role captured at issue time, embedded into every access token.
    pub role: UserRole,
    /// Hex SHA-256 of the current refresh token.
    #[serde(skip_serializing, default)]
    pub refresh_token_hash: String,
    /// Client-supplied device metadata.
    pub device_info: Option<serde_json::Value>,
    /// Remote address at issue time.
    pub ip_address: Option<String>,
    /// User agent at issue time.
    pub user_agent: Option<String>,
    /// False once revoked, logged out, or swept.
    pub is_active: bool,
    /// Why the session was deactivated.
    pub revoked_reason: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Absolute expiry of the refresh lineage.
    pub expires_at: DateTime<Utc>,
    /// Last successful refresh.
    pub last_used_at: DateTime<Utc>,
}

impl Session {
    /// Whether the absolute expiry has passed at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Active and not yet expired.
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && !self.is_expired_at(now)
    }
}
