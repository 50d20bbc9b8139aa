//! JWT claims carried by every access token.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use chathub_core::context::TenantContext;
use chathub_core::types::{SessionId, TenantId, UserId, UserRole};

/// Access token payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user ID.
    pub sub: UserId,
    /// Tenant the token is scoped to.
    pub tid: TenantId,
    /// Session the token was issued from.
    pub sid: SessionId,
    /// Role captured on the session.
    pub role: UserRole,
    /// Issued-at (seconds since epoch).
    pub iat: i64,
    /// Expiry (seconds since epoch).
    pub exp: i64,
    /// Token ID.
    pub jti: Uuid,
    /// Issuer.
    pub iss: String,
}

impl Claims {
    /// Expiry as a timestamp.
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// The tenant context these claims describe.
    pub fn context(&self) -> TenantContext {
        TenantContext {
            tenant_id: self.tid,
            user_id: self.sub,
            role: self.role,
            session_id: self.sid,
        }
    }
}
