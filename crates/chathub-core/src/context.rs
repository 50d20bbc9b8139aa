//! Tenant context derived from a validated access token.
//!
//! A `TenantContext` is never stored. It is produced by access-token
//! validation and passed explicitly to every operation that touches
//! tenant-scoped data: REST handlers, the connection registry, and the
//! chat entitlement check.

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::ChatRecord;
use crate::result::AppResult;
use crate::types::{SessionId, TenantId, UserId, UserRole};

/// Who is calling, inside which tenant, through which session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantContext {
    /// Tenant boundary.
    pub tenant_id: TenantId,
    /// Authenticated user.
    pub user_id: UserId,
    /// Role inside the tenant.
    pub role: UserRole,
    /// Session the credential was derived from.
    pub session_id: SessionId,
}

impl TenantContext {
    /// Fails with `Forbidden` unless `tenant_id` is this context's tenant.
    pub fn ensure_tenant(&self, tenant_id: TenantId) -> AppResult<()> {
        if self.tenant_id != tenant_id {
            return Err(AppError::forbidden("Resource belongs to another tenant"));
        }
        Ok(())
    }

    /// Chat entitlement: same tenant, a chat-handling role, and for
    /// restricted roles either assigned to the caller or unassigned.
    pub fn can_access_chat(&self, chat: &ChatRecord) -> bool {
        if chat.tenant_id != self.tenant_id || !self.role.handles_chats() {
            return false;
        }
        if self.role.is_restricted() {
            return chat
                .assigned_user_id
                .is_none_or(|assignee| assignee == self.user_id);
        }
        true
    }
}
