//! Chat ownership record as seen by the gateway.

use serde::{Deserialize, Serialize};

use crate::types::{ChatId, TenantId, UserId};

/// The slice of a chat row the gateway needs to decide entitlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRecord {
    /// Chat ID.
    pub id: ChatId,
    /// Tenant the chat belongs to.
    pub tenant_id: TenantId,
    /// Agent the chat is assigned to, if any.
    pub assigned_user_id: Option<UserId>,
}
