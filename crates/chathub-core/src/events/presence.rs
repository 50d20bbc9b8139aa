//! Presence event payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::PresenceStatus;
use crate::types::UserId;

/// A user's presence changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceChange {
    /// User whose presence changed.
    pub user_id: UserId,
    /// New status.
    pub status: PresenceStatus,
    /// Last time the user was seen connected.
    pub last_seen: DateTime<Utc>,
}
