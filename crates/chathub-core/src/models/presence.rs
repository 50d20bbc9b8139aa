//! Presence state derived from registry occupancy plus explicit updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::types::{TenantId, UserId};

/// User presence status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
    /// At least one live connection.
    Online,
    /// Connected, marked away.
    Away,
    /// Connected, do not disturb.
    Busy,
    /// No live connection.
    Offline,
}

impl PresenceStatus {
    /// Converts to string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Away => "away",
            Self::Busy => "busy",
            Self::Offline => "offline",
        }
    }
}

impl std::str::FromStr for PresenceStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "online" => Ok(Self::Online),
            "away" => Ok(Self::Away),
            "busy" => Ok(Self::Busy),
            "offline" => Ok(Self::Offline),
            other => Err(AppError::validation(format!("Unknown presence status: {other}"))),
        }
    }
}

/// Current presence of one user in one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceState {
    /// User ID.
    pub user_id: UserId,
    /// Tenant ID.
    pub tenant_id: TenantId,
    /// Status.
    pub status: PresenceStatus,
    /// Last time the user was seen connected.
    pub last_seen: DateTime<Utc>,
}
