//! Product roles and the chat entitlement rule derived from them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Role of a user inside one tenant. Ordered from least to most privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Read-only seat; never receives conversation traffic.
    Viewer,
    /// Handles conversations assigned to them (or unassigned).
    Agent,
    /// Sees every conversation of the tenant.
    Admin,
    /// Tenant owner.
    Owner,
}

impl UserRole {
    /// Minimum role that may receive chat events at all.
    pub const CHAT_HANDLER: UserRole = UserRole::Agent;

    /// Whether this role may receive chat events.
    pub fn handles_chats(&self) -> bool {
        *self >= Self::CHAT_HANDLER
    }

    /// Whether chat visibility is narrowed by assignment.
    pub fn is_restricted(&self) -> bool {
        *self == Self::Agent
    }

    /// Lowercase role name as used in configuration and storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Agent => "agent",
            Self::Admin => "admin",
            Self::Owner => "owner",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "viewer" => Ok(Self::Viewer),
            "agent" => Ok(Self::Agent),
            "admin" => Ok(Self::Admin),
            "owner" => Ok(Self::Owner),
            other => Err(AppError::validation(format!("Unknown role: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering() {
        assert!(UserRole::Viewer < UserRole::Agent);
        assert!(UserRole::Agent < UserRole::Admin);
        assert!(UserRole::Admin < UserRole::Owner);
    }

    #[test]
    fn test_chat_handling() {
        assert!(!UserRole::Viewer.handles_chats());
        assert!(UserRole::Agent.handles_chats());
        assert!(UserRole::Agent.is_restricted());
        assert!(!UserRole::Owner.is_restricted());
    }

    #[test]
    fn test_parse_roundtrip() {
        for role in [UserRole::Viewer, UserRole::Agent, UserRole::Admin, UserRole::Owner] {
            assert_eq!(role.as_str().parse::<UserRole>().expect("parse"), role);
        }
        assert!("root".parse::<UserRole>().is_err());
    }
}
