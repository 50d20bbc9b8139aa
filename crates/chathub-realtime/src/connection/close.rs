//! Application close codes.

use serde::{Deserialize, Serialize};

use chathub_core::error::{AppError, ErrorKind};

/// Why the server closed a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// Orderly close by either side.
    Normal,
    /// Handshake token missing or invalid.
    Unauthenticated,
    /// Handshake token past its TTL.
    Expired,
    /// Session no longer active.
    Revoked,
    /// Outbound queue saturated with critical events.
    SlowConsumer,
    /// Displaced by a newer connection of the same user.
    Replaced,
    /// No handshake within the grace period.
    HandshakeTimeout,
    /// No traffic within the heartbeat timeout.
    HeartbeatTimeout,
    /// The gateway is shutting down.
    ServerShutdown,
    /// Unexpected server-side failure.
    InternalError,
}

impl CloseReason {
    /// WebSocket close code.
    pub fn code(&self) -> u16 {
        match self {
            Self::Normal => 1000,
            Self::ServerShutdown => 1001,
            Self::InternalError => 1011,
            Self::Unauthenticated => 4001,
            Self::Expired => 4002,
            Self::Revoked => 4003,
            Self::SlowConsumer => 4004,
            Self::Replaced => 4005,
            Self::HandshakeTimeout => 4008,
            Self::HeartbeatTimeout => 4009,
        }
    }

    /// Reverse of [`Self::code`].
    pub fn from_code(code: u16) -> Option<Self> {
        Some(match code {
            1000 => Self::Normal,
            1001 => Self::ServerShutdown,
            1011 => Self::InternalError,
            4001 => Self::Unauthenticated,
            4002 => Self::Expired,
            4003 => Self::Revoked,
            4004 => Self::SlowConsumer,
            4005 => Self::Replaced,
            4008 => Self::HandshakeTimeout,
            4009 => Self::HeartbeatTimeout,
            _ => return None,
        })
    }

    /// Short text sent as the close reason.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Unauthenticated => "unauthenticated",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
            Self::SlowConsumer => "slow_consumer",
            Self::Replaced => "replaced",
            Self::HandshakeTimeout => "handshake_timeout",
            Self::HeartbeatTimeout => "heartbeat_timeout",
            Self::ServerShutdown => "server_shutdown",
            Self::InternalError => "internal_error",
        }
    }

    /// Close reason for a failed handshake.
    pub fn for_error(err: &AppError) -> Self {
        match err.kind {
            ErrorKind::Expired => Self::Expired,
            ErrorKind::Revoked => Self::Revoked,
            ErrorKind::SlowConsumer => Self::SlowConsumer,
            ErrorKind::ServiceUnavailable | ErrorKind::Database | ErrorKind::Internal => {
                Self::InternalError
            }
            _ => Self::Unauthenticated,
        }
    }

    /// Whether a client must not reconnect on its own.
    ///
    /// A replaced client reconnecting would displace the next-oldest
    /// connection of the same user, which would do the same in turn.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Unauthenticated | Self::Revoked | Self::Replaced)
    }
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.as_str(), self.code())
    }
}
