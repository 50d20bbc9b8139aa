//! Response DTOs.

use serde::{Deserialize, Serialize};

use chathub_core::models::Session;
use chathub_realtime::MetricsSnapshot;

/// Standard success response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    /// Whether the request was successful.
    pub success: bool,
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Creates a successful response.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Plain acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    /// Message.
    pub message: String,
}

/// Result of a bulk revocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevokedResponse {
    /// Sessions revoked.
    pub revoked: usize,
}

/// One entry of the device list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    /// The session (the refresh-token hash is never serialized).
    #[serde(flatten)]
    pub session: Session,
    /// Whether this is the session making the request.
    pub current: bool,
}

/// Health probe body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when the database does not answer.
    pub status: String,
    /// Crate version.
    pub version: String,
    /// Seconds since start.
    pub uptime_seconds: u64,
    /// `memory`, `connected`, `unhealthy` or `unavailable`.
    pub database: String,
    /// Refresh-token replays detected since start.
    pub replays_detected: u64,
    /// Gateway counters.
    pub realtime: MetricsSnapshot,
}
