//! Real-time gateway configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Real-time (WebSocket) gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Number of single-writer registry shards tenants are hashed onto.
    #[serde(default = "default_registry_shards")]
    pub registry_shards: usize,
    /// Number of fan-out worker tasks chats are hashed onto.
    #[serde(default = "default_fanout_workers")]
    pub fanout_workers: usize,
    /// Buffered dispatches per fan-out worker.
    #[serde(default = "default_fanout_queue")]
    pub fanout_queue_capacity: usize,
    /// Capacity of each connection's outbound queue.
    #[serde(default = "default_outbound_capacity")]
    pub outbound_queue_capacity: usize,
    /// Seconds a fresh connection has to complete the handshake.
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_seconds: u64,
    /// Delay before a user's last disconnect is announced as offline.
    #[serde(default = "default_offline_debounce")]
    pub offline_debounce_ms: u64,
    /// WebSocket ping interval in seconds.
    #[serde(default = "default_ping_interval")]
    pub ping_interval_seconds: u64,
    /// Seconds without any client traffic before the connection is dropped.
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout_seconds: u64,
    /// Maximum live connections per user per tenant (0 = unlimited).
    #[serde(default = "default_max_connections_per_user")]
    pub max_connections_per_user: usize,
    /// Maximum chats a single connection may join. 0 means unlimited.
    #[serde(default = "default_max_joined_chats")]
    pub max_joined_chats: usize,
    /// Sequenced events held per chat while waiting for a gap to fill.
    #[serde(default = "default_reorder_window")]
    pub reorder_window: usize,
    /// How long a sequence gap is waited on before releasing held events.
    #[serde(default = "default_reorder_timeout")]
    pub reorder_timeout_ms: u64,
    /// Seconds a chat's reorder gate may sit empty before it is dropped.
    #[serde(default = "default_reorder_idle")]
    pub reorder_idle_seconds: u64,
    /// Client reconnection schedule.
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            registry_shards: default_registry_shards(),
            fanout_workers: default_fanout_workers(),
            fanout_queue_capacity: default_fanout_queue(),
            outbound_queue_capacity: default_outbound_capacity(),
            handshake_timeout_seconds: default_handshake_timeout(),
            offline_debounce_ms: default_offline_debounce(),
            ping_interval_seconds: default_ping_interval(),
            ping_timeout_seconds: default_ping_timeout(),
            max_connections_per_user: default_max_connections_per_user(),
            max_joined_chats: default_max_joined_chats(),
            reorder_window: default_reorder_window(),
            reorder_timeout_ms: default_reorder_timeout(),
            reorder_idle_seconds: default_reorder_idle(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl RealtimeConfig {
    /// Handshake grace period.
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_seconds)
    }

    /// Offline announcement debounce window.
    pub fn offline_debounce(&self) -> Duration {
        Duration::from_millis(self.offline_debounce_ms)
    }

    /// Gap wait for the per-chat reorder gate.
    pub fn reorder_timeout(&self) -> Duration {
        Duration::from_millis(self.reorder_timeout_ms)
    }

    /// Idle period after which an empty reorder gate is dropped.
    pub fn reorder_idle(&self) -> Duration {
        Duration::from_secs(self.reorder_idle_seconds.max(1))
    }
}

/// Exponential backoff schedule used by reconnecting clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Delay before the first reconnect attempt, in milliseconds.
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,
    /// Attempts made before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_registry_shards() -> usize {
    16
}

fn default_fanout_workers() -> usize {
    8
}

fn default_fanout_queue() -> usize {
    1024
}

fn default_outbound_capacity() -> usize {
    50
}

fn default_handshake_timeout() -> u64 {
    10
}

fn default_offline_debounce() -> u64 {
    3000
}

fn default_ping_interval() -> u64 {
    30
}

fn default_ping_timeout() -> u64 {
    90
}

fn default_max_connections_per_user() -> usize {
    10
}

fn default_max_joined_chats() -> usize {
    500
}

fn default_reorder_window() -> usize {
    64
}

fn default_reorder_timeout() -> u64 {
    250
}

fn default_reorder_idle() -> u64 {
    300
}

fn default_base_delay() -> u64 {
    1000
}

fn default_max_attempts() -> u32 {
    5
}
