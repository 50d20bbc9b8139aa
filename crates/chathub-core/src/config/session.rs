//! Session management configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Session management configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Concurrent session limits.
    #[serde(default)]
    pub limits: SessionLimitsConfig,
    /// How long a positive/negative "session is active" lookup is cached.
    #[serde(default = "default_cache_ttl")]
    pub active_cache_ttl_seconds: u64,
    /// Maximum number of cached session-active lookups.
    #[serde(default = "default_cache_capacity")]
    pub active_cache_capacity: u64,
    /// Attempts made against the credential store on transient failure.
    #[serde(default = "default_retry_attempts")]
    pub store_retry_attempts: u32,
    /// Base delay between store retries in milliseconds (doubles per attempt).
    #[serde(default = "default_retry_base")]
    pub store_retry_base_ms: u64,
    /// Cron expression (with seconds) for the expired-session sweep.
    #[serde(default = "default_sweep_cron")]
    pub sweep_cron: String,
    /// Delete expired rows instead of marking them inactive.
    #[serde(default)]
    pub hard_delete_expired: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            limits: SessionLimitsConfig::default(),
            active_cache_ttl_seconds: default_cache_ttl(),
            active_cache_capacity: default_cache_capacity(),
            store_retry_attempts: default_retry_attempts(),
            store_retry_base_ms: default_retry_base(),
            sweep_cron: default_sweep_cron(),
            hard_delete_expired: false,
        }
    }
}

/// Concurrent session limits configuration.
///
/// A value of `0` means unlimited.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionLimitsConfig {
    /// Cap applied to roles without an explicit override.
    #[serde(default)]
    pub default_max_per_user: u32,
    /// Per-role session caps. Key is the role name.
    #[serde(default)]
    pub by_role: HashMap<String, u32>,
}

fn default_cache_ttl() -> u64 {
    5
}

fn default_cache_capacity() -> u64 {
    100_000
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_base() -> u64 {
    50
}

fn default_sweep_cron() -> String {
    "0 * * * * *".to_string()
}
