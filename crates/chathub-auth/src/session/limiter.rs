//! Session limit resolution.
//!
//! Resolution order:
//! 1. Per-role override (`session.limits.by_role`)
//! 2. Default cap (`session.limits.default_max_per_user`)
//!
//! A resolved value of `0` means unlimited.

use chathub_core::config::SessionLimitsConfig;
use chathub_core::types::{SessionLimit, UserRole};

/// Resolves the concurrent session cap for a role.
#[derive(Debug, Clone, Default)]
pub struct SessionLimiter {
    config: SessionLimitsConfig,
}

impl SessionLimiter {
    /// Creates a new limiter.
    pub fn new(config: SessionLimitsConfig) -> Self {
        Self { config }
    }

    /// Effective cap for `role`.
    pub fn resolve(&self, role: UserRole) -> SessionLimit {
        self.config
            .by_role
            .get(role.as_str())
            .copied()
            .unwrap_or(self.config.default_max_per_user)
            .into()
    }
}
