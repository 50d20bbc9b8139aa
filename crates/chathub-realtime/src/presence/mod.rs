//! Presence derived from registry occupancy.

pub mod tracker;

use chathub_core::types::{TenantId, UserId};

pub use tracker::PresenceTracker;

/// Occupancy transitions reported by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceSignal {
    /// The user's first live connection in the tenant was admitted.
    Online {
        /// Tenant.
        tenant_id: TenantId,
        /// User.
        user_id: UserId,
    },
    /// The user's last live connection in the tenant went away.
    MaybeOffline {
        /// Tenant.
        tenant_id: TenantId,
        /// User.
        user_id: UserId,
    },
}
