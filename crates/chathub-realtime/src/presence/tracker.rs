//! Presence tracker with debounced offline transitions.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use chathub_core::config::RealtimeConfig;
use chathub_core::context::TenantContext;
use chathub_core::error::AppError;
use chathub_core::events::{DomainEvent, EventPayload, PresenceChange};
use chathub_core::models::{PresenceState, PresenceStatus};
use chathub_core::result::AppResult;
use chathub_core::types::{TenantId, UserId};

use crate::connection::ConnectionRegistry;
use crate::fanout::FanoutEngine;

use super::PresenceSignal;

type UserKey = (TenantId, UserId);

/// Tracks presence for every user with a live connection.
///
/// A user goes online when their first connection is admitted. When the
/// last one goes away, the offline announcement waits for the debounce
/// window and is dropped if the user reconnected in the meantime. Once
/// offline is announced the user is forgotten.
#[derive(Debug)]
pub struct PresenceTracker {
    states: DashMap<UserKey, PresenceState>,
    /// Set on every transition; a pending offline check only fires if the
    /// generation it captured is still current.
    generations: DashMap<UserKey, u64>,
    /// Source of generations, unique across forgotten users.
    next_generation: AtomicU64,
    debounce: Duration,
    registry: Arc<ConnectionRegistry>,
    fanout: Arc<FanoutEngine>,
}

impl PresenceTracker {
    /// Create a tracker.
    pub fn new(
        config: &RealtimeConfig,
        registry: Arc<ConnectionRegistry>,
        fanout: Arc<FanoutEngine>,
    ) -> Self {
        Self {
            states: DashMap::new(),
            generations: DashMap::new(),
            next_generation: AtomicU64::new(0),
            debounce: config.offline_debounce(),
            registry,
            fanout,
        }
    }

    /// Consume registry signals until the registry goes away.
    pub fn spawn(self: &Arc<Self>, mut signals: mpsc::UnboundedReceiver<PresenceSignal>) -> JoinHandle<()> {
        let tracker = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(signal) = signals.recv().await {
                match signal {
                    PresenceSignal::Online { tenant_id, user_id } => {
                        tracker.on_online((tenant_id, user_id)).await;
                    }
                    PresenceSignal::MaybeOffline { tenant_id, user_id } => {
                        tracker.schedule_offline((tenant_id, user_id));
                    }
                }
            }
            debug!("Presence signal stream closed");
        })
    }

    /// Current presence of a user. `None` means offline.
    pub fn get(&self, tenant_id: TenantId, user_id: UserId) -> Option<PresenceState> {
        self.states.get(&(tenant_id, user_id)).map(|s| s.value().clone())
    }

    /// Explicit status update from a connected user.
    ///
    /// `offline` cannot be set explicitly; it follows from having no live
    /// connection.
    pub async fn set_status(&self, ctx: &TenantContext, status: PresenceStatus) -> AppResult<()> {
        if status == PresenceStatus::Offline {
            return Err(AppError::validation(
                "Offline is derived from connection state and cannot be set",
            ));
        }
        let key = (ctx.tenant_id, ctx.user_id);
        if self.transition(key, status) {
            self.announce(key).await;
        }
        Ok(())
    }

    async fn on_online(&self, key: UserKey) {
        self.bump(key);
        let was_offline = self
            .states
            .get(&key)
            .is_none_or(|s| s.status == PresenceStatus::Offline);
        if was_offline {
            self.transition(key, PresenceStatus::Online);
            info!(tenant_id = %key.0, user_id = %key.1, "User online");
            self.announce(key).await;
        } else if let Some(mut state) = self.states.get_mut(&key) {
            state.last_seen = Utc::now();
        }
    }

    fn schedule_offline(self: &Arc<Self>, key: UserKey) {
        let generation = self.bump(key);
        let tracker = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(tracker.debounce).await;
            tracker.settle_offline(key, generation).await;
        });
    }

    async fn settle_offline(&self, key: UserKey, generation: u64) {
        if self.generations.get(&key).map(|g| *g) != Some(generation) {
            return;
        }
        match self.registry.user_connection_count(key.0, key.1).await {
            Ok(0) => {
                if self.transition(key, PresenceStatus::Offline) {
                    info!(tenant_id = %key.0, user_id = %key.1, "User offline");
                    self.announce(key).await;
                }
                self.forget(key, generation);
            }
            Ok(_) => {}
            Err(e) => warn!(user_id = %key.1, error = %e, "Presence offline check failed"),
        }
    }

    fn bump(&self, key: UserKey) -> u64 {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        self.generations.insert(key, generation);
        generation
    }

    /// Drop an offline user unless they came back since `generation`.
    fn forget(&self, key: UserKey, generation: u64) {
        if self
            .generations
            .remove_if(&key, |_, current| *current == generation)
            .is_some()
        {
            self.states
                .remove_if(&key, |_, state| state.status == PresenceStatus::Offline);
        }
    }

    /// Record `status`; returns whether it changed.
    fn transition(&self, key: UserKey, status: PresenceStatus) -> bool {
        let now = Utc::now();
        let mut state = self.states.entry(key).or_insert_with(|| PresenceState {
            user_id: key.1,
            tenant_id: key.0,
            status: PresenceStatus::Offline,
            last_seen: now,
        });
        state.last_seen = now;
        if state.status == status {
            return false;
        }
        state.status = status;
        true
    }

    async fn announce(&self, key: UserKey) {
        let Some(state) = self.get(key.0, key.1) else {
            return;
        };
        let event = DomainEvent::new(
            key.0,
            EventPayload::Presence(PresenceChange {
                user_id: state.user_id,
                status: state.status,
                last_seen: state.last_seen,
            }),
        );
        if let Err(e) = self.fanout.publish(event).await {
            warn!(user_id = %key.1, error = %e, "Failed to publish presence change");
        }
    }
}
