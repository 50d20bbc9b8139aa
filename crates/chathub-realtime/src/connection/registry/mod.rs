//! Tenant-sharded connection registry.
//!
//! Tenants hash onto a fixed set of shard actors. Every mutation for a
//! tenant goes through its shard's command channel, so the connection,
//! chat, and user mappings are only ever touched by one task. Fan-out
//! reads get an owned snapshot of the target handles and enqueue onto them
//! without holding anything inside the shard.

mod command;
mod shard;

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use chathub_core::config::RealtimeConfig;
use chathub_core::error::AppError;
use chathub_core::models::{ChatRecord, Session};
use chathub_core::result::AppResult;
use chathub_core::traits::SessionRevocationListener;
use chathub_core::types::{ChatId, SessionId, TenantId, UserId};

use crate::metrics::RealtimeMetrics;
use crate::presence::PresenceSignal;

use self::command::{Command, Targets};
use self::shard::{Shard, ShardLimits};

use super::close::CloseReason;
use super::handle::ConnectionHandle;

/// Front end of the shard actors.
#[derive(Debug)]
pub struct ConnectionRegistry {
    shards: Vec<mpsc::UnboundedSender<Command>>,
}

impl ConnectionRegistry {
    /// Spawn one actor per configured shard.
    ///
    /// Presence transitions (first connection of a user, last connection
    /// gone) are reported on `presence`.
    pub fn new(
        config: &RealtimeConfig,
        presence: mpsc::UnboundedSender<PresenceSignal>,
        metrics: Arc<RealtimeMetrics>,
    ) -> Self {
        let limits = ShardLimits {
            max_connections_per_user: config.max_connections_per_user,
            max_joined_chats: config.max_joined_chats,
        };
        let shards = (0..config.registry_shards.max(1))
            .map(|index| {
                let (tx, rx) = mpsc::unbounded_channel();
                let shard = Shard::new(index, limits, presence.clone(), Arc::clone(&metrics));
                tokio::spawn(shard.run(rx));
                tx
            })
            .collect();
        Self { shards }
    }

    fn shard(&self, tenant_id: TenantId) -> &mpsc::UnboundedSender<Command> {
        &self.shards[tenant_id.shard(self.shards.len())]
    }

    async fn request<T>(
        &self,
        tenant_id: TenantId,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> AppResult<T> {
        let (tx, rx) = oneshot::channel();
        self.shard(tenant_id)
            .send(command(tx))
            .map_err(|_| shard_stopped())?;
        rx.await.map_err(|_| shard_stopped())
    }

    /// Register a connection whose context was validated beforehand.
    ///
    /// Returns connections displaced by the per-user cap; they are already
    /// closed with [`CloseReason::Replaced`] and detached.
    pub async fn admit(&self, handle: Arc<ConnectionHandle>) -> AppResult<Vec<Arc<ConnectionHandle>>> {
        let tenant_id = handle.ctx.tenant_id;
        self.request(tenant_id, |reply| Command::Admit { handle, reply })
            .await
    }

    /// Add the connection to `chat`'s delivery set.
    ///
    /// `chat` must come from an entitlement check against the caller's
    /// context; the registry only re-checks the tenant. Returns `false` if
    /// already joined.
    pub async fn join(&self, handle: &ConnectionHandle, chat: &ChatRecord) -> AppResult<bool> {
        let chat = chat.clone();
        let connection_id = handle.id;
        self.request(handle.ctx.tenant_id, |reply| Command::Join {
            connection_id,
            chat,
            reply,
        })
        .await?
    }

    /// Remove the connection from `chat_id`'s delivery set.
    pub async fn leave(&self, handle: &ConnectionHandle, chat_id: ChatId) -> AppResult<bool> {
        let connection_id = handle.id;
        self.request(handle.ctx.tenant_id, |reply| Command::Leave {
            connection_id,
            chat_id,
            reply,
        })
        .await
    }

    /// Whether the connection is currently joined to `chat_id`.
    pub async fn is_joined(&self, handle: &ConnectionHandle, chat_id: ChatId) -> AppResult<bool> {
        let connection_id = handle.id;
        self.request(handle.ctx.tenant_id, |reply| Command::IsJoined {
            connection_id,
            chat_id,
            reply,
        })
        .await
    }

    /// Drop every mapping of a disconnected connection.
    pub async fn remove(&self, handle: &ConnectionHandle) -> AppResult<bool> {
        let connection_id = handle.id;
        let removed = self
            .request(handle.ctx.tenant_id, |reply| Command::Remove {
                connection_id,
                reply,
            })
            .await?;
        Ok(removed.is_some())
    }

    /// Close and detach every connection derived from `session_id`.
    pub async fn evict_session(
        &self,
        tenant_id: TenantId,
        session_id: SessionId,
        reason: CloseReason,
    ) -> AppResult<Vec<Arc<ConnectionHandle>>> {
        self.request(tenant_id, |reply| Command::EvictSession {
            tenant_id,
            session_id,
            reason,
            reply: Some(reply),
        })
        .await
    }

    /// Snapshot of connections joined to a chat.
    pub async fn chat_targets(&self, tenant_id: TenantId, chat_id: ChatId) -> AppResult<Targets> {
        self.request(tenant_id, |reply| Command::ChatTargets {
            tenant_id,
            chat_id,
            reply,
        })
        .await
    }

    /// Snapshot of every connection in a tenant.
    pub async fn tenant_targets(&self, tenant_id: TenantId) -> AppResult<Targets> {
        self.request(tenant_id, |reply| Command::TenantTargets { tenant_id, reply })
            .await
    }

    /// Live connections of one user.
    pub async fn user_connection_count(&self, tenant_id: TenantId, user_id: UserId) -> AppResult<usize> {
        self.request(tenant_id, |reply| Command::UserConnectionCount {
            tenant_id,
            user_id,
            reply,
        })
        .await
    }

    /// Close every connection on every shard.
    pub async fn close_all(&self, reason: CloseReason) -> usize {
        let mut closed = 0;
        for shard in &self.shards {
            let (tx, rx) = oneshot::channel();
            if shard.send(Command::CloseAll { reason, reply: tx }).is_ok() {
                closed += rx.await.unwrap_or(0);
            }
        }
        closed
    }

    /// Total live connections.
    pub async fn connection_count(&self) -> usize {
        let mut total = 0;
        for shard in &self.shards {
            let (tx, rx) = oneshot::channel();
            if shard.send(Command::Count { reply: tx }).is_ok() {
                total += rx.await.unwrap_or(0);
            }
        }
        total
    }
}

impl SessionRevocationListener for ConnectionRegistry {
    fn on_session_revoked(&self, session: &Session) {
        let command = Command::EvictSession {
            tenant_id: session.tenant_id,
            session_id: session.id,
            reason: CloseReason::Revoked,
            reply: None,
        };
        if self.shard(session.tenant_id).send(command).is_err() {
            warn!(session_id = %session.id, "Registry stopped; revoked session not evicted");
        }
    }
}

fn shard_stopped() -> AppError {
    AppError::service_unavailable("Connection registry shard stopped")
}
