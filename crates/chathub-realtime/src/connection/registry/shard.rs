//! Single-writer shard state.
//!
//! Each shard owns the mappings for the tenants hashed onto it and applies
//! commands one at a time, so admit/join/leave/remove/evict never race.
//! Readers receive owned snapshots and send outside the actor.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use chathub_core::error::AppError;
use chathub_core::models::ChatRecord;
use chathub_core::result::AppResult;
use chathub_core::types::{ChatId, ConnectionId, SessionId, TenantId, UserId};

use crate::connection::close::CloseReason;
use crate::connection::handle::ConnectionHandle;
use crate::metrics::RealtimeMetrics;
use crate::presence::PresenceSignal;

use super::command::{Command, Targets};

struct Entry {
    handle: Arc<ConnectionHandle>,
    joined: HashSet<ChatId>,
}

/// Limits applied at admit and join.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ShardLimits {
    pub max_connections_per_user: usize,
    pub max_joined_chats: usize,
}

pub(crate) struct Shard {
    index: usize,
    limits: ShardLimits,
    connections: HashMap<ConnectionId, Entry>,
    chats: HashMap<(TenantId, ChatId), HashSet<ConnectionId>>,
    /// Admission order per user; oldest first.
    users: HashMap<(TenantId, UserId), Vec<ConnectionId>>,
    tenants: HashMap<TenantId, HashSet<ConnectionId>>,
    presence: mpsc::UnboundedSender<PresenceSignal>,
    metrics: Arc<RealtimeMetrics>,
}

impl Shard {
    pub(crate) fn new(
        index: usize,
        limits: ShardLimits,
        presence: mpsc::UnboundedSender<PresenceSignal>,
        metrics: Arc<RealtimeMetrics>,
    ) -> Self {
        Self {
            index,
            limits,
            connections: HashMap::new(),
            chats: HashMap::new(),
            users: HashMap::new(),
            tenants: HashMap::new(),
            presence,
            metrics,
        }
    }

    /// Apply commands until every sender is dropped.
    pub(crate) async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        debug!(shard = self.index, "Registry shard started");
        while let Some(command) = rx.recv().await {
            self.apply(command);
        }
        debug!(shard = self.index, "Registry shard stopped");
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::Admit { handle, reply } => {
                let _ = reply.send(self.admit(handle));
            }
            Command::Join {
                connection_id,
                chat,
                reply,
            } => {
                let _ = reply.send(self.join(connection_id, &chat));
            }
            Command::Leave {
                connection_id,
                chat_id,
                reply,
            } => {
                let _ = reply.send(self.leave(connection_id, chat_id));
            }
            Command::IsJoined {
                connection_id,
                chat_id,
                reply,
            } => {
                let joined = self
                    .connections
                    .get(&connection_id)
                    .is_some_and(|e| e.joined.contains(&chat_id));
                let _ = reply.send(joined);
            }
            Command::Remove {
                connection_id,
                reply,
            } => {
                let _ = reply.send(self.detach(connection_id));
            }
            Command::EvictSession {
                tenant_id,
                session_id,
                reason,
                reply,
            } => {
                let evicted = self.evict_where(tenant_id, reason, |h| h.ctx.session_id == session_id);
                if !evicted.is_empty() {
                    info!(
                        tenant_id = %tenant_id,
                        session_id = %session_id,
                        count = evicted.len(),
                        "Evicted connections of revoked session"
                    );
                }
                if let Some(reply) = reply {
                    let _ = reply.send(evicted);
                }
            }
            Command::ChatTargets {
                tenant_id,
                chat_id,
                reply,
            } => {
                let _ = reply.send(self.chat_targets(tenant_id, chat_id));
            }
            Command::TenantTargets { tenant_id, reply } => {
                let _ = reply.send(self.tenant_targets(tenant_id));
            }
            Command::UserConnectionCount {
                tenant_id,
                user_id,
                reply,
            } => {
                let count = self.users.get(&(tenant_id, user_id)).map_or(0, Vec::len);
                let _ = reply.send(count);
            }
            Command::CloseAll { reason, reply } => {
                let ids: Vec<ConnectionId> = self.connections.keys().copied().collect();
                let mut closed = 0;
                for id in ids {
                    if let Some(handle) = self.detach(id) {
                        handle.close(reason);
                        closed += 1;
                    }
                }
                let _ = reply.send(closed);
            }
            Command::Count { reply } => {
                let _ = reply.send(self.connections.len());
            }
        }
    }

    /// Insert `handle`, displacing the user's oldest connections if the
    /// per-user cap is reached. Returns the displaced handles.
    fn admit(&mut self, handle: Arc<ConnectionHandle>) -> Targets {
        let ctx = handle.ctx;
        let key = (ctx.tenant_id, ctx.user_id);
        let mut replaced = Vec::new();

        if self.limits.max_connections_per_user > 0 {
            loop {
                let oldest = match self.users.get(&key) {
                    Some(ids) if ids.len() >= self.limits.max_connections_per_user => ids[0],
                    _ => break,
                };
                // Detaching a displaced connection must not announce offline.
                let Some(old) = self.detach_quiet(oldest) else {
                    break;
                };
                warn!(
                    conn_id = %old.id,
                    user_id = %ctx.user_id,
                    max = self.limits.max_connections_per_user,
                    "User at max connections, replacing oldest"
                );
                old.close(CloseReason::Replaced);
                replaced.push(old);
            }
        }

        let first_for_user = self.users.get(&key).is_none_or(Vec::is_empty);
        self.users.entry(key).or_default().push(handle.id);
        self.tenants.entry(ctx.tenant_id).or_default().insert(handle.id);
        self.connections.insert(
            handle.id,
            Entry {
                handle: Arc::clone(&handle),
                joined: HashSet::new(),
            },
        );

        if first_for_user {
            let _ = self.presence.send(PresenceSignal::Online {
                tenant_id: ctx.tenant_id,
                user_id: ctx.user_id,
            });
        }
        info!(
            conn_id = %handle.id,
            tenant_id = %ctx.tenant_id,
            user_id = %ctx.user_id,
            session_id = %ctx.session_id,
            "Connection admitted"
        );
        replaced
    }

    fn join(&mut self, connection_id: ConnectionId, chat: &ChatRecord) -> AppResult<bool> {
        let entry = self
            .connections
            .get_mut(&connection_id)
            .ok_or_else(|| AppError::not_found(format!("Connection {connection_id} not found")))?;

        if entry.handle.ctx.tenant_id != chat.tenant_id {
            return Err(AppError::forbidden(format!("Not entitled to chat {}", chat.id)));
        }
        if entry.joined.contains(&chat.id) {
            return Ok(false);
        }
        let max = self.limits.max_joined_chats;
        if max > 0 && entry.joined.len() >= max {
            return Err(AppError::validation(format!(
                "Joined chat limit ({max}) reached"
            )));
        }

        entry.joined.insert(chat.id);
        self.chats
            .entry((chat.tenant_id, chat.id))
            .or_default()
            .insert(connection_id);
        debug!(conn_id = %connection_id, chat_id = %chat.id, "Joined chat");
        Ok(true)
    }

    fn leave(&mut self, connection_id: ConnectionId, chat_id: ChatId) -> bool {
        let Some(entry) = self.connections.get_mut(&connection_id) else {
            return false;
        };
        if !entry.joined.remove(&chat_id) {
            return false;
        }
        let key = (entry.handle.ctx.tenant_id, chat_id);
        remove_member(&mut self.chats, key, connection_id);
        debug!(conn_id = %connection_id, chat_id = %chat_id, "Left chat");
        true
    }

    /// Remove every mapping of `connection_id`, announcing the user as
    /// possibly offline if it was their last connection.
    fn detach(&mut self, connection_id: ConnectionId) -> Option<Arc<ConnectionHandle>> {
        let handle = self.detach_quiet(connection_id)?;
        let key = (handle.ctx.tenant_id, handle.ctx.user_id);
        if !self.users.contains_key(&key) {
            let _ = self.presence.send(PresenceSignal::MaybeOffline {
                tenant_id: key.0,
                user_id: key.1,
            });
        }
        Some(handle)
    }

    fn detach_quiet(&mut self, connection_id: ConnectionId) -> Option<Arc<ConnectionHandle>> {
        let entry = self.connections.remove(&connection_id)?;
        let ctx = entry.handle.ctx;

        for chat_id in &entry.joined {
            remove_member(&mut self.chats, (ctx.tenant_id, *chat_id), connection_id);
        }
        remove_member(&mut self.tenants, ctx.tenant_id, connection_id);

        let key = (ctx.tenant_id, ctx.user_id);
        if let Some(ids) = self.users.get_mut(&key) {
            ids.retain(|id| *id != connection_id);
            if ids.is_empty() {
                self.users.remove(&key);
            }
        }
        Some(entry.handle)
    }

    fn evict_where(
        &mut self,
        tenant_id: TenantId,
        reason: CloseReason,
        predicate: impl Fn(&ConnectionHandle) -> bool,
    ) -> Targets {
        let ids: Vec<ConnectionId> = self
            .tenants
            .get(&tenant_id)
            .into_iter()
            .flatten()
            .filter(|id| {
                self.connections
                    .get(*id)
                    .is_some_and(|e| predicate(e.handle.as_ref()))
            })
            .copied()
            .collect();

        let mut evicted = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(handle) = self.detach(id) {
                handle.close(reason);
                evicted.push(handle);
            }
        }
        self.metrics.evicted(evicted.len());
        evicted
    }

    fn chat_targets(&self, tenant_id: TenantId, chat_id: ChatId) -> Targets {
        self.chats
            .get(&(tenant_id, chat_id))
            .into_iter()
            .flatten()
            .filter_map(|id| self.connections.get(id))
            .map(|e| Arc::clone(&e.handle))
            .collect()
    }

    fn tenant_targets(&self, tenant_id: TenantId) -> Targets {
        self.tenants
            .get(&tenant_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.connections.get(id))
            .map(|e| Arc::clone(&e.handle))
            .collect()
    }
}

fn remove_member<K: std::hash::Hash + Eq>(
    map: &mut HashMap<K, HashSet<ConnectionId>>,
    key: K,
    connection_id: ConnectionId,
) {
    if let Some(members) = map.get_mut(&key) {
        members.remove(&connection_id);
        if members.is_empty() {
            map.remove(&key);
        }
    }
}
