//! Messages accepted by a registry shard.

use std::sync::Arc;

use tokio::sync::oneshot;

use chathub_core::models::ChatRecord;
use chathub_core::result::AppResult;
use chathub_core::types::{ChatId, ConnectionId, SessionId, TenantId, UserId};

use crate::connection::close::CloseReason;
use crate::connection::handle::ConnectionHandle;

/// Shared connection snapshot returned to readers.
pub(crate) type Targets = Vec<Arc<ConnectionHandle>>;

/// One registry mutation or query, answered over `reply`.
#[derive(Debug)]
pub(crate) enum Command {
    Admit {
        handle: Arc<ConnectionHandle>,
        reply: oneshot::Sender<Targets>,
    },
    Join {
        connection_id: ConnectionId,
        chat: ChatRecord,
        reply: oneshot::Sender<AppResult<bool>>,
    },
    Leave {
        connection_id: ConnectionId,
        chat_id: ChatId,
        reply: oneshot::Sender<bool>,
    },
    IsJoined {
        connection_id: ConnectionId,
        chat_id: ChatId,
        reply: oneshot::Sender<bool>,
    },
    Remove {
        connection_id: ConnectionId,
        reply: oneshot::Sender<Option<Arc<ConnectionHandle>>>,
    },
    EvictSession {
        tenant_id: TenantId,
        session_id: SessionId,
        reason: CloseReason,
        reply: Option<oneshot::Sender<Targets>>,
    },
    ChatTargets {
        tenant_id: TenantId,
        chat_id: ChatId,
        reply: oneshot::Sender<Targets>,
    },
    TenantTargets {
        tenant_id: TenantId,
        reply: oneshot::Sender<Targets>,
    },
    UserConnectionCount {
        tenant_id: TenantId,
        user_id: UserId,
        reply: oneshot::Sender<usize>,
    },
    CloseAll {
        reason: CloseReason,
        reply: oneshot::Sender<usize>,
    },
    Count {
        reply: oneshot::Sender<usize>,
    },
}
