#![allow(dead_code)]

use std::sync::Arc;

use chathub_auth::{IssueRequest, IssuedSession, SessionManager};
use chathub_core::config::{AuthConfig, RealtimeConfig, SessionConfig};
use chathub_core::context::TenantContext;
use chathub_core::events::{DomainEvent, EventKind, EventPayload, NewMessage, Typing};
use chathub_core::models::ChatRecord;
use chathub_core::types::{ChatId, MessageId, SessionId, TenantId, UserId, UserRole};
use chathub_database::{MemoryChatDirectory, MemoryCredentialStore, MemoryEventLog};
use chathub_realtime::message::{EventEnvelope, ServerFrame};
use chathub_realtime::{ConnectionHandle, RealtimeEngine};

pub struct Harness {
    pub engine: RealtimeEngine,
    pub sessions: Arc<SessionManager>,
    pub chats: Arc<MemoryChatDirectory>,
    pub events: Arc<MemoryEventLog>,
    pub queue_capacity: usize,
}

pub fn config() -> RealtimeConfig {
    RealtimeConfig {
        registry_shards: 4,
        fanout_workers: 4,
        ..RealtimeConfig::default()
    }
}

pub async fn harness(config: RealtimeConfig) -> Harness {
    let auth = AuthConfig {
        jwt_secret: "realtime-test-secret".to_string(),
        ..AuthConfig::default()
    };
    let sessions = Arc::new(SessionManager::new(
        Arc::new(MemoryCredentialStore::new()),
        &auth,
        &SessionConfig::default(),
    ));
    let chats = Arc::new(MemoryChatDirectory::new());
    let events = Arc::new(MemoryEventLog::new());
    let engine = RealtimeEngine::start(&config, sessions.clone(), chats.clone(), events.clone()).await;
    Harness {
        engine,
        sessions,
        chats,
        events,
        queue_capacity: config.outbound_queue_capacity,
    }
}

impl Harness {
    pub async fn login(&self, tenant_id: TenantId, user_id: UserId, role: UserRole) -> IssuedSession {
        self.sessions
            .issue(IssueRequest {
                tenant_id,
                user_id,
                role,
                device_info: None,
                ip_address: None,
                user_agent: None,
            })
            .await
            .unwrap()
    }

    pub fn chat(&self, tenant_id: TenantId) -> ChatRecord {
        let chat = ChatRecord {
            id: ChatId::new(),
            tenant_id,
            assigned_user_id: None,
        };
        self.chats.upsert(chat.clone());
        chat
    }

    /// Admit a connection directly, bypassing the transport.
    pub async fn connect(&self, ctx: TenantContext) -> Arc<ConnectionHandle> {
        let handle = Arc::new(ConnectionHandle::new(ctx, self.queue_capacity));
        self.engine.registry.admit(handle.clone()).await.unwrap();
        handle
    }

    pub async fn join(&self, handle: &ConnectionHandle, chat: &ChatRecord) {
        assert!(self.engine.registry.join(handle, chat).await.unwrap());
    }
}

pub fn agent(tenant_id: TenantId) -> TenantContext {
    TenantContext {
        tenant_id,
        user_id: UserId::new(),
        role: UserRole::Agent,
        session_id: SessionId::new(),
    }
}

pub fn message(tenant_id: TenantId, chat_id: ChatId, sequence: u64) -> DomainEvent {
    DomainEvent::sequenced(
        tenant_id,
        sequence,
        EventPayload::NewMessage(NewMessage {
            chat_id,
            message_id: MessageId::new(),
            sender_id: None,
            body: serde_json::json!({ "text": format!("message {sequence}") }),
        }),
    )
}

pub fn typing(tenant_id: TenantId, chat_id: ChatId) -> DomainEvent {
    DomainEvent::new(
        tenant_id,
        EventPayload::TypingStart(Typing {
            chat_id,
            user_id: UserId::new(),
        }),
    )
}

/// Everything currently queued on `handle`, decoded.
pub async fn drain(handle: &ConnectionHandle) -> Vec<EventEnvelope> {
    let mut envelopes = Vec::new();
    while handle.pending() > 0 {
        let Some(item) = handle.next_outbound().await else {
            break;
        };
        if let Ok(ServerFrame::Event(envelope)) = serde_json::from_str(&item.text) {
            envelopes.push(envelope);
        }
    }
    envelopes
}

/// Sequences of queued message events, in delivery order.
pub async fn message_sequences(handle: &ConnectionHandle) -> Vec<u64> {
    drain(handle)
        .await
        .into_iter()
        .filter(|e| e.kind == EventKind::NewMessage)
        .filter_map(|e| e.sequence)
        .collect()
}
