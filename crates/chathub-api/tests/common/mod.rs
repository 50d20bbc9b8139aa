#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use chathub_api::{AppState, build_router};
use chathub_auth::{IssueRequest, IssuedSession, SessionManager};
use chathub_core::config::AppConfig;
use chathub_core::models::ChatRecord;
use chathub_core::types::{ChatId, TenantId, UserId, UserRole};
use chathub_database::{MemoryChatDirectory, MemoryCredentialStore, MemoryEventLog};
use chathub_realtime::RealtimeEngine;

pub struct TestApp {
    pub state: AppState,
    pub chats: Arc<MemoryChatDirectory>,
}

pub async fn app() -> TestApp {
    let mut config = AppConfig::default();
    config.auth.jwt_secret = "api-test-secret".to_string();
    config.realtime.registry_shards = 2;
    config.realtime.fanout_workers = 2;

    let sessions = Arc::new(SessionManager::new(
        Arc::new(MemoryCredentialStore::new()),
        &config.auth,
        &config.session,
    ));
    let chats = Arc::new(MemoryChatDirectory::new());
    let realtime = RealtimeEngine::start(
        &config.realtime,
        sessions.clone(),
        chats.clone(),
        Arc::new(MemoryEventLog::new()),
    )
    .await;

    TestApp {
        state: AppState::new(Arc::new(config), sessions, realtime),
        chats,
    }
}

impl TestApp {
    pub async fn login(&self, tenant_id: TenantId, user_id: UserId, role: UserRole) -> IssuedSession {
        self.state
            .sessions
            .issue(IssueRequest {
                tenant_id,
                user_id,
                role,
                device_info: Some(serde_json::json!({ "platform": "test" })),
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

    /// Serve the router on an ephemeral port.
    pub async fn serve(&self) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = build_router(self.state.clone());
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }
}
