//! The gateway client against a live axum server.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;

use chathub_core::config::ReconnectConfig;
use chathub_core::error::{AppError, ErrorKind};
use chathub_core::events::{DomainEvent, EventPayload, NewMessage};
use chathub_core::result::AppResult;
use chathub_core::types::{MessageId, TenantId, UserId, UserRole};
use chathub_realtime::message::{ClientMessage, ServerFrame, ServerMessage};
use chathub_realtime::{
    CloseReason, ConnectionState, GatewayClient, GatewayConnection, TokenSource,
};

struct FixedToken(String);

#[async_trait]
impl TokenSource for FixedToken {
    async fn access_token(&self) -> AppResult<String> {
        Ok(self.0.clone())
    }

    async fn refresh(&self) -> AppResult<String> {
        Err(AppError::invalid_token("no refresh token in this test"))
    }
}

fn client(url: String, token: &str) -> GatewayClient {
    let config = ReconnectConfig {
        base_delay_ms: 1,
        max_attempts: 2,
    };
    GatewayClient::new(url, Arc::new(FixedToken(token.to_string())), &config)
}

async fn next(connection: &mut GatewayConnection) -> Option<ServerFrame> {
    timeout(Duration::from_secs(5), connection.next_frame())
        .await
        .expect("frame within 5s")
        .map(|frame| frame.unwrap())
}

#[tokio::test]
async fn test_join_receive_and_logout_closes_socket() {
    let app = common::app().await;
    let addr = app.serve().await;
    let tenant = TenantId::new();
    let issued = app.login(tenant, UserId::new(), UserRole::Admin).await;
    let chat = app.chat(tenant);

    let mut client = client(format!("ws://{addr}/ws"), &issued.tokens.access_token);
    let mut connection = client.connect().await.unwrap();
    assert_eq!(client.state(), ConnectionState::Connected);
    assert_eq!(connection.session_id, issued.session.id);

    connection
        .send(&ClientMessage::JoinChat { chat_id: chat.id })
        .await
        .unwrap();
    assert_eq!(
        next(&mut connection).await,
        Some(ServerFrame::Control(ServerMessage::Joined { chat_id: chat.id }))
    );

    let event = DomainEvent::sequenced(
        tenant,
        7,
        EventPayload::NewMessage(NewMessage {
            chat_id: chat.id,
            message_id: MessageId::new(),
            sender_id: None,
            body: serde_json::json!({ "text": "hello" }),
        }),
    );
    app.state.realtime.publish(event).await.unwrap();
    match next(&mut connection).await {
        Some(ServerFrame::Event(envelope)) => {
            assert_eq!(envelope.chat_id, Some(chat.id));
            assert_eq!(envelope.sequence, Some(7));
        }
        other => panic!("expected event, got {other:?}"),
    }

    assert!(
        app.state
            .sessions
            .revoke(issued.session.id, "logout")
            .await
            .unwrap()
    );
    assert_eq!(next(&mut connection).await, None);
    assert_eq!(connection.close_code(), Some(CloseReason::Revoked.code()));
}

#[tokio::test]
async fn test_invalid_token_is_terminal() {
    let app = common::app().await;
    let addr = app.serve().await;

    let mut client = client(format!("ws://{addr}/ws"), "not-a-jwt");
    let err = client.connect().await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Unauthenticated);
    assert_eq!(client.state(), ConnectionState::Failed);
}

#[tokio::test]
async fn test_revoked_session_cannot_handshake() {
    let app = common::app().await;
    let addr = app.serve().await;
    let issued = app.login(TenantId::new(), UserId::new(), UserRole::Agent).await;
    app.state
        .sessions
        .revoke(issued.session.id, "logout")
        .await
        .unwrap();

    let client = client(format!("ws://{addr}/ws"), &issued.tokens.access_token);
    let err = client
        .connect_once(&issued.tokens.access_token)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Revoked);
}

#[tokio::test]
async fn test_unreachable_gateway_exhausts_attempts() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut client = client(format!("ws://{addr}/ws"), "irrelevant");
    let err = client.connect().await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::ServiceUnavailable);
    assert_eq!(client.state(), ConnectionState::Failed);
}
