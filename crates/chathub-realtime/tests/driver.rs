//! Connection driver over in-memory transports.

mod common;

use std::convert::Infallible;
use std::time::Duration;

use futures::channel::mpsc;
use futures::{SinkExt, StreamExt};
use tokio::task::JoinHandle;

use chathub_core::events::EventKind;
use chathub_core::types::{MessageId, TenantId, UserId, UserRole};
use chathub_realtime::message::{
    ClientMessage, EventEnvelope, Handshake, ServerFrame, ServerMessage,
};
use chathub_realtime::{CloseReason, WireFrame};

use common::{Harness, config, harness, message};

struct Client {
    tx: mpsc::UnboundedSender<Result<WireFrame, Infallible>>,
    rx: mpsc::UnboundedReceiver<WireFrame>,
    task: JoinHandle<()>,
}

fn open(h: &Harness) -> Client {
    let (tx, server_rx) = mpsc::unbounded();
    let (server_tx, rx) = mpsc::unbounded();
    let driver = h.engine.driver.clone();
    let task = tokio::spawn(async move { driver.run(server_rx, server_tx).await });
    Client { tx, rx, task }
}

impl Client {
    async fn send_text(&mut self, text: String) {
        self.tx.send(Ok(WireFrame::Text(text))).await.unwrap();
    }

    async fn handshake(&mut self, token: &str) {
        let text = serde_json::to_string(&Handshake {
            token: token.to_string(),
        })
        .unwrap();
        self.send_text(text).await;
    }

    async fn send(&mut self, message: &ClientMessage) {
        self.send_text(serde_json::to_string(message).unwrap()).await;
    }

    async fn next_frame(&mut self) -> WireFrame {
        tokio::time::timeout(Duration::from_secs(60), self.rx.next())
            .await
            .expect("frame within timeout")
            .expect("transport open")
    }

    async fn next_server_frame(&mut self) -> ServerFrame {
        loop {
            match self.next_frame().await {
                WireFrame::Text(text) => return serde_json::from_str(&text).unwrap(),
                WireFrame::Ping(_) | WireFrame::Pong(_) => continue,
                other => panic!("unexpected frame {other:?}"),
            }
        }
    }

    /// Next control frame, skipping fan-out events.
    async fn next_control(&mut self) -> ServerMessage {
        loop {
            if let ServerFrame::Control(message) = self.next_server_frame().await {
                return message;
            }
        }
    }

    async fn next_event(&mut self, kind: EventKind) -> EventEnvelope {
        loop {
            if let ServerFrame::Event(envelope) = self.next_server_frame().await {
                if envelope.kind == kind {
                    return envelope;
                }
            }
        }
    }

    async fn close_code(&mut self) -> u16 {
        loop {
            match self.next_frame().await {
                WireFrame::Close(Some((code, _))) => return code,
                WireFrame::Close(None) => panic!("close without code"),
                _ => continue,
            }
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_silent_connection_is_closed_after_grace_period() {
    let h = harness(config()).await;
    let mut client = open(&h);

    assert_eq!(client.close_code().await, CloseReason::HandshakeTimeout.code());
    client.task.await.unwrap();
    assert_eq!(h.engine.metrics().handshakes_rejected, 1);
    assert_eq!(h.engine.registry.connection_count().await, 0);
}

#[tokio::test]
async fn test_invalid_token_is_unauthorized() {
    let h = harness(config()).await;
    let mut client = open(&h);
    client.handshake("not-a-jwt").await;

    match client.next_control().await {
        ServerMessage::Unauthorized { code, .. } => assert_eq!(code, "UNAUTHENTICATED"),
        other => panic!("expected unauthorized, got {other:?}"),
    }
    assert_eq!(client.close_code().await, CloseReason::Unauthenticated.code());
    client.task.await.unwrap();
}

#[tokio::test]
async fn test_malformed_handshake_is_unauthorized() {
    let h = harness(config()).await;
    let mut client = open(&h);
    client.send_text("{\"type\":\"join_chat\"}".to_string()).await;

    assert!(matches!(
        client.next_control().await,
        ServerMessage::Unauthorized { .. }
    ));
    assert_eq!(client.close_code().await, CloseReason::Unauthenticated.code());
}

#[tokio::test]
async fn test_revoked_session_cannot_handshake() {
    let h = harness(config()).await;
    let issued = h.login(TenantId::new(), UserId::new(), UserRole::Agent).await;
    h.sessions.revoke(issued.session.id, "logout").await.unwrap();

    let mut client = open(&h);
    client.handshake(&issued.tokens.access_token).await;
    match client.next_control().await {
        ServerMessage::Unauthorized { code, .. } => assert_eq!(code, "REVOKED"),
        other => panic!("expected unauthorized, got {other:?}"),
    }
    assert_eq!(client.close_code().await, CloseReason::Revoked.code());
}

#[tokio::test]
async fn test_join_receive_and_revoke() {
    let h = harness(config()).await;
    let tenant = TenantId::new();
    let chat = h.chat(tenant);
    let issued = h.login(tenant, UserId::new(), UserRole::Agent).await;

    let mut client = open(&h);
    client.handshake(&issued.tokens.access_token).await;
    match client.next_control().await {
        ServerMessage::Authenticated { session_id, .. } => {
            assert_eq!(session_id, issued.session.id)
        }
        other => panic!("expected authenticated, got {other:?}"),
    }

    client.send(&ClientMessage::JoinChat { chat_id: chat.id }).await;
    assert_eq!(
        client.next_control().await,
        ServerMessage::Joined { chat_id: chat.id }
    );

    h.engine.publish(message(tenant, chat.id, 1)).await.unwrap();
    let envelope = client.next_event(EventKind::NewMessage).await;
    assert_eq!(envelope.sequence, Some(1));
    assert_eq!(envelope.chat_id, Some(chat.id));

    h.sessions.revoke(issued.session.id, "logout").await.unwrap();
    assert_eq!(client.close_code().await, CloseReason::Revoked.code());
    client.task.await.unwrap();

    let metrics = h.engine.metrics();
    assert_eq!(metrics.connections_opened, 1);
    assert_eq!(metrics.connections_active, 0);
    assert_eq!(h.engine.registry.connection_count().await, 0);
}

#[tokio::test]
async fn test_forbidden_join_keeps_connection_open() {
    let h = harness(config()).await;
    let tenant = TenantId::new();
    let foreign_chat = h.chat(TenantId::new());
    let own_chat = h.chat(tenant);
    let issued = h.login(tenant, UserId::new(), UserRole::Agent).await;

    let mut client = open(&h);
    client.handshake(&issued.tokens.access_token).await;
    client.next_control().await;

    client
        .send(&ClientMessage::JoinChat {
            chat_id: foreign_chat.id,
        })
        .await;
    match client.next_control().await {
        ServerMessage::Error { code, .. } => assert_eq!(code, "FORBIDDEN"),
        other => panic!("expected error, got {other:?}"),
    }

    client
        .send(&ClientMessage::TypingStart {
            chat_id: own_chat.id,
        })
        .await;
    match client.next_control().await {
        ServerMessage::Error { code, .. } => assert_eq!(code, "FORBIDDEN"),
        other => panic!("expected error, got {other:?}"),
    }

    client.send(&ClientMessage::JoinChat { chat_id: own_chat.id }).await;
    assert_eq!(
        client.next_control().await,
        ServerMessage::Joined {
            chat_id: own_chat.id
        }
    );
}

#[tokio::test]
async fn test_mark_read_publishes_sequenced_receipt() {
    let h = harness(config()).await;
    let tenant = TenantId::new();
    let chat = h.chat(tenant);
    let issued = h.login(tenant, UserId::new(), UserRole::Agent).await;

    let mut client = open(&h);
    client.handshake(&issued.tokens.access_token).await;
    client.next_control().await;
    client.send(&ClientMessage::JoinChat { chat_id: chat.id }).await;
    client.next_control().await;

    let message_ids = vec![MessageId::new(), MessageId::new()];
    client
        .send(&ClientMessage::MarkRead {
            chat_id: chat.id,
            message_ids: message_ids.clone(),
        })
        .await;

    let envelope = client.next_event(EventKind::Read).await;
    assert_eq!(envelope.sequence, Some(1));
    match envelope.payload {
        chathub_core::events::EventPayload::Read(receipt) => {
            assert_eq!(receipt.message_ids, message_ids);
            assert_eq!(receipt.user_id, issued.session.user_id);
        }
        other => panic!("expected read receipt, got {other:?}"),
    }
}

#[tokio::test]
async fn test_client_close_releases_connection() {
    let h = harness(config()).await;
    let issued = h.login(TenantId::new(), UserId::new(), UserRole::Agent).await;

    let mut client = open(&h);
    client.handshake(&issued.tokens.access_token).await;
    client.next_control().await;

    client.tx.send(Ok(WireFrame::Close(None))).await.unwrap();
    assert_eq!(client.close_code().await, CloseReason::Normal.code());
    client.task.await.unwrap();
    assert_eq!(h.engine.registry.connection_count().await, 0);
}
