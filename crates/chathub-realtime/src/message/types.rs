//! Client and server message definitions.
//!
//! All frames are JSON text. The first client frame is always a bare
//! [`Handshake`]; every later client frame is a [`ClientMessage`] tagged by
//! `type`. The server sends either a [`ServerMessage`] (control) or an
//! [`EventEnvelope`](super::EventEnvelope) (fan-out).

use serde::{Deserialize, Serialize};

use chathub_core::error::AppError;
use chathub_core::models::PresenceStatus;
use chathub_core::types::{ChatId, ConnectionId, MessageId, SessionId, TenantId, UserId};

use super::envelope::EventEnvelope;

/// First frame after connect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handshake {
    /// Access token.
    pub token: String,
}

/// Frames sent by an authenticated client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Start receiving a chat's events.
    JoinChat {
        /// Chat ID.
        chat_id: ChatId,
    },
    /// Stop receiving a chat's events.
    LeaveChat {
        /// Chat ID.
        chat_id: ChatId,
    },
    /// The user started typing.
    TypingStart {
        /// Chat ID.
        chat_id: ChatId,
    },
    /// The user stopped typing.
    TypingStop {
        /// Chat ID.
        chat_id: ChatId,
    },
    /// Mark messages read.
    MarkRead {
        /// Chat ID.
        chat_id: ChatId,
        /// Messages read.
        message_ids: Vec<MessageId>,
    },
    /// Set an explicit presence status.
    UpdatePresence {
        /// New status.
        status: PresenceStatus,
    },
}

/// Control frames sent by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Handshake accepted.
    Authenticated {
        /// Connection ID.
        connection_id: ConnectionId,
        /// Tenant.
        tenant_id: TenantId,
        /// User.
        user_id: UserId,
        /// Session.
        session_id: SessionId,
    },
    /// Handshake rejected; the connection closes next.
    Unauthorized {
        /// Error code (`UNAUTHENTICATED`, `EXPIRED`, `REVOKED`, ...).
        code: String,
        /// Description.
        message: String,
    },
    /// Join accepted.
    Joined {
        /// Chat ID.
        chat_id: ChatId,
    },
    /// Leave processed.
    Left {
        /// Chat ID.
        chat_id: ChatId,
    },
    /// A request failed; the connection stays open.
    Error {
        /// Error code.
        code: String,
        /// Description.
        message: String,
    },
}

impl ServerMessage {
    /// Handshake rejection for `err`.
    pub fn unauthorized(err: &AppError) -> Self {
        Self::Unauthorized {
            code: err.kind.code().to_string(),
            message: err.message.clone(),
        }
    }

    /// Request failure for `err`.
    pub fn error(err: &AppError) -> Self {
        Self::Error {
            code: err.kind.code().to_string(),
            message: err.message.clone(),
        }
    }
}

/// Anything the server may send, as decoded by clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerFrame {
    /// Control frame.
    Control(ServerMessage),
    /// Fan-out event.
    Event(EventEnvelope),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chathub_core::events::{DomainEvent, EventPayload, Typing};

    #[test]
    fn test_client_message_wire_names() {
        let chat_id = ChatId::new();
        let msg: ClientMessage = serde_json::from_value(serde_json::json!({
            "type": "join_chat",
            "chat_id": chat_id,
        }))
        .unwrap();
        assert_eq!(msg, ClientMessage::JoinChat { chat_id });

        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"update_presence","status":"away"}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ClientMessage::UpdatePresence {
                status: PresenceStatus::Away
            }
        );
    }

    #[test]
    fn test_server_frame_distinguishes_control_and_event() {
        let joined = serde_json::to_string(&ServerMessage::Joined {
            chat_id: ChatId::new(),
        })
        .unwrap();
        assert!(matches!(
            serde_json::from_str::<ServerFrame>(&joined).unwrap(),
            ServerFrame::Control(ServerMessage::Joined { .. })
        ));

        let event = DomainEvent::new(
            TenantId::new(),
            EventPayload::TypingStart(Typing {
                chat_id: ChatId::new(),
                user_id: UserId::new(),
            }),
        );
        let text = serde_json::to_string(&EventEnvelope::from_event(&event)).unwrap();
        match serde_json::from_str::<ServerFrame>(&text).unwrap() {
            ServerFrame::Event(envelope) => assert_eq!(envelope.payload, event.payload),
            other => panic!("expected event, got {other:?}"),
        }
    }
}
