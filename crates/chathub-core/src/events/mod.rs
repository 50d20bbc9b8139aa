//! Domain events fanned out to live connections.
//!
//! The set of event kinds is closed: the fan-out engine and clients can
//! match exhaustively on [`EventPayload`]. Chat events that originate from a
//! committed mutation carry the per-chat `sequence` the persistence layer
//! assigned at commit time; ephemeral events (typing, presence) carry none.

pub mod chat;
pub mod presence;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use chat::{ChatAssigned, NewMessage, ReadReceipt, Typing};
pub use presence::PresenceChange;

use crate::error::AppError;
use crate::result::AppResult;
use crate::types::{ChatId, TenantId};

/// A tenant-scoped event ready for fan-out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    /// Unique event ID.
    pub id: Uuid,
    /// Tenant the event belongs to.
    pub tenant_id: TenantId,
    /// Per-chat commit position, for sequenced kinds.
    pub sequence: Option<u64>,
    /// The event payload.
    pub payload: EventPayload,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
}

/// Union of all event kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// A message was stored in a chat.
    NewMessage(NewMessage),
    /// Messages were marked read.
    Read(ReadReceipt),
    /// A chat changed assignee.
    ChatAssigned(ChatAssigned),
    /// A participant started typing.
    TypingStart(Typing),
    /// A participant stopped typing.
    TypingStop(Typing),
    /// A user's presence changed (tenant-wide).
    Presence(PresenceChange),
}

/// Discriminant of [`EventPayload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// See [`EventPayload::NewMessage`].
    NewMessage,
    /// See [`EventPayload::Read`].
    Read,
    /// See [`EventPayload::ChatAssigned`].
    ChatAssigned,
    /// See [`EventPayload::TypingStart`].
    TypingStart,
    /// See [`EventPayload::TypingStop`].
    TypingStop,
    /// See [`EventPayload::Presence`].
    Presence,
}

impl EventKind {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewMessage => "new_message",
            Self::Read => "read",
            Self::ChatAssigned => "chat_assigned",
            Self::TypingStart => "typing_start",
            Self::TypingStop => "typing_stop",
            Self::Presence => "presence",
        }
    }

    /// Events whose loss would leave the client's view wrong until it
    /// resyncs. Non-critical events may be dropped under backpressure.
    pub fn is_critical(&self) -> bool {
        matches!(self, Self::NewMessage | Self::Read | Self::ChatAssigned)
    }

    /// Kinds that must carry a commit sequence.
    pub fn is_sequenced(&self) -> bool {
        self.is_critical()
    }
}

impl EventPayload {
    /// Discriminant.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::NewMessage(_) => EventKind::NewMessage,
            Self::Read(_) => EventKind::Read,
            Self::ChatAssigned(_) => EventKind::ChatAssigned,
            Self::TypingStart(_) => EventKind::TypingStart,
            Self::TypingStop(_) => EventKind::TypingStop,
            Self::Presence(_) => EventKind::Presence,
        }
    }

    /// Chat the event is scoped to; `None` for tenant-wide events.
    pub fn chat_id(&self) -> Option<ChatId> {
        match self {
            Self::NewMessage(e) => Some(e.chat_id),
            Self::Read(e) => Some(e.chat_id),
            Self::ChatAssigned(e) => Some(e.chat_id),
            Self::TypingStart(e) | Self::TypingStop(e) => Some(e.chat_id),
            Self::Presence(_) => None,
        }
    }
}

impl DomainEvent {
    /// Create an unsequenced event stamped now.
    pub fn new(tenant_id: TenantId, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            sequence: None,
            payload,
            timestamp: Utc::now(),
        }
    }

    /// Create an event carrying its commit sequence.
    pub fn sequenced(tenant_id: TenantId, sequence: u64, payload: EventPayload) -> Self {
        Self {
            sequence: Some(sequence),
            ..Self::new(tenant_id, payload)
        }
    }

    /// Discriminant.
    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    /// Chat scope, if any.
    pub fn chat_id(&self) -> Option<ChatId> {
        self.payload.chat_id()
    }

    /// See [`EventKind::is_critical`].
    pub fn is_critical(&self) -> bool {
        self.kind().is_critical()
    }

    /// Rejects sequenced kinds published without a sequence.
    pub fn validate(&self) -> AppResult<()> {
        let kind = self.kind();
        if kind.is_sequenced() && self.sequence.is_none() {
            return Err(AppError::validation(format!(
                "{} events must carry a commit sequence",
                kind.as_str()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PresenceStatus;
    use crate::types::{MessageId, UserId};

    fn message(chat_id: ChatId) -> EventPayload {
        EventPayload::NewMessage(NewMessage {
            chat_id,
            message_id: MessageId::new(),
            sender_id: None,
            body: serde_json::json!({"text": "hello"}),
        })
    }

    #[test]
    fn test_sequenced_kind_without_sequence_is_rejected() {
        let event = DomainEvent::new(TenantId::new(), message(ChatId::new()));
        assert!(event.validate().is_err());
        let event = DomainEvent::sequenced(TenantId::new(), 1, message(ChatId::new()));
        assert!(event.validate().is_ok());
    }

    #[test]
    fn test_presence_is_tenant_wide_and_droppable() {
        let payload = EventPayload::Presence(PresenceChange {
            user_id: UserId::new(),
            status: PresenceStatus::Away,
            last_seen: Utc::now(),
        });
        assert_eq!(payload.chat_id(), None);
        assert!(!payload.kind().is_critical());
        assert!(DomainEvent::new(TenantId::new(), payload).validate().is_ok());
    }

    #[test]
    fn test_payload_is_tagged_by_kind() {
        let chat_id = ChatId::new();
        let value = serde_json::to_value(message(chat_id)).expect("serialize");
        assert_eq!(value["type"], "new_message");
        assert_eq!(value["chat_id"], chat_id.to_string());
    }
}
