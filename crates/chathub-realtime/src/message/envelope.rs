//! Event envelope pushed to clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use chathub_core::events::{DomainEvent, EventKind, EventPayload};
use chathub_core::types::ChatId;

/// `{type, chat_id?, payload, sequence?, timestamp}` as seen by clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Event kind.
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Event ID.
    pub id: Uuid,
    /// Chat scope, absent for tenant-wide events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<ChatId>,
    /// Typed payload.
    pub payload: EventPayload,
    /// Per-chat commit position, for sequenced kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
}

impl EventEnvelope {
    /// Wraps a domain event. The tenant is implied by the connection.
    pub fn from_event(event: &DomainEvent) -> Self {
        Self {
            kind: event.kind(),
            id: event.id,
            chat_id: event.chat_id(),
            payload: event.payload.clone(),
            sequence: event.sequence,
            timestamp: event.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chathub_core::events::NewMessage;
    use chathub_core::types::{MessageId, TenantId};

    #[test]
    fn test_envelope_shape() {
        let chat_id = ChatId::new();
        let event = DomainEvent::sequenced(
            TenantId::new(),
            5,
            EventPayload::NewMessage(NewMessage {
                chat_id,
                message_id: MessageId::new(),
                sender_id: None,
                body: serde_json::json!({"text": "hi"}),
            }),
        );
        let value = serde_json::to_value(EventEnvelope::from_event(&event)).unwrap();
        assert_eq!(value["type"], "new_message");
        assert_eq!(value["sequence"], 5);
        assert_eq!(value["chat_id"], chat_id.to_string());
        assert!(value.get("tenant_id").is_none());
    }
}
