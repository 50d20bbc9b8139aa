//! Chat-scoped event payloads.

use serde::{Deserialize, Serialize};

use crate::types::{ChatId, MessageId, UserId};

/// A message was inserted into a chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMessage {
    /// Chat the message belongs to.
    pub chat_id: ChatId,
    /// Stored message ID.
    pub message_id: MessageId,
    /// Agent who sent it; `None` for inbound customer messages.
    pub sender_id: Option<UserId>,
    /// Message body as stored by the persistence layer.
    pub body: serde_json::Value,
}

/// Read receipt for one or more messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadReceipt {
    /// Chat ID.
    pub chat_id: ChatId,
    /// Reader.
    pub user_id: UserId,
    /// Messages marked read.
    pub message_ids: Vec<MessageId>,
}

/// Chat assignment change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatAssigned {
    /// Chat ID.
    pub chat_id: ChatId,
    /// New assignee; `None` when unassigned.
    pub assigned_user_id: Option<UserId>,
    /// Who made the change.
    pub assigned_by: Option<UserId>,
}

/// Typing indicator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Typing {
    /// Chat ID.
    pub chat_id: ChatId,
    /// Typist.
    pub user_id: UserId,
}
