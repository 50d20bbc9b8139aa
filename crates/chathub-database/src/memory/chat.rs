//! In-memory chat directory.

use async_trait::async_trait;
use dashmap::DashMap;

use chathub_core::models::ChatRecord;
use chathub_core::result::AppResult;
use chathub_core::traits::ChatDirectory;
use chathub_core::types::{ChatId, UserId};

/// Chat ownership table kept in a concurrent map.
///
/// The chat table itself belongs to the persistence layer; this directory is
/// populated by whoever owns chats (tests, or a sync from the REST side).
#[derive(Debug, Default)]
pub struct MemoryChatDirectory {
    chats: DashMap<ChatId, ChatRecord>,
}

impl MemoryChatDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a chat.
    pub fn upsert(&self, chat: ChatRecord) {
        self.chats.insert(chat.id, chat);
    }

    /// Change a chat's assignee. Returns `false` if the chat is unknown.
    pub fn assign(&self, chat_id: ChatId, assignee: Option<UserId>) -> bool {
        match self.chats.get_mut(&chat_id) {
            Some(mut chat) => {
                chat.assigned_user_id = assignee;
                true
            }
            None => false,
        }
    }

    /// Remove a chat.
    pub fn remove(&self, chat_id: ChatId) {
        self.chats.remove(&chat_id);
    }
}

#[async_trait]
impl ChatDirectory for MemoryChatDirectory {
    async fn find_chat(&self, chat_id: ChatId) -> AppResult<Option<ChatRecord>> {
        Ok(self.chats.get(&chat_id).map(|c| c.clone()))
    }
}
