//! Chat ownership and assignment lookup.

use async_trait::async_trait;

use crate::context::TenantContext;
use crate::error::AppError;
use crate::models::ChatRecord;
use crate::result::AppResult;
use crate::types::ChatId;

/// Read-only view of the externally owned chat table.
#[async_trait]
pub trait ChatDirectory: Send + Sync + 'static {
    /// Find a chat by ID.
    async fn find_chat(&self, chat_id: ChatId) -> AppResult<Option<ChatRecord>>;

    /// Resolve a chat the caller is entitled to.
    ///
    /// Unknown chats and chats in another tenant are both reported as
    /// `Forbidden` so the response does not reveal whether the ID exists.
    async fn authorize(&self, ctx: &TenantContext, chat_id: ChatId) -> AppResult<ChatRecord> {
        match self.find_chat(chat_id).await? {
            Some(chat) if ctx.can_access_chat(&chat) => Ok(chat),
            _ => Err(AppError::forbidden(format!("Not entitled to chat {chat_id}"))),
        }
    }
}
