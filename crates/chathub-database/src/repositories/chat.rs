//! Chat directory over the persistence layer's `chats` table.

use async_trait::async_trait;
use sqlx::PgPool;

use chathub_core::models::ChatRecord;
use chathub_core::result::AppResult;
use chathub_core::traits::ChatDirectory;
use chathub_core::types::{ChatId, TenantId, UserId};

use crate::error::map_sqlx;

#[derive(Debug, sqlx::FromRow)]
struct ChatRow {
    id: ChatId,
    tenant_id: TenantId,
    assigned_user_id: Option<UserId>,
}

/// Reads chat ownership from the `chats` table. The table is owned by the
/// CRUD side and is not created by our migrations.
#[derive(Debug, Clone)]
pub struct PgChatDirectory {
    pool: PgPool,
}

impl PgChatDirectory {
    /// Create a new directory over `pool`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatDirectory for PgChatDirectory {
    async fn find_chat(&self, chat_id: ChatId) -> AppResult<Option<ChatRecord>> {
        let row = sqlx::query_as::<_, ChatRow>(
            "SELECT id, tenant_id, assigned_user_id FROM chats WHERE id = $1",
        )
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx("Failed to find chat"))?;
        Ok(row.map(|r| ChatRecord {
            id: r.id,
            tenant_id: r.tenant_id,
            assigned_user_id: r.assigned_user_id,
        }))
    }
}
