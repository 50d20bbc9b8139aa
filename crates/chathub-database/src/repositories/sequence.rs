//! Per-chat sequence allocation in `chat_event_sequences`.

use async_trait::async_trait;
use sqlx::PgPool;

use chathub_core::result::AppResult;
use chathub_core::traits::EventLog;
use chathub_core::types::{ChatId, TenantId};

use crate::error::map_sqlx;

/// Allocates sequences with a single upsert, so concurrent appends for the
/// same chat serialize on the row lock.
#[derive(Debug, Clone)]
pub struct PgEventLog {
    pool: PgPool,
}

impl PgEventLog {
    /// Create a new event log over `pool`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventLog for PgEventLog {
    async fn append(&self, tenant_id: TenantId, chat_id: ChatId) -> AppResult<u64> {
        let seq: i64 = sqlx::query_scalar(
            "INSERT INTO chat_event_sequences (tenant_id, chat_id, last_seq) VALUES ($1, $2, 1) \
             ON CONFLICT (tenant_id, chat_id) \
             DO UPDATE SET last_seq = chat_event_sequences.last_seq + 1 \
             RETURNING last_seq",
        )
        .bind(tenant_id)
        .bind(chat_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx("Failed to allocate chat sequence"))?;
        Ok(seq.max(0) as u64)
    }
}
