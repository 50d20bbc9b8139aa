//! Per-chat commit sequence allocation.

use async_trait::async_trait;

use crate::result::AppResult;
use crate::types::{ChatId, TenantId};

/// Allocates monotonic per-chat sequence numbers at commit time.
#[async_trait]
pub trait EventLog: Send + Sync + 'static {
    /// Allocate the next sequence for `chat_id`. The first call returns 1.
    async fn append(&self, tenant_id: TenantId, chat_id: ChatId) -> AppResult<u64>;
}
