//! In-memory per-chat sequence allocator.

use async_trait::async_trait;
use dashmap::DashMap;

use chathub_core::result::AppResult;
use chathub_core::traits::EventLog;
use chathub_core::types::{ChatId, TenantId};

/// Monotonic counters keyed by `(tenant, chat)`.
#[derive(Debug, Default)]
pub struct MemoryEventLog {
    counters: DashMap<(TenantId, ChatId), u64>,
}

impl MemoryEventLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventLog for MemoryEventLog {
    async fn append(&self, tenant_id: TenantId, chat_id: ChatId) -> AppResult<u64> {
        let mut entry = self.counters.entry((tenant_id, chat_id)).or_insert(0);
        *entry += 1;
        Ok(*entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_sequences_are_per_chat() {
        let log = MemoryEventLog::new();
        let tenant = TenantId::new();
        let (a, b) = (ChatId::new(), ChatId::new());
        assert_eq!(log.append(tenant, a).await.unwrap(), 1);
        assert_eq!(log.append(tenant, a).await.unwrap(), 2);
        assert_eq!(log.append(tenant, b).await.unwrap(), 1);
        assert_eq!(log.append(TenantId::new(), a).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_appends_are_unique() {
        let log = Arc::new(MemoryEventLog::new());
        let (tenant, chat) = (TenantId::new(), ChatId::new());
        let handles: Vec<_> = (0..32)
            .map(|_| {
                let log = Arc::clone(&log);
                tokio::spawn(async move { log.append(tenant, chat).await.unwrap() })
            })
            .collect();
        let mut seen = Vec::new();
        for handle in handles {
            seen.push(handle.await.unwrap());
        }
        seen.sort_unstable();
        assert_eq!(seen, (1..=32).collect::<Vec<u64>>());
    }
}
