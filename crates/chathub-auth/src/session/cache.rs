//! Short-lived cache of session-active lookups.

use std::time::Duration;

use moka::future::Cache;

use chathub_core::config::SessionConfig;
use chathub_core::types::SessionId;

/// Bounds credential-store load from access validation.
///
/// Entries expire after `active_cache_ttl_seconds`, so a revocation made on
/// another node is observed within that window. Revocations made through
/// this node write a `false` tombstone, and store lookups only fill empty
/// slots, so a lookup that raced a revocation can never re-activate it.
#[derive(Clone)]
pub struct SessionActiveCache {
    inner: Cache<SessionId, bool>,
}

impl std::fmt::Debug for SessionActiveCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionActiveCache")
            .field("entries", &self.inner.entry_count())
            .finish()
    }
}

impl SessionActiveCache {
    /// Creates a cache from the session config.
    pub fn new(config: &SessionConfig) -> Self {
        Self::with_ttl(
            Duration::from_secs(config.active_cache_ttl_seconds),
            config.active_cache_capacity,
        )
    }

    /// Creates a cache with an explicit TTL and capacity.
    pub fn with_ttl(ttl: Duration, capacity: u64) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Cached answer, if any.
    pub async fn get(&self, session_id: SessionId) -> Option<bool> {
        self.inner.get(&session_id).await
    }

    /// Records a freshly issued session as active.
    pub async fn insert_active(&self, session_id: SessionId) {
        self.inner.insert(session_id, true).await;
    }

    /// Records a store lookup unless an answer is already cached, and
    /// returns the answer that is now cached.
    pub async fn fill(&self, session_id: SessionId, active: bool) -> bool {
        self.inner
            .entry(session_id)
            .or_insert(active)
            .await
            .into_value()
    }

    /// Marks the session inactive, overriding any cached answer.
    pub async fn tombstone(&self, session_id: SessionId) {
        self.inner.insert(session_id, false).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_get_tombstone() {
        let cache = SessionActiveCache::with_ttl(Duration::from_secs(60), 100);
        let id = SessionId::new();
        assert_eq!(cache.get(id).await, None);
        cache.insert_active(id).await;
        assert_eq!(cache.get(id).await, Some(true));
        cache.tombstone(id).await;
        assert_eq!(cache.get(id).await, Some(false));
    }

    #[tokio::test]
    async fn test_fill_never_overwrites_tombstone() {
        let cache = SessionActiveCache::with_ttl(Duration::from_secs(60), 100);
        let id = SessionId::new();
        cache.tombstone(id).await;
        assert!(!cache.fill(id, true).await);
        assert_eq!(cache.get(id).await, Some(false));

        let fresh = SessionId::new();
        assert!(cache.fill(fresh, true).await);
        assert_eq!(cache.get(fresh).await, Some(true));
    }
}
