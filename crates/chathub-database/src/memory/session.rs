//! In-memory credential store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use chathub_core::error::AppError;
use chathub_core::models::Session;
use chathub_core::result::AppResult;
use chathub_core::traits::{CredentialStore, RotationOutcome};
use chathub_core::types::{SessionId, SessionLimit, TenantId, UserId};

#[derive(Debug, Default)]
struct State {
    sessions: HashMap<SessionId, Session>,
    /// Current refresh hash -> owning session.
    by_hash: HashMap<String, SessionId>,
    /// Rotated-away refresh hash -> owning session.
    rotated: HashMap<String, SessionId>,
}

impl State {
    fn active_for(&self, tenant_id: TenantId, user_id: UserId, now: DateTime<Utc>) -> Vec<&Session> {
        self.sessions
            .values()
            .filter(|s| s.tenant_id == tenant_id && s.user_id == user_id && s.is_usable_at(now))
            .collect()
    }

    fn forget(&mut self, id: SessionId) {
        self.by_hash.retain(|_, owner| *owner != id);
        self.rotated.retain(|_, owner| *owner != id);
    }
}

/// Credential store backed by a single mutex-guarded map set.
///
/// Every operation holds the lock for its whole read-modify-write, which is
/// what makes the cap check and the refresh compare-and-swap atomic.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    state: Mutex<State>,
}

impl MemoryCredentialStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions, active or not.
    pub async fn len(&self) -> usize {
        self.state.lock().await.sessions.len()
    }

    /// Whether the store holds no sessions.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn create(&self, session: &Session, limit: SessionLimit) -> AppResult<Session> {
        let mut state = self.state.lock().await;

        if state.by_hash.contains_key(&session.refresh_token_hash)
            || state.rotated.contains_key(&session.refresh_token_hash)
        {
            return Err(AppError::conflict("Refresh token hash already issued"));
        }

        let active = state
            .active_for(session.tenant_id, session.user_id, session.created_at)
            .len() as u32;
        limit.check(active)?;

        state
            .by_hash
            .insert(session.refresh_token_hash.clone(), session.id);
        state.sessions.insert(session.id, session.clone());
        Ok(session.clone())
    }

    async fn find_by_id(&self, id: SessionId) -> AppResult<Option<Session>> {
        Ok(self.state.lock().await.sessions.get(&id).cloned())
    }

    async fn find_active_by_user(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Session>> {
        let state = self.state.lock().await;
        let mut sessions: Vec<Session> = state
            .active_for(tenant_id, user_id, now)
            .into_iter()
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    async fn rotate_refresh_token(
        &self,
        presented_hash: &str,
        new_hash: &str,
        now: DateTime<Utc>,
    ) -> AppResult<RotationOutcome> {
        let mut state = self.state.lock().await;

        if let Some(id) = state.rotated.get(presented_hash).copied() {
            return Ok(match state.sessions.get(&id) {
                Some(session) => RotationOutcome::Replayed(session.clone()),
                None => RotationOutcome::Unknown,
            });
        }

        let Some(id) = state.by_hash.get(presented_hash).copied() else {
            return Ok(RotationOutcome::Unknown);
        };
        let Some(session) = state.sessions.get_mut(&id) else {
            return Ok(RotationOutcome::Unknown);
        };
        if !session.is_active {
            return Ok(RotationOutcome::Unknown);
        }
        if session.is_expired_at(now) {
            return Ok(RotationOutcome::Expired(session.clone()));
        }

        session.refresh_token_hash = new_hash.to_string();
        session.last_used_at = now;
        let rotated = session.clone();

        state.by_hash.remove(presented_hash);
        state.by_hash.insert(new_hash.to_string(), id);
        state.rotated.insert(presented_hash.to_string(), id);
        Ok(RotationOutcome::Rotated(rotated))
    }

    async fn deactivate(&self, id: SessionId, reason: &str) -> AppResult<Option<Session>> {
        let mut state = self.state.lock().await;
        match state.sessions.get_mut(&id) {
            Some(session) if session.is_active => {
                session.is_active = false;
                session.revoked_reason = Some(reason.to_string());
                Ok(Some(session.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn deactivate_user(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        reason: &str,
    ) -> AppResult<Vec<Session>> {
        let mut state = self.state.lock().await;
        let mut revoked = Vec::new();
        for session in state.sessions.values_mut() {
            if session.tenant_id == tenant_id && session.user_id == user_id && session.is_active {
                session.is_active = false;
                session.revoked_reason = Some(reason.to_string());
                revoked.push(session.clone());
            }
        }
        Ok(revoked)
    }

    async fn sweep_expired(
        &self,
        now: DateTime<Utc>,
        hard_delete: bool,
    ) -> AppResult<Vec<Session>> {
        let mut state = self.state.lock().await;
        let expired: Vec<SessionId> = state
            .sessions
            .values()
            .filter(|s| s.is_expired_at(now) && (s.is_active || hard_delete))
            .map(|s| s.id)
            .collect();

        let mut swept = Vec::new();
        for id in expired {
            if hard_delete {
                if let Some(session) = state.sessions.remove(&id) {
                    state.forget(id);
                    if session.is_active {
                        swept.push(session);
                    }
                }
            } else if let Some(session) = state.sessions.get_mut(&id) {
                session.is_active = false;
                session.revoked_reason = Some("expired".to_string());
                swept.push(session.clone());
            }
        }
        Ok(swept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chathub_core::error::ErrorKind;
    use chathub_core::types::UserRole;
    use chrono::Duration;

    fn session(tenant_id: TenantId, user_id: UserId, hash: &str) -> Session {
        let now = Utc::now();
        Session {
            id: SessionId::new(),
            tenant_id,
            user_id,
            role: UserRole::Agent,
            refresh_token_hash: hash.to_string(),
            device_info: None,
            ip_address: None,
            user_agent: None,
            is_active: true,
            revoked_reason: None,
            created_at: now,
            expires_at: now + Duration::hours(1),
            last_used_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_enforces_limit() {
        let store = MemoryCredentialStore::new();
        let (tenant, user) = (TenantId::new(), UserId::new());
        store
            .create(&session(tenant, user, "a"), SessionLimit::Fixed(1))
            .await
            .unwrap();
        let err = store
            .create(&session(tenant, user, "b"), SessionLimit::Fixed(1))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::TooManySessions);

        // Another user in the same tenant is unaffected.
        store
            .create(&session(tenant, UserId::new(), "c"), SessionLimit::Fixed(1))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_rotation_then_replay() {
        let store = MemoryCredentialStore::new();
        let created = store
            .create(&session(TenantId::new(), UserId::new(), "h1"), SessionLimit::Unlimited)
            .await
            .unwrap();

        let now = Utc::now();
        match store.rotate_refresh_token("h1", "h2", now).await.unwrap() {
            RotationOutcome::Rotated(s) => {
                assert_eq!(s.id, created.id);
                assert_eq!(s.refresh_token_hash, "h2");
            }
            other => panic!("expected rotation, got {other:?}"),
        }
        assert!(matches!(
            store.rotate_refresh_token("h1", "h3", now).await.unwrap(),
            RotationOutcome::Replayed(s) if s.id == created.id
        ));
        assert!(matches!(
            store.rotate_refresh_token("nope", "h4", now).await.unwrap(),
            RotationOutcome::Unknown
        ));
    }

    #[tokio::test]
    async fn test_expired_session_does_not_rotate() {
        let store = MemoryCredentialStore::new();
        store
            .create(&session(TenantId::new(), UserId::new(), "h1"), SessionLimit::Unlimited)
            .await
            .unwrap();
        let later = Utc::now() + Duration::hours(2);
        assert!(matches!(
            store.rotate_refresh_token("h1", "h2", later).await.unwrap(),
            RotationOutcome::Expired(_)
        ));
    }

    #[tokio::test]
    async fn test_sweep_is_idempotent() {
        let store = MemoryCredentialStore::new();
        let (tenant, user) = (TenantId::new(), UserId::new());
        store
            .create(&session(tenant, user, "h1"), SessionLimit::Unlimited)
            .await
            .unwrap();
        let later = Utc::now() + Duration::hours(2);

        assert_eq!(store.sweep_expired(later, false).await.unwrap().len(), 1);
        assert!(store.sweep_expired(later, false).await.unwrap().is_empty());
        assert_eq!(store.len().await, 1);

        assert!(store.sweep_expired(later, true).await.unwrap().is_empty());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_deactivate_user_only_touches_active() {
        let store = MemoryCredentialStore::new();
        let (tenant, user) = (TenantId::new(), UserId::new());
        let first = store
            .create(&session(tenant, user, "a"), SessionLimit::Unlimited)
            .await
            .unwrap();
        store
            .create(&session(tenant, user, "b"), SessionLimit::Unlimited)
            .await
            .unwrap();
        store.deactivate(first.id, "logout").await.unwrap();

        let revoked = store.deactivate_user(tenant, user, "logout_all").await.unwrap();
        assert_eq!(revoked.len(), 1);
        assert!(store.deactivate(first.id, "logout").await.unwrap().is_none());
    }
}
