//! Session lifecycle manager.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use chathub_core::config::{AuthConfig, SessionConfig};
use chathub_core::context::TenantContext;
use chathub_core::error::AppError;
use chathub_core::models::Session;
use chathub_core::result::AppResult;
use chathub_core::traits::{CredentialStore, RotationOutcome, SessionRevocationListener};
use chathub_core::types::{SessionId, TenantId, UserId, UserRole};

use crate::jwt::{JwtDecoder, JwtEncoder};
use crate::token::{generate_refresh_token, hash_refresh_token};

use super::cache::SessionActiveCache;
use super::limiter::SessionLimiter;
use super::retry::RetryPolicy;

/// Who a session is being issued for.
///
/// Produced by whatever authenticated the user (password login, OAuth
/// completion, registration); the manager does not verify credentials.
#[derive(Debug, Clone)]
pub struct IssueRequest {
    /// Tenant the session is scoped to.
    pub tenant_id: TenantId,
    /// Authenticated user.
    pub user_id: UserId,
    /// Role inside the tenant.
    pub role: UserRole,
    /// Client-supplied device metadata.
    pub device_info: Option<serde_json::Value>,
    /// Remote address.
    pub ip_address: Option<String>,
    /// User agent header.
    pub user_agent: Option<String>,
}

/// Access + refresh pair handed to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPair {
    /// Short-lived signed access token.
    pub access_token: String,
    /// Single-use opaque refresh token.
    pub refresh_token: String,
    /// Access token expiry.
    pub access_expires_at: DateTime<Utc>,
    /// Absolute session expiry; refresh fails after this.
    pub refresh_expires_at: DateTime<Utc>,
    /// Session the pair belongs to.
    pub session_id: SessionId,
}

/// Result of a successful issue.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    /// Tokens for the client.
    pub tokens: TokenPair,
    /// Stored session.
    pub session: Session,
}

/// Owns the token/session state machine.
pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    encoder: JwtEncoder,
    decoder: JwtDecoder,
    limiter: SessionLimiter,
    cache: SessionActiveCache,
    retry: RetryPolicy,
    refresh_ttl: Duration,
    hard_delete_expired: bool,
    listeners: RwLock<Vec<Arc<dyn SessionRevocationListener>>>,
    replays_detected: AtomicU64,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("encoder", &self.encoder)
            .field("limiter", &self.limiter)
            .field("retry", &self.retry)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish()
    }
}

impl SessionManager {
    /// Creates a manager over `store`.
    pub fn new(
        store: Arc<dyn CredentialStore>,
        auth_config: &AuthConfig,
        session_config: &SessionConfig,
    ) -> Self {
        Self {
            store,
            encoder: JwtEncoder::new(auth_config),
            decoder: JwtDecoder::new(auth_config),
            limiter: SessionLimiter::new(session_config.limits.clone()),
            cache: SessionActiveCache::new(session_config),
            retry: RetryPolicy::from_config(session_config),
            refresh_ttl: Duration::hours(auth_config.refresh_ttl_hours as i64),
            hard_delete_expired: session_config.hard_delete_expired,
            listeners: RwLock::new(Vec::new()),
            replays_detected: AtomicU64::new(0),
        }
    }

    /// Registers a listener notified on every revocation.
    pub async fn subscribe(&self, listener: Arc<dyn SessionRevocationListener>) {
        self.listeners.write().await.push(listener);
    }

    /// Access token encoder, exposed for callers minting tokens for
    /// existing sessions (tests, admin tooling).
    pub fn encoder(&self) -> &JwtEncoder {
        &self.encoder
    }

    /// Number of refresh-token replays seen since start.
    pub fn replays_detected(&self) -> u64 {
        self.replays_detected.load(Ordering::Relaxed)
    }

    /// Creates a session and returns its first token pair.
    ///
    /// Fails with `TooManySessions` if the user's role cap is reached.
    pub async fn issue(&self, request: IssueRequest) -> AppResult<IssuedSession> {
        let now = Utc::now();
        let refresh_token = generate_refresh_token();

        let session = Session {
            id: SessionId::new(),
            tenant_id: request.tenant_id,
            user_id: request.user_id,
            role: request.role,
            refresh_token_hash: hash_refresh_token(&refresh_token),
            device_info: request.device_info,
            ip_address: request.ip_address,
            user_agent: request.user_agent,
            is_active: true,
            revoked_reason: None,
            created_at: now,
            expires_at: now + self.refresh_ttl,
            last_used_at: now,
        };

        let limit = self.limiter.resolve(request.role);
        let session = self.store.create(&session, limit).await.inspect_err(|e| {
            warn!(
                tenant_id = %request.tenant_id,
                user_id = %request.user_id,
                error = %e,
                "Session issue rejected"
            );
        })?;
        self.cache.insert_active(session.id).await;

        let tokens = self.token_pair(&session, refresh_token)?;
        info!(
            session_id = %session.id,
            tenant_id = %session.tenant_id,
            user_id = %session.user_id,
            role = %session.role,
            "Session issued"
        );
        Ok(IssuedSession { tokens, session })
    }

    /// Exchanges a refresh token for a new pair, rotating it.
    ///
    /// The presented token is permanently invalid afterwards. Presenting a
    /// token that was already rotated revokes the whole session and fails
    /// with `ReplayedRefreshToken`.
    pub async fn refresh(&self, refresh_token: &str) -> AppResult<TokenPair> {
        let presented_hash = hash_refresh_token(refresh_token);
        let new_token = generate_refresh_token();
        let new_hash = hash_refresh_token(&new_token);

        let outcome = self
            .store
            .rotate_refresh_token(&presented_hash, &new_hash, Utc::now())
            .await?;

        match outcome {
            RotationOutcome::Rotated(session) => {
                debug!(session_id = %session.id, "Refresh token rotated");
                self.token_pair(&session, new_token)
            }
            RotationOutcome::Replayed(session) => {
                self.replays_detected.fetch_add(1, Ordering::Relaxed);
                warn!(
                    session_id = %session.id,
                    tenant_id = %session.tenant_id,
                    user_id = %session.user_id,
                    "Rotated refresh token replayed, revoking session"
                );
                self.revoke(session.id, "refresh_token_replay").await?;
                Err(AppError::replayed_refresh_token(
                    "Refresh token was already used; session revoked",
                ))
            }
            RotationOutcome::Expired(session) => {
                self.revoke(session.id, "expired").await?;
                Err(AppError::invalid_token("Session has expired"))
            }
            RotationOutcome::Unknown => Err(AppError::invalid_token(
                "Refresh token does not match an active session",
            )),
        }
    }

    /// Marks a session inactive and evicts its live connections.
    ///
    /// Returns `false` if the session was already inactive or unknown.
    pub async fn revoke(&self, session_id: SessionId, reason: &str) -> AppResult<bool> {
        let revoked = self.store.deactivate(session_id, reason).await?;
        self.cache.tombstone(session_id).await;
        match revoked {
            Some(session) => {
                info!(
                    session_id = %session.id,
                    tenant_id = %session.tenant_id,
                    reason,
                    "Session revoked"
                );
                self.notify(std::slice::from_ref(&session)).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Revokes a session on behalf of `ctx`.
    ///
    /// Users may revoke their own sessions; admins and owners may revoke
    /// any session in their tenant. Anything else reports `NotFound`.
    pub async fn revoke_as(
        &self,
        ctx: &TenantContext,
        session_id: SessionId,
        reason: &str,
    ) -> AppResult<bool> {
        let session = self
            .store
            .find_by_id(session_id)
            .await?
            .filter(|s| {
                s.tenant_id == ctx.tenant_id
                    && (s.user_id == ctx.user_id || ctx.role >= UserRole::Admin)
            })
            .ok_or_else(|| AppError::not_found(format!("Session {session_id} not found")))?;
        self.revoke(session.id, reason).await
    }

    /// Revokes every active session of a user.
    pub async fn revoke_all(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        reason: &str,
    ) -> AppResult<usize> {
        let revoked = self
            .store
            .deactivate_user(tenant_id, user_id, reason)
            .await?;
        for session in &revoked {
            self.cache.tombstone(session.id).await;
        }
        info!(
            tenant_id = %tenant_id,
            user_id = %user_id,
            count = revoked.len(),
            reason,
            "All user sessions revoked"
        );
        self.notify(&revoked).await;
        Ok(revoked.len())
    }

    /// Deactivates sessions past their expiry. Safe to run concurrently
    /// with live traffic; only already-expired rows are touched.
    pub async fn sweep_expired(&self) -> AppResult<usize> {
        self.sweep_expired_at(Utc::now()).await
    }

    /// [`Self::sweep_expired`] with an explicit clock.
    pub async fn sweep_expired_at(&self, now: DateTime<Utc>) -> AppResult<usize> {
        let swept = self
            .store
            .sweep_expired(now, self.hard_delete_expired)
            .await
            .inspect_err(|e| error!(error = %e, "Expired session sweep failed"))?;
        if swept.is_empty() {
            return Ok(0);
        }
        for session in &swept {
            self.cache.tombstone(session.id).await;
        }
        info!(count = swept.len(), hard_delete = self.hard_delete_expired, "Expired sessions swept");
        self.notify(&swept).await;
        Ok(swept.len())
    }

    /// Verifies an access token and confirms its session is still active.
    ///
    /// Fails with `Unauthenticated` for a bad token, `Expired` for a token
    /// past its TTL, and `Revoked` when the session is no longer active.
    /// Transient store failures are retried before giving up.
    pub async fn validate_access(&self, access_token: &str) -> AppResult<TenantContext> {
        let claims = self.decoder.decode(access_token)?;
        let ctx = claims.context();

        let active = match self.cache.get(ctx.session_id).await {
            Some(active) => active,
            None => {
                let active = self.lookup_active(&ctx).await?;
                self.cache.fill(ctx.session_id, active).await
            }
        };

        if !active {
            debug!(session_id = %ctx.session_id, "Access token for inactive session");
            return Err(AppError::revoked("Session is no longer active"));
        }
        Ok(ctx)
    }

    /// Confirms against the credential store, bypassing the cache, that the
    /// session behind `ctx` is still active.
    ///
    /// Used where a stale cached answer would outlive a revocation, such as
    /// re-checking a connection right after it became visible to eviction.
    pub async fn confirm_active(&self, ctx: &TenantContext) -> AppResult<()> {
        if self.lookup_active(ctx).await? {
            Ok(())
        } else {
            self.cache.tombstone(ctx.session_id).await;
            Err(AppError::revoked("Session is no longer active"))
        }
    }

    /// Lists the user's active sessions, newest first.
    pub async fn list_active(&self, tenant_id: TenantId, user_id: UserId) -> AppResult<Vec<Session>> {
        self.retry
            .run("list_sessions", || {
                self.store.find_active_by_user(tenant_id, user_id, Utc::now())
            })
            .await
    }

    async fn lookup_active(&self, ctx: &TenantContext) -> AppResult<bool> {
        let now = Utc::now();
        let session = self
            .retry
            .run("find_session", || self.store.find_by_id(ctx.session_id))
            .await?;
        Ok(session.is_some_and(|s| {
            s.is_usable_at(now) && s.tenant_id == ctx.tenant_id && s.user_id == ctx.user_id
        }))
    }

    fn token_pair(&self, session: &Session, refresh_token: String) -> AppResult<TokenPair> {
        let access = self.encoder.issue(session)?;
        Ok(TokenPair {
            access_token: access.token,
            refresh_token,
            access_expires_at: access.expires_at,
            refresh_expires_at: session.expires_at,
            session_id: session.id,
        })
    }

    async fn notify(&self, sessions: &[Session]) {
        let listeners = self.listeners.read().await;
        for session in sessions {
            for listener in listeners.iter() {
                listener.on_session_revoked(session);
            }
        }
    }
}
