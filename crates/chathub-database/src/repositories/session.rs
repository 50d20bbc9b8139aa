//! Session repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use chathub_core::models::Session;
use chathub_core::result::AppResult;
use chathub_core::traits::{CredentialStore, RotationOutcome};
use chathub_core::types::{SessionId, SessionLimit, TenantId, UserId, UserRole};

use crate::error::map_sqlx;

const SESSION_COLUMNS: &str = "id, tenant_id, user_id, role, refresh_token_hash, device_info, \
     ip_address, user_agent, is_active, revoked_reason, created_at, expires_at, last_used_at";

#[derive(Debug, sqlx::FromRow)]
struct SessionRow {
    id: SessionId,
    tenant_id: TenantId,
    user_id: UserId,
    role: String,
    refresh_token_hash: String,
    device_info: Option<serde_json::Value>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    is_active: bool,
    revoked_reason: Option<String>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    last_used_at: DateTime<Utc>,
}

impl TryFrom<SessionRow> for Session {
    type Error = chathub_core::AppError;

    fn try_from(row: SessionRow) -> AppResult<Self> {
        Ok(Session {
            id: row.id,
            tenant_id: row.tenant_id,
            user_id: row.user_id,
            role: row.role.parse::<UserRole>()?,
            refresh_token_hash: row.refresh_token_hash,
            device_info: row.device_info,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            is_active: row.is_active,
            revoked_reason: row.revoked_reason,
            created_at: row.created_at,
            expires_at: row.expires_at,
            last_used_at: row.last_used_at,
        })
    }
}

fn into_sessions(rows: Vec<SessionRow>) -> AppResult<Vec<Session>> {
    rows.into_iter().map(Session::try_from).collect()
}

/// Credential store backed by the `sessions` and `rotated_refresh_tokens`
/// tables.
#[derive(Debug, Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    /// Create a new store over `pool`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn begin(&self) -> AppResult<Transaction<'static, Postgres>> {
        self.pool
            .begin()
            .await
            .map_err(map_sqlx("Failed to begin transaction"))
    }

    async fn load(
        tx: &mut Transaction<'static, Postgres>,
        id: SessionId,
    ) -> AppResult<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_sqlx("Failed to load session"))?;
        row.map(Session::try_from).transpose()
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn create(&self, session: &Session, limit: SessionLimit) -> AppResult<Session> {
        let mut tx = self.begin().await?;

        if let Some(max) = limit.as_max() {
            // Serializes concurrent issues for the same user until commit.
            sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text, 0))")
                .bind(session.user_id)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx("Failed to lock user sessions"))?;

            let active: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM sessions \
                 WHERE tenant_id = $1 AND user_id = $2 AND is_active AND expires_at > $3",
            )
            .bind(session.tenant_id)
            .bind(session.user_id)
            .bind(session.created_at)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx("Failed to count active sessions"))?;

            SessionLimit::Fixed(max).check(u32::try_from(active).unwrap_or(u32::MAX))?;
        }

        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "INSERT INTO sessions ({SESSION_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             RETURNING {SESSION_COLUMNS}"
        ))
        .bind(session.id)
        .bind(session.tenant_id)
        .bind(session.user_id)
        .bind(session.role.as_str())
        .bind(&session.refresh_token_hash)
        .bind(&session.device_info)
        .bind(&session.ip_address)
        .bind(&session.user_agent)
        .bind(session.is_active)
        .bind(&session.revoked_reason)
        .bind(session.created_at)
        .bind(session.expires_at)
        .bind(session.last_used_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx("Failed to create session"))?;

        tx.commit()
            .await
            .map_err(map_sqlx("Failed to commit session"))?;
        Session::try_from(row)
    }

    async fn find_by_id(&self, id: SessionId) -> AppResult<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx("Failed to find session"))?;
        row.map(Session::try_from).transpose()
    }

    async fn find_active_by_user(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Session>> {
        let rows = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions \
             WHERE tenant_id = $1 AND user_id = $2 AND is_active AND expires_at > $3 \
             ORDER BY created_at DESC"
        ))
        .bind(tenant_id)
        .bind(user_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx("Failed to find active sessions"))?;
        into_sessions(rows)
    }

    async fn rotate_refresh_token(
        &self,
        presented_hash: &str,
        new_hash: &str,
        now: DateTime<Utc>,
    ) -> AppResult<RotationOutcome> {
        let mut tx = self.begin().await?;

        // A concurrent rotation of the same hash blocks here; once it
        // commits the row no longer matches and we fall through to the
        // rotated-hash lookup below.
        let current = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE refresh_token_hash = $1 FOR UPDATE"
        ))
        .bind(presented_hash)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx("Failed to lock session for rotation"))?;

        let Some(row) = current else {
            let owner: Option<SessionId> = sqlx::query_scalar(
                "SELECT session_id FROM rotated_refresh_tokens WHERE token_hash = $1",
            )
            .bind(presented_hash)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx("Failed to look up rotated token"))?;

            let outcome = match owner {
                Some(id) => match Self::load(&mut tx, id).await? {
                    Some(session) => RotationOutcome::Replayed(session),
                    None => RotationOutcome::Unknown,
                },
                None => RotationOutcome::Unknown,
            };
            tx.rollback()
                .await
                .map_err(map_sqlx("Failed to end rotation lookup"))?;
            return Ok(outcome);
        };

        let session = Session::try_from(row)?;
        if !session.is_active {
            return Ok(RotationOutcome::Unknown);
        }
        if session.is_expired_at(now) {
            return Ok(RotationOutcome::Expired(session));
        }

        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "UPDATE sessions SET refresh_token_hash = $2, last_used_at = $3 \
             WHERE id = $1 RETURNING {SESSION_COLUMNS}"
        ))
        .bind(session.id)
        .bind(new_hash)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx("Failed to rotate refresh token"))?;

        sqlx::query(
            "INSERT INTO rotated_refresh_tokens (token_hash, session_id, rotated_at) \
             VALUES ($1, $2, $3)",
        )
        .bind(presented_hash)
        .bind(session.id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx("Failed to record rotated token"))?;

        tx.commit()
            .await
            .map_err(map_sqlx("Failed to commit rotation"))?;
        Ok(RotationOutcome::Rotated(Session::try_from(row)?))
    }

    async fn deactivate(&self, id: SessionId, reason: &str) -> AppResult<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "UPDATE sessions SET is_active = FALSE, revoked_reason = $2 \
             WHERE id = $1 AND is_active RETURNING {SESSION_COLUMNS}"
        ))
        .bind(id)
        .bind(reason)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx("Failed to deactivate session"))?;
        row.map(Session::try_from).transpose()
    }

    async fn deactivate_user(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        reason: &str,
    ) -> AppResult<Vec<Session>> {
        let rows = sqlx::query_as::<_, SessionRow>(&format!(
            "UPDATE sessions SET is_active = FALSE, revoked_reason = $3 \
             WHERE tenant_id = $1 AND user_id = $2 AND is_active RETURNING {SESSION_COLUMNS}"
        ))
        .bind(tenant_id)
        .bind(user_id)
        .bind(reason)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx("Failed to deactivate user sessions"))?;
        into_sessions(rows)
    }

    async fn sweep_expired(
        &self,
        now: DateTime<Utc>,
        hard_delete: bool,
    ) -> AppResult<Vec<Session>> {
        let sql = if hard_delete {
            format!("DELETE FROM sessions WHERE expires_at <= $1 RETURNING {SESSION_COLUMNS}")
        } else {
            format!(
                "UPDATE sessions SET is_active = FALSE, revoked_reason = 'expired' \
                 WHERE is_active AND expires_at <= $1 RETURNING {SESSION_COLUMNS}"
            )
        };
        let rows = sqlx::query_as::<_, SessionRow>(&sql)
            .bind(now)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx("Failed to sweep expired sessions"))?;
        let swept = into_sessions(rows)?;
        if hard_delete {
            return Ok(swept.into_iter().filter(|s| s.is_active).collect());
        }
        Ok(swept)
    }
}
