//! The sweep job against the in-memory credential store.

use std::sync::Arc;

use chrono::{Duration, Utc};

use chathub_auth::{IssueRequest, SessionManager};
use chathub_core::config::{AuthConfig, SessionConfig};
use chathub_core::models::Session;
use chathub_core::traits::CredentialStore;
use chathub_core::types::{SessionId, SessionLimit, TenantId, UserId, UserRole};
use chathub_database::MemoryCredentialStore;
use chathub_worker::{CronScheduler, ScheduledJob, SessionSweepJob};

fn expired_session(tenant_id: TenantId, user_id: UserId) -> Session {
    let past = Utc::now() - Duration::hours(3);
    Session {
        id: SessionId::new(),
        tenant_id,
        user_id,
        role: UserRole::Agent,
        refresh_token_hash: format!("hash-{}", SessionId::new()),
        device_info: None,
        ip_address: None,
        user_agent: None,
        is_active: true,
        revoked_reason: None,
        created_at: past,
        expires_at: past + Duration::hours(1),
        last_used_at: past,
    }
}

#[tokio::test]
async fn test_sweep_job_deactivates_expired_sessions() {
    let store = Arc::new(MemoryCredentialStore::new());
    let auth = AuthConfig {
        jwt_secret: "sweep-secret".to_string(),
        ..AuthConfig::default()
    };
    let session_config = SessionConfig::default();
    let sessions = Arc::new(SessionManager::new(store.clone(), &auth, &session_config));

    let (tenant, user) = (TenantId::new(), UserId::new());
    let live = sessions
        .issue(IssueRequest {
            tenant_id: tenant,
            user_id: user,
            role: UserRole::Agent,
            device_info: None,
            ip_address: None,
            user_agent: None,
        })
        .await
        .unwrap();
    for _ in 0..2 {
        store
            .create(&expired_session(tenant, user), SessionLimit::Unlimited)
            .await
            .unwrap();
    }

    let job = SessionSweepJob::new(sessions.clone(), &session_config);
    assert_eq!(job.name(), "session_sweep");
    assert_eq!(job.schedule(), session_config.sweep_cron);
    assert_eq!(job.run().await.unwrap(), 2);
    assert_eq!(job.run().await.unwrap(), 0);

    assert!(sessions.validate_access(&live.tokens.access_token).await.is_ok());
}

#[tokio::test]
async fn test_default_tasks_register_session_sweep() {
    let store = Arc::new(MemoryCredentialStore::new());
    let session_config = SessionConfig::default();
    let sessions = Arc::new(SessionManager::new(
        store,
        &AuthConfig::default(),
        &session_config,
    ));

    let scheduler = CronScheduler::new().await.unwrap();
    scheduler
        .register_default_tasks(sessions, &session_config)
        .await
        .unwrap();
    assert_eq!(scheduler.registered().await, vec!["session_sweep".to_string()]);
}
