//! Periodic expired-session sweep.

use std::sync::Arc;

use async_trait::async_trait;

use chathub_auth::SessionManager;
use chathub_core::config::SessionConfig;
use chathub_core::result::AppResult;

use super::ScheduledJob;

/// Deactivates sessions whose absolute expiry has passed.
///
/// Revocation listeners fire for every swept session, so live connections
/// bound to them are evicted on the same tick.
#[derive(Debug)]
pub struct SessionSweepJob {
    sessions: Arc<SessionManager>,
    schedule: String,
}

impl SessionSweepJob {
    /// Creates the job using `session.sweep_cron`.
    pub fn new(sessions: Arc<SessionManager>, config: &SessionConfig) -> Self {
        Self {
            sessions,
            schedule: config.sweep_cron.clone(),
        }
    }
}

#[async_trait]
impl ScheduledJob for SessionSweepJob {
    fn name(&self) -> &str {
        "session_sweep"
    }

    fn schedule(&self) -> &str {
        &self.schedule
    }

    async fn run(&self) -> AppResult<usize> {
        let swept = self.sessions.sweep_expired().await?;
        if swept > 0 {
            tracing::info!(count = swept, "Session sweep deactivated expired sessions");
        } else {
            tracing::trace!("Session sweep found nothing to do");
        }
        Ok(swept)
    }
}
