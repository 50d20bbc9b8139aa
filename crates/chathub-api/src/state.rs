//! Application state shared across all handlers.

use std::sync::Arc;
use std::time::Instant;

use chathub_auth::SessionManager;
use chathub_core::config::AppConfig;
use chathub_database::DatabasePool;
use chathub_realtime::RealtimeEngine;

/// Passed to every Axum handler via `State<AppState>`.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,
    /// Session lifecycle
    pub sessions: Arc<SessionManager>,
    /// Real-time gateway
    pub realtime: RealtimeEngine,
    /// Postgres pool, absent on the in-memory backend
    pub db: Option<DatabasePool>,
    /// Process start, for uptime reporting
    pub started_at: Instant,
}

impl AppState {
    /// Bundles the shared services.
    pub fn new(config: Arc<AppConfig>, sessions: Arc<SessionManager>, realtime: RealtimeEngine) -> Self {
        Self {
            config,
            sessions,
            realtime,
            db: None,
            started_at: Instant::now(),
        }
    }

    /// Attaches the Postgres pool checked by the health endpoint.
    pub fn with_database(mut self, db: DatabasePool) -> Self {
        self.db = Some(db);
        self
    }
}
