//! Health check handler.

use axum::Json;
use axum::extract::State;

use crate::dto::response::{ApiResponse, HealthResponse};
use crate::state::AppState;

/// GET /api/health
///
/// Reports `degraded` when the database does not answer; the gateway keeps
/// serving live connections either way.
pub async fn health(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    let database = match &state.db {
        None => "memory",
        Some(db) => match db.health_check().await {
            Ok(true) => "connected",
            Ok(false) => "unhealthy",
            Err(e) => {
                tracing::warn!(error = %e, "Database health check failed");
                "unavailable"
            }
        },
    };
    let status = if matches!(database, "memory" | "connected") {
        "ok"
    } else {
        "degraded"
    };

    Json(ApiResponse::ok(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        database: database.to_string(),
        replays_detected: state.sessions.replays_detected(),
        realtime: state.realtime.metrics(),
    }))
}
