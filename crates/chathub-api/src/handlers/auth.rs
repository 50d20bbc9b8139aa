//! Session endpoints. Login happens elsewhere; these manage the sessions it
//! issues.

use axum::Json;
use axum::extract::{Path, State};
use uuid::Uuid;

use chathub_auth::TokenPair;
use chathub_core::types::SessionId;

use crate::dto::request::RefreshRequest;
use crate::dto::response::{ApiResponse, MessageResponse, RevokedResponse, SessionResponse};
use crate::error::ApiError;
use crate::extractors::AuthUser;
use crate::state::AppState;

/// POST /api/auth/refresh
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<ApiResponse<TokenPair>>, ApiError> {
    let tokens = state.sessions.refresh(&req.refresh_token).await?;
    Ok(Json(ApiResponse::ok(tokens)))
}

/// POST /api/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.sessions.revoke_as(&auth, auth.session_id, "logout").await?;
    Ok(Json(ApiResponse::ok(MessageResponse {
        message: "Logged out successfully".to_string(),
    })))
}

/// POST /api/auth/logout-all
pub async fn logout_all(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<RevokedResponse>>, ApiError> {
    let revoked = state
        .sessions
        .revoke_all(auth.tenant_id, auth.user_id, "logout_all")
        .await?;
    Ok(Json(ApiResponse::ok(RevokedResponse { revoked })))
}

/// GET /api/auth/sessions
pub async fn list_sessions(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<Vec<SessionResponse>>>, ApiError> {
    let sessions = state
        .sessions
        .list_active(auth.tenant_id, auth.user_id)
        .await?
        .into_iter()
        .map(|session| SessionResponse {
            current: session.id == auth.session_id,
            session,
        })
        .collect();
    Ok(Json(ApiResponse::ok(sessions)))
}

/// DELETE /api/auth/sessions/{id}
pub async fn revoke_session(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<RevokedResponse>>, ApiError> {
    let revoked = state
        .sessions
        .revoke_as(&auth, SessionId(id), "revoked_by_user")
        .await?;
    Ok(Json(ApiResponse::ok(RevokedResponse {
        revoked: usize::from(revoked),
    })))
}
