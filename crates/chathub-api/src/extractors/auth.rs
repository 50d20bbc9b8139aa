//! `AuthUser` extractor: pulls the access token from the Authorization
//! header and validates it against the session manager.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use chathub_core::context::TenantContext;
use chathub_core::error::AppError;

use crate::error::ApiError;
use crate::state::AppState;

/// Tenant context of an authenticated request.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub TenantContext);

impl std::ops::Deref for AuthUser {
    type Target = TenantContext;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::unauthenticated("Missing Authorization header"))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::unauthenticated("Invalid Authorization header format"))?;

        let ctx = state.sessions.validate_access(token).await?;
        Ok(AuthUser(ctx))
    }
}
