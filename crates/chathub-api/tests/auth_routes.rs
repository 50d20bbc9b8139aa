//! Session endpoints through the router.

mod common;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use serde_json::Value;
use tower::ServiceExt;

use chathub_api::build_router;
use chathub_core::types::{TenantId, UserId, UserRole};

async fn call(
    app: &common::TestApp,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(json) => {
            request = request.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = build_router(app.state.clone())
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn test_health_reports_realtime_counters() {
    let app = common::app().await;
    let (status, body) = call(&app, "GET", "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["database"], "memory");
    assert_eq!(body["data"]["replays_detected"], 0);
    assert_eq!(body["data"]["realtime"]["connections_active"], 0);
}

#[tokio::test]
async fn test_refresh_rotates_and_replay_is_rejected() {
    let app = common::app().await;
    let issued = app.login(TenantId::new(), UserId::new(), UserRole::Agent).await;
    let refresh = serde_json::json!({ "refresh_token": issued.tokens.refresh_token });

    let (status, body) = call(&app, "POST", "/api/auth/refresh", None, Some(refresh.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(body["data"]["refresh_token"], issued.tokens.refresh_token.as_str());

    let (status, body) = call(&app, "POST", "/api/auth/refresh", None, Some(refresh)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "REPLAYED_REFRESH_TOKEN");

    let (_, body) = call(&app, "GET", "/api/health", None, None).await;
    assert_eq!(body["data"]["replays_detected"], 1);
}

#[tokio::test]
async fn test_missing_bearer_is_unauthenticated() {
    let app = common::app().await;
    let (status, body) = call(&app, "GET", "/api/auth/sessions", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "UNAUTHENTICATED");
}

#[tokio::test]
async fn test_list_sessions_marks_current_and_hides_hash() {
    let app = common::app().await;
    let (tenant, user) = (TenantId::new(), UserId::new());
    let first = app.login(tenant, user, UserRole::Agent).await;
    app.login(tenant, user, UserRole::Agent).await;

    let (status, body) = call(
        &app,
        "GET",
        "/api/auth/sessions",
        Some(&first.tokens.access_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let sessions = body["data"].as_array().unwrap();
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions.iter().filter(|s| s["current"] == true).count(), 1);
    assert!(sessions.iter().all(|s| s.get("refresh_token_hash").is_none()));
}

#[tokio::test]
async fn test_logout_revokes_the_calling_session() {
    let app = common::app().await;
    let issued = app.login(TenantId::new(), UserId::new(), UserRole::Agent).await;
    let token = issued.tokens.access_token.as_str();

    let (status, _) = call(&app, "POST", "/api/auth/logout", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&app, "GET", "/api/auth/sessions", Some(token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "REVOKED");
}

#[tokio::test]
async fn test_logout_all_counts_sessions() {
    let app = common::app().await;
    let (tenant, user) = (TenantId::new(), UserId::new());
    let issued = app.login(tenant, user, UserRole::Agent).await;
    app.login(tenant, user, UserRole::Agent).await;
    app.login(tenant, user, UserRole::Agent).await;

    let (status, body) = call(
        &app,
        "POST",
        "/api/auth/logout-all",
        Some(&issued.tokens.access_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["revoked"], 3);
}

#[tokio::test]
async fn test_cannot_revoke_another_users_session() {
    let app = common::app().await;
    let tenant = TenantId::new();
    let mine = app.login(tenant, UserId::new(), UserRole::Agent).await;
    let theirs = app.login(tenant, UserId::new(), UserRole::Agent).await;

    let uri = format!("/api/auth/sessions/{}", theirs.session.id);
    let (status, body) = call(&app, "DELETE", &uri, Some(&mine.tokens.access_token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NOT_FOUND");
}
