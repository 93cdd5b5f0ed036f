mod common;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
};
use chrono::{Duration, Utc};
use coach_platform::api::create_routes;
use coach_platform::auth::UserRole;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use serial_test::serial;
use tower::ServiceExt;
use uuid::Uuid;

use common::{bearer_for, create_user, db_router, init_test_logging, lazy_router, session, test_context, test_pool};

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: &str, uri: &str, auth: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get_request(uri: &str, auth: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    init_test_logging();
    let response = lazy_router().oneshot(get_request("/health", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "coach-platform");
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let response = lazy_router()
        .oneshot(get_request("/api/v1/clients", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error_code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_garbage_token_is_unauthorized() {
    let response = lazy_router()
        .oneshot(get_request("/api/v1/notifications", Some("Bearer not-a-jwt")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_client_cannot_use_coach_routes() {
    let Some(router) = db_router().await else {
        return;
    };
    let auth = bearer_for(&session(UserRole::Client));
    let response = router
        .oneshot(get_request("/api/v1/clients", Some(&auth)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["error_code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_coach_cannot_use_admin_routes() {
    let Some(router) = db_router().await else {
        return;
    };
    let auth = bearer_for(&session(UserRole::Coach));
    let response = router
        .oneshot(get_request("/api/v1/admin/stats", Some(&auth)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_coach_cannot_complete_drills() {
    let Some(router) = db_router().await else {
        return;
    };
    let auth = bearer_for(&session(UserRole::Coach));
    let request = json_request(
        "POST",
        "/api/v1/workouts/drills/complete",
        Some(&auth),
        json!({ "assignment_id": Uuid::new_v4(), "drill_id": Uuid::new_v4() }),
    );

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_empty_message_is_rejected() {
    let Some(router) = db_router().await else {
        return;
    };
    let auth = bearer_for(&session(UserRole::Coach));
    let uri = format!("/api/v1/messages/conversations/{}", Uuid::new_v4());
    let request = json_request("POST", &uri, Some(&auth), json!({ "content": "   " }));

    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error_code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_event_with_inverted_time_range_is_rejected() {
    let Some(router) = db_router().await else {
        return;
    };
    let auth = bearer_for(&session(UserRole::Coach));
    let start = Utc::now() + Duration::days(1);
    let request = json_request(
        "POST",
        "/api/v1/events",
        Some(&auth),
        json!({
            "title": "Lesson",
            "event_type": "lesson",
            "start_time": start,
            "end_time": start - Duration::minutes(30),
        }),
    );

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_event_listing_with_inverted_range_is_rejected() {
    let Some(router) = db_router().await else {
        return;
    };
    let auth = bearer_for(&session(UserRole::Coach));
    let now = Utc::now();
    let uri = format!(
        "/api/v1/events?from={}&to={}",
        urlencode(&now.to_rfc3339()),
        urlencode(&(now - Duration::days(1)).to_rfc3339())
    );

    let response = router.oneshot(get_request(&uri, Some(&auth))).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error_code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let Some(router) = db_router().await else {
        return;
    };
    let auth = bearer_for(&session(UserRole::Coach));
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/clients")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, auth)
        .body(Body::from("{ not json"))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_settings_reject_out_of_range_lesson_length() {
    let Some(router) = db_router().await else {
        return;
    };
    let auth = bearer_for(&session(UserRole::Client));
    let request = json_request(
        "PUT",
        "/api/v1/settings",
        Some(&auth),
        json!({ "default_lesson_minutes": 5 }),
    );

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[serial]
async fn test_stored_role_overrides_token_role() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let ctx = test_context(pool.clone());
    let admin = create_user(&pool, UserRole::Admin).await;
    let demoted = create_user(&pool, UserRole::Coach).await;

    ctx.admin
        .set_role(admin.user_id, demoted.user_id, UserRole::Client)
        .await
        .unwrap();

    // Token still claims coach
    let response = create_routes(ctx)
        .oneshot(get_request("/api/v1/clients", Some(&bearer_for(&demoted))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

fn urlencode(value: &str) -> String {
    value.replace(':', "%3A").replace('+', "%2B")
}
