mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use chrono::Duration;
use common::{body_json, TestApp, TEST_JWT_SECRET};
use hobby_auth::services::generate_token;

async fn assert_rejected(app: &TestApp, request: Request<Body>) {
    let response = app.request(request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "invalid token");
}

fn me_with_header(value: &str) -> Request<Body> {
    Request::builder()
        .uri("/users/me")
        .header(header::AUTHORIZATION, value)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn valid_token_reaches_protected_route() {
    let app = TestApp::spawn();
    let token = app.register("me@example.com", "password123", "Me").await;

    let response = app.get_with_bearer("/users/me", &token).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["email"], "me@example.com");
    assert_eq!(body["name"], "Me");
    assert_eq!(body["hasPassword"], true);
    assert!(body.get("passwordHash").is_none());
}

#[tokio::test]
async fn missing_header_is_rejected() {
    let app = TestApp::spawn();
    assert_rejected(
        &app,
        Request::builder().uri("/users/me").body(Body::empty()).unwrap(),
    )
    .await;
}

#[tokio::test]
async fn malformed_headers_are_rejected() {
    let app = TestApp::spawn();
    let token = app.register("fmt@example.com", "password123", "F").await;

    for value in [
        token.clone(),
        format!("Basic {}", token),
        format!("bearer {}", token),
        "Bearer ".to_string(),
        format!("Bearer {} extra", token),
    ] {
        assert_rejected(&app, me_with_header(&value)).await;
    }
}

#[tokio::test]
async fn tampered_token_is_rejected() {
    let app = TestApp::spawn();
    let token = app.register("tamper@example.com", "password123", "T").await;

    let (unsigned, signature) = token.rsplit_once('.').unwrap();
    let forged = format!("{}.{}", unsigned, "x".repeat(signature.len()));

    assert_rejected(&app, me_with_header(&format!("Bearer {}", forged))).await;
}

#[tokio::test]
async fn token_signed_with_another_secret_is_rejected() {
    let app = TestApp::spawn();
    let token = generate_token(
        "some-user",
        "x@example.com",
        b"a-completely-different-secret-value",
        Duration::minutes(5),
    )
    .unwrap();

    assert_rejected(&app, me_with_header(&format!("Bearer {}", token))).await;
}

#[tokio::test]
async fn expired_token_is_rejected() {
    let app = TestApp::spawn();
    let token = generate_token(
        "some-user",
        "x@example.com",
        TEST_JWT_SECRET.as_bytes(),
        Duration::seconds(-30),
    )
    .unwrap();

    assert_rejected(&app, me_with_header(&format!("Bearer {}", token))).await;
}

#[tokio::test]
async fn valid_token_for_deleted_user_is_not_found() {
    let app = TestApp::spawn();
    let token = generate_token(
        "no-such-user",
        "ghost@example.com",
        TEST_JWT_SECRET.as_bytes(),
        Duration::minutes(5),
    )
    .unwrap();

    let response = app.get_with_bearer("/users/me", &token).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "user not found");
}
