// SPDX-License-Identifier: MIT

//! OAuth connection flow tests.
//!
//! The callback is a public route; everything it trusts comes from the
//! HMAC-signed `state` parameter. These tests drive the full flow
//! against the mock token endpoint.

mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use common::{MockMeli, MOCK_ACCOUNT_ID};
use meli_control::middleware::auth::create_jwt;
use meli_control::routes::auth::build_authorization_url;
use tower::ServiceExt;

const USER: &str = "user-1";

/// Pull the signed `state` value out of a freshly built authorization URL.
fn signed_state(state: &meli_control::AppState) -> String {
    let url = build_authorization_url(state, USER, "http://localhost:8080/auth/meli/callback")
        .expect("failed to build authorization URL");
    url.split("state=")
        .nth(1)
        .expect("authorization URL has no state parameter")
        .to_string()
}

fn location(response: &axum::response::Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[tokio::test]
async fn callback_rejects_invalid_state() {
    let (app, state) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/auth/meli/callback?code=abc&state=bogus")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        location(&response),
        format!("{}/settings?meli_error=invalid_state", state.config.frontend_url)
    );
}

#[tokio::test]
async fn callback_forwards_provider_error() {
    let (app, state) = common::create_test_app();
    let oauth_state = signed_state(&state);

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!(
                    "/auth/meli/callback?error=access_denied&state={}",
                    oauth_state
                ))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert!(location(&response).ends_with("?meli_error=access_denied"));
}

#[tokio::test]
async fn callback_exchanges_code_and_stores_connection() {
    let mock = MockMeli::spawn().await;
    let (app, state) = common::create_test_app_with_base(&mock.base_url);
    let oauth_state = signed_state(&state);

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!(
                    "/auth/meli/callback?code=auth-code-1&state={}",
                    oauth_state
                ))
                .header(header::HOST, "localhost:8080")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert!(location(&response).ends_with("?meli=connected"));
    assert_eq!(mock.oauth_calls(), 1);

    let stored = state.store.get_tokens(USER).await.unwrap().unwrap();
    assert!(stored.is_connected());
    assert_eq!(stored.ml_user_id, Some(MOCK_ACCOUNT_ID));
    assert_eq!(stored.access_token.as_deref(), Some("renewed-token"));
    assert_eq!(stored.refresh_token.as_deref(), Some("renewed-token-refresh"));
}

#[tokio::test]
async fn callback_without_code_is_bad_request() {
    let (app, state) = common::create_test_app();
    let oauth_state = signed_state(&state);

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/auth/meli/callback?state={}", oauth_state))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn disconnect_drops_account_link() {
    let mock = MockMeli::spawn().await;
    let (app, state) = common::create_test_app_with_base(&mock.base_url);
    common::seed_connection(&state.store, USER, "live-token", Some("refresh-1"), Some(3600)).await;
    let token = create_jwt(USER, &state.config.jwt_signing_key).unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/meli/disconnect")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let stored = state.store.get_tokens(USER).await.unwrap().unwrap();
    assert!(!stored.is_connected());
    assert_eq!(stored.ml_user_id, None);
    assert!(stored.refresh_token.is_none());
}
