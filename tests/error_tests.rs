// SPDX-License-Identifier: MIT

//! Error mapping tests: `AppError` variants must produce the HTTP
//! statuses and machine-readable codes the frontend keys off.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use meli_control::error::AppError;
use serde_json::Value;

async fn rendered(error: AppError) -> (StatusCode, Value) {
    let response = error.into_response();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read error body");
    let body = serde_json::from_slice(&bytes).expect("error body is not JSON");
    (status, body)
}

#[tokio::test]
async fn not_connected_maps_to_401_with_code() {
    let (status, body) = rendered(AppError::NotConnected).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "not_connected");
}

#[tokio::test]
async fn session_expired_maps_to_401_with_code() {
    let (status, body) = rendered(AppError::SessionExpired).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "session_expired");
}

#[tokio::test]
async fn not_found_maps_to_404() {
    let (status, body) = rendered(AppError::NotFound("MLB123".to_string())).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
    assert_eq!(body["details"], "MLB123");
}

#[tokio::test]
async fn bad_request_carries_details() {
    let (status, body) = rendered(AppError::BadRequest("sale_price must be >= 0".to_string())).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");
    assert_eq!(body["details"], "sale_price must be >= 0");
}

#[tokio::test]
async fn upstream_failures_map_to_502() {
    let (status, body) = rendered(AppError::meli(500, "maintenance")).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "meli_error");

    let (status, body) = rendered(AppError::Network("connection reset".to_string())).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "network_error");
}

#[test]
fn reconnect_classification() {
    assert!(AppError::NotConnected.requires_reconnect());
    assert!(AppError::SessionExpired.requires_reconnect());
    assert!(!AppError::meli(500, "maintenance").requires_reconnect());
    assert!(!AppError::NotFound("x".to_string()).requires_reconnect());
    assert!(!AppError::BadRequest("x".to_string()).requires_reconnect());
}
