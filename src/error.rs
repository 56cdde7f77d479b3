// SPDX-License-Identifier: MIT

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Mercado Livre account not connected")]
    NotConnected,

    #[error("Mercado Livre session expired")]
    SessionExpired,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Mercado Livre API error (HTTP {status}): {message}")]
    MeliApi { status: u16, message: String },

    #[error("Network error calling Mercado Livre: {0}")]
    Network(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Build a provider error from an upstream status and response body.
    pub fn meli(status: u16, message: impl Into<String>) -> Self {
        AppError::MeliApi {
            status,
            message: message.into(),
        }
    }

    /// True for errors that should route the user back to the
    /// authorization flow rather than being retried.
    pub fn requires_reconnect(&self) -> bool {
        matches!(self, AppError::NotConnected | AppError::SessionExpired)
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token", None),
            AppError::NotConnected => (
                StatusCode::UNAUTHORIZED,
                "not_connected",
                Some("Connect your Mercado Livre account in settings".to_string()),
            ),
            AppError::SessionExpired => (
                StatusCode::UNAUTHORIZED,
                "session_expired",
                Some("Reconnect your Mercado Livre account".to_string()),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::MeliApi { status, message } => (
                StatusCode::BAD_GATEWAY,
                "meli_error",
                Some(format!("HTTP {}: {}", status, message)),
            ),
            AppError::Network(msg) => {
                tracing::warn!(error = %msg, "Upstream network error");
                (StatusCode::BAD_GATEWAY, "network_error", None)
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
