// SPDX-License-Identifier: MIT

//! Mercado Livre OAuth authorization routes.
//!
//! The authorization URL is handed out by a protected API route (the app
//! user must already be logged in); the callback below is public because
//! the marketplace redirects the browser to it. The `state` parameter
//! carries the app user id, HMAC-signed so the callback can trust it.

use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::get,
    Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{AppError, Result};
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Signed state expires after 15 minutes.
const STATE_MAX_AGE_MS: u128 = 15 * 60 * 1000;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/auth/meli/callback", get(auth_callback))
}

/// Build the marketplace authorization URL for a logged-in app user.
pub fn build_authorization_url(
    state: &AppState,
    user_id: &str,
    callback_url: &str,
) -> Result<String> {
    let oauth_state = sign_state(user_id, &state.config.oauth_state_key)?;

    Ok(format!(
        "{}/authorization?response_type=code&client_id={}&redirect_uri={}&state={}",
        state.config.meli_auth_base,
        state.config.meli_app_id,
        urlencoding::encode(callback_url),
        oauth_state
    ))
}

/// Reconstruct the callback URL the provider was told to redirect to.
pub fn callback_url_from_host(headers: &axum::http::HeaderMap) -> String {
    let host = headers
        .get(axum::http::header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost:8080");

    let scheme = if host.contains("localhost") || host.contains("127.0.0.1") {
        "http"
    } else {
        "https"
    };

    format!("{}://{}/auth/meli/callback", scheme, host)
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    state: String,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback - exchange the code, persist the connection, redirect
/// back to the frontend settings page.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Result<Redirect> {
    let settings_url = format!("{}/settings", state.config.frontend_url);

    let Some(user_id) = verify_and_decode_state(&params.state, &state.config.oauth_state_key)
    else {
        tracing::warn!("Invalid or tampered OAuth state parameter");
        return Ok(Redirect::temporary(&format!(
            "{}?meli_error=invalid_state",
            settings_url
        )));
    };

    // Check for OAuth errors (user denied, etc.)
    if let Some(error) = params.error {
        tracing::warn!(error = %error, user_id = %user_id, "OAuth error from Mercado Livre");
        let redirect = format!("{}?meli_error={}", settings_url, urlencoding::encode(&error));
        return Ok(Redirect::temporary(&redirect));
    }

    let Some(code) = params.code else {
        return Err(AppError::BadRequest("missing authorization code".to_string()));
    };

    let callback_url = callback_url_from_host(&headers);

    tracing::info!(user_id = %user_id, "Exchanging authorization code for tokens");

    let ml_user_id = state
        .meli
        .handle_oauth_callback(&user_id, &code, &callback_url)
        .await?;

    tracing::info!(user_id = %user_id, ml_user_id, "OAuth successful, connection stored");

    Ok(Redirect::temporary(&format!(
        "{}?meli=connected",
        settings_url
    )))
}

/// Sign the app user id into an OAuth state token.
///
/// Format (before base64): "user_id|timestamp_hex|signature_hex".
fn sign_state(user_id: &str, secret: &[u8]) -> Result<String> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis();

    let payload = format!("{}|{:x}", user_id, timestamp);

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(payload.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    Ok(URL_SAFE_NO_PAD.encode(format!("{}|{}", payload, signature).as_bytes()))
}

/// Verify a state token and return the app user id it carries.
fn verify_and_decode_state(encoded: &str, secret: &[u8]) -> Option<String> {
    let decoded = URL_SAFE_NO_PAD.decode(encoded.as_bytes()).ok()?;
    let state_str = String::from_utf8(decoded).ok()?;

    let parts: Vec<&str> = state_str.splitn(3, '|').collect();
    if parts.len() != 3 {
        return None;
    }

    let user_id = parts[0];
    let timestamp_hex = parts[1];
    let signature_hex = parts[2];

    let payload = format!("{}|{}", user_id, timestamp_hex);

    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(payload.as_bytes());
    let expected_signature = hex::encode(mac.finalize().into_bytes());

    if signature_hex != expected_signature {
        tracing::error!("OAuth state signature mismatch! Potential tampering.");
        return None;
    }

    let timestamp = u128::from_str_radix(timestamp_hex, 16).ok()?;
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()?
        .as_millis();
    if now.saturating_sub(timestamp) > STATE_MAX_AGE_MS {
        tracing::warn!("Expired OAuth state parameter");
        return None;
    }

    Some(user_id.to_string())
}
