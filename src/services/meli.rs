// SPDX-License-Identifier: MIT

//! Mercado Livre API client and credential lifecycle.
//!
//! Handles:
//! - OAuth code exchange and silent token refresh (5-minute margin)
//! - Authenticated API calls with one bounded refresh-and-retry on 401/403
//! - Listing, order and public-search endpoints

use crate::config::Config;
use crate::db::ConfigStore;
use crate::error::AppError;
use crate::models::credentials::{MeliCredentials, TokenUpdate};
use crate::models::market::{MarketListing, MeliItem, MeliOrder, MeliQuestion, MeliUser};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use reqwest::Method;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Margin before token expiration when we proactively refresh (5 minutes).
const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Request timeout for all marketplace calls.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Low-level Mercado Livre HTTP client.
#[derive(Clone)]
pub struct MeliClient {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
}

impl MeliClient {
    /// Create a new client with OAuth application credentials.
    pub fn new(base_url: String, client_id: String, client_secret: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("failed to construct HTTP client");

        Self {
            http,
            base_url,
            client_id,
            client_secret,
        }
    }

    /// Exchange an authorization code for a token set.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse, AppError> {
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ])
        .await
    }

    /// Mint a new token pair from a refresh token.
    ///
    /// Refresh tokens rotate: a successful response invalidates the one
    /// that was sent.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, AppError> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse, AppError> {
        let url = format!("{}/oauth/token", self.base_url);
        let response = self
            .http
            .post(&url)
            .form(form)
            .send()
            .await
            .map_err(|e| AppError::Network(format!("Token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::meli(status, body));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Network(format!("Token response parse error: {}", e)))
    }

    /// Issue a single bearer-authenticated request, returning whatever
    /// status the marketplace answered with.
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        access_token: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<reqwest::Response, AppError> {
        let mut request = self
            .http
            .request(method, url)
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, "application/json");

        if let Some(body) = body {
            request = request.json(body);
        }

        request
            .send()
            .await
            .map_err(|e| AppError::Network(e.to_string()))
    }
}

/// Token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenResponse {
    fn as_update(&self, now: DateTime<Utc>) -> TokenUpdate {
        TokenUpdate {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            expires_at: Some(now + Duration::seconds(self.expires_in)),
        }
    }
}

/// Per-user mutex map to serialize proactive refreshes.
pub type RefreshLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

// ─────────────────────────────────────────────────────────────────────────────
// MeliService - token lifecycle and authenticated calls
// ─────────────────────────────────────────────────────────────────────────────

/// High-level Mercado Livre service.
///
/// Owns the rule "always hand back a usable bearer token for a user":
/// reading persisted credentials, silent refresh inside the expiry
/// margin, persisting rotated token pairs, and invalidating credentials
/// only after a confirmed auth failure.
#[derive(Clone)]
pub struct MeliService {
    client: MeliClient,
    store: ConfigStore,
    base_url: String,
    site_id: String,
    refresh_locks: RefreshLocks,
}

impl MeliService {
    /// Build the service from app configuration and the settings store.
    pub fn new(config: &Config, store: ConfigStore) -> Self {
        Self {
            client: MeliClient::new(
                config.meli_api_base.clone(),
                config.meli_app_id.clone(),
                config.meli_secret_key.clone(),
            ),
            store,
            base_url: config.meli_api_base.clone(),
            site_id: config.meli_site_id.clone(),
            refresh_locks: Arc::new(DashMap::new()),
        }
    }

    /// Absolute URL for an API path.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ─── Token Management ────────────────────────────────────────────────────

    /// Get usable credentials for the given user, refreshing proactively
    /// when the access token is inside the expiry margin.
    ///
    /// Deliberately availability-over-strictness:
    /// - a missing expiry timestamp is not evidence of expiry; the token
    ///   is used as-is and a real 401 is handled by [`Self::call`]
    /// - a failed or impossible refresh falls back to the stored access
    ///   token instead of destroying a possibly-working session
    pub async fn get_valid_credentials(
        &self,
        user_id: &str,
    ) -> Result<MeliCredentials, AppError> {
        let tokens = self
            .store
            .get_tokens(user_id)
            .await?
            .ok_or(AppError::NotConnected)?;

        let (access_token, ml_user_id) = match (&tokens.access_token, tokens.ml_user_id) {
            (Some(token), Some(id)) => (token.clone(), id),
            _ => return Err(AppError::NotConnected),
        };

        let credentials = MeliCredentials {
            user_id: user_id.to_string(),
            ml_user_id,
            access_token,
        };

        let now = Utc::now();
        let margin = Duration::seconds(TOKEN_REFRESH_MARGIN_SECS);

        let needs_refresh = match tokens.expires_at {
            // No expiry on record: token may be freshly issued. Use it
            // and let the 401 path sort out a genuinely dead token.
            None => false,
            Some(expires_at) => now >= expires_at - margin,
        };

        if !needs_refresh {
            return Ok(credentials);
        }

        let Some(refresh_token) = tokens.refresh_token else {
            tracing::warn!(user_id, "Refresh due but no refresh token stored, using current token");
            return Ok(credentials);
        };

        // Serialize refreshes per user so concurrent requests don't burn
        // the same rotating refresh token.
        let lock = self
            .refresh_locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Re-read after acquiring the lock: another request may have
        // already refreshed and rotated the tokens.
        let mut refresh_token = refresh_token;
        if let Some(current) = self.store.get_tokens(user_id).await? {
            if let (Some(token), Some(expires_at)) = (&current.access_token, current.expires_at) {
                if Utc::now() < expires_at - margin {
                    return Ok(MeliCredentials {
                        access_token: token.clone(),
                        ..credentials
                    });
                }
            }
            if let Some(current_refresh) = current.refresh_token {
                refresh_token = current_refresh;
            }
        }

        tracing::info!(user_id, "Access token near expiry, silent refresh");

        match self.client.refresh_token(&refresh_token).await {
            Ok(new_tokens) => {
                let update = new_tokens.as_update(Utc::now());
                self.store.set_tokens(user_id, &update).await?;
                tracing::info!(user_id, "Token refreshed and stored");
                Ok(MeliCredentials {
                    access_token: update.access_token,
                    ..credentials
                })
            }
            Err(e) => {
                // Do NOT clear stored credentials on a failed proactive
                // refresh: the current token may still work, and a flaky
                // refresh endpoint must not destroy a live session.
                tracing::warn!(user_id, error = %e, "Silent refresh failed, keeping current token");
                Ok(credentials)
            }
        }
    }

    /// Null out the stored token triple after a confirmed auth failure.
    pub async fn invalidate(&self, user_id: &str) -> Result<(), AppError> {
        tracing::warn!(user_id, "Invalidating Mercado Livre credentials");
        self.store.clear_tokens(user_id).await
    }

    // ─── Authenticated Calls ─────────────────────────────────────────────────

    /// Issue an authenticated request, with exactly one refresh-and-retry
    /// cycle on 401/403.
    ///
    /// Any non-auth status (success, 404, 429, 500, ...) is returned to
    /// the caller unmodified; this method never interprets or retries
    /// those.
    pub async fn call(
        &self,
        method: Method,
        url: &str,
        credentials: &MeliCredentials,
        body: Option<&serde_json::Value>,
    ) -> Result<reqwest::Response, AppError> {
        let response = self
            .client
            .send(method.clone(), url, &credentials.access_token, body)
            .await?;

        let status = response.status().as_u16();
        if status != 401 && status != 403 {
            return Ok(response);
        }

        tracing::warn!(user_id = %credentials.user_id, url, status, "Auth rejection, attempting refresh");

        // Re-load the refresh token: it may have rotated since these
        // credentials were captured.
        let refresh_token = self
            .store
            .get_tokens(&credentials.user_id)
            .await?
            .and_then(|t| t.refresh_token);

        let Some(refresh_token) = refresh_token else {
            self.invalidate(&credentials.user_id).await?;
            return Err(AppError::SessionExpired);
        };

        let new_tokens = match self.client.refresh_token(&refresh_token).await {
            Ok(t) => t,
            Err(e) => {
                tracing::error!(user_id = %credentials.user_id, error = %e, "Refresh failed after 401");
                self.invalidate(&credentials.user_id).await?;
                return Err(AppError::SessionExpired);
            }
        };

        let update = new_tokens.as_update(Utc::now());
        self.store.set_tokens(&credentials.user_id, &update).await?;

        // Retry the original request exactly once with the new token.
        let retried = self
            .client
            .send(method, url, &update.access_token, body)
            .await?;

        let status = retried.status().as_u16();
        if status == 401 || status == 403 {
            // Token renewed but still rejected: an account or permission
            // problem, not token freshness.
            tracing::error!(user_id = %credentials.user_id, url, "Renewed token still rejected");
            self.invalidate(&credentials.user_id).await?;
            return Err(AppError::SessionExpired);
        }

        Ok(retried)
    }

    /// Authenticated GET that decodes a JSON body, mapping non-auth
    /// failures to named errors for route handlers.
    pub async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        credentials: &MeliCredentials,
    ) -> Result<T, AppError> {
        let response = self.call(Method::GET, url, credentials, None).await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status.as_u16() == 404 {
                return Err(AppError::NotFound(url.to_string()));
            }
            return Err(AppError::meli(status.as_u16(), body));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Network(format!("JSON parse error: {}", e)))
    }

    // ─── OAuth Callback Handling ─────────────────────────────────────────────

    /// Handle the OAuth callback: exchange the code and persist the
    /// connection for the app user.
    pub async fn handle_oauth_callback(
        &self,
        user_id: &str,
        code: &str,
        redirect_uri: &str,
    ) -> Result<i64, AppError> {
        let token_response = self.client.exchange_code(code, redirect_uri).await?;

        let ml_user_id = match token_response.user_id {
            Some(id) => id,
            // Token response should carry the account id, but fall back
            // to /users/me if the provider omitted it.
            None => {
                let response = self
                    .client
                    .send(
                        Method::GET,
                        &self.url("/users/me"),
                        &token_response.access_token,
                        None,
                    )
                    .await?;
                let user: MeliUser = response
                    .json()
                    .await
                    .map_err(|e| AppError::Network(format!("JSON parse error: {}", e)))?;
                user.id
            }
        };

        let update = token_response.as_update(Utc::now());
        self.store
            .connect_account(user_id, ml_user_id, &update)
            .await?;

        tracing::info!(user_id, ml_user_id, "Mercado Livre account connected");
        Ok(ml_user_id)
    }

    // ─── API Wrappers ────────────────────────────────────────────────────────

    /// Authenticated account profile.
    pub async fn account(&self, credentials: &MeliCredentials) -> Result<MeliUser, AppError> {
        self.get_json(&self.url("/users/me"), credentials).await
    }

    /// The seller's active listings: id search followed by a detail batch.
    pub async fn list_items(
        &self,
        credentials: &MeliCredentials,
    ) -> Result<Vec<MeliItem>, AppError> {
        let ids_url = self.url(&format!(
            "/users/{}/items/search?limit=50",
            credentials.ml_user_id
        ));
        let ids: ItemIdsResponse = self.get_json(&ids_url, credentials).await?;

        if ids.results.is_empty() {
            return Ok(Vec::new());
        }

        let detail_url = self.url(&format!("/items?ids={}", ids.results.join(",")));
        let envelopes: Vec<ItemEnvelope> = self.get_json(&detail_url, credentials).await?;

        Ok(envelopes.into_iter().filter_map(|e| e.body).collect())
    }

    /// A single listing by id. A 404 surfaces as [`AppError::NotFound`].
    pub async fn get_item(
        &self,
        item_id: &str,
        credentials: &MeliCredentials,
    ) -> Result<MeliItem, AppError> {
        self.get_json(&self.url(&format!("/items/{}", item_id)), credentials)
            .await
    }

    /// Recent orders for the seller, newest first.
    pub async fn list_orders(
        &self,
        credentials: &MeliCredentials,
        paid_only: bool,
    ) -> Result<Vec<MeliOrder>, AppError> {
        let mut url = self.url(&format!(
            "/orders/search?seller={}&sort=date_desc&limit=50",
            credentials.ml_user_id
        ));
        if paid_only {
            url.push_str("&order.status=paid");
        }

        let response: OrdersResponse = self.get_json(&url, credentials).await?;
        Ok(response.results)
    }

    /// Buyer questions on the seller's listings, newest first.
    pub async fn list_questions(
        &self,
        credentials: &MeliCredentials,
        unanswered_only: bool,
    ) -> Result<Vec<MeliQuestion>, AppError> {
        let mut url = self.url(&format!(
            "/questions/search?seller_id={}&sort_fields=date_created&sort_types=DESC&limit=50",
            credentials.ml_user_id
        ));
        if unanswered_only {
            url.push_str("&status=UNANSWERED");
        }

        let response: QuestionsResponse = self.get_json(&url, credentials).await?;
        Ok(response.questions)
    }

    /// Push a stock quantity update to a listing.
    pub async fn update_item_quantity(
        &self,
        credentials: &MeliCredentials,
        item_id: &str,
        quantity: i64,
    ) -> Result<(), AppError> {
        let body = serde_json::json!({ "available_quantity": quantity });
        let url = self.url(&format!("/items/{}", item_id));
        let response = self.call(Method::PUT, &url, credentials, Some(&body)).await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::meli(status.as_u16(), body));
        }
        Ok(())
    }

    /// Public site search for competitor listings.
    pub async fn site_search(
        &self,
        credentials: &MeliCredentials,
        query: &str,
        limit: u32,
    ) -> Result<Vec<MarketListing>, AppError> {
        let url = self.url(&format!(
            "/sites/{}/search?q={}&limit={}&sort=relevance",
            self.site_id,
            urlencoding::encode(query),
            limit
        ));

        let response: SiteSearchResponse = self.get_json(&url, credentials).await?;
        Ok(response.results)
    }
}

#[derive(Deserialize)]
struct ItemIdsResponse {
    #[serde(default)]
    results: Vec<String>,
}

#[derive(Deserialize)]
struct ItemEnvelope {
    #[serde(default)]
    body: Option<MeliItem>,
}

#[derive(Deserialize)]
struct OrdersResponse {
    #[serde(default)]
    results: Vec<MeliOrder>,
}

#[derive(Deserialize)]
struct QuestionsResponse {
    #[serde(default)]
    questions: Vec<MeliQuestion>,
}

#[derive(Deserialize)]
struct SiteSearchResponse {
    #[serde(default)]
    results: Vec<MarketListing>,
}
