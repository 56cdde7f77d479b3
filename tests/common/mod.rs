// SPDX-License-Identifier: MIT

//! Shared test harness.
//!
//! `MockMeli` is an in-process stand-in for the Mercado Livre API: an
//! axum server on an ephemeral port with a scriptable token endpoint,
//! bearer-checked resource endpoints and call counters. Pointing
//! `MeliService` at it exercises the real HTTP client, token refresh and
//! retry paths with no network access.

use axum::extract::{Form, Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{Duration, Utc};
use meli_control::config::Config;
use meli_control::db::ConfigStore;
use meli_control::models::credentials::TokenUpdate;
use meli_control::routes::create_router;
use meli_control::services::{MarketAnalyzer, MeliService};
use meli_control::AppState;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Remote account id used by every seeded connection.
#[allow(dead_code)]
pub const ML_USER_ID: i64 = 555;

/// Account id reported by the mock token endpoint and `/users/me`.
#[allow(dead_code)]
pub const MOCK_ACCOUNT_ID: i64 = 777;

#[derive(Default)]
struct MockState {
    oauth_calls: AtomicUsize,
    api_calls: AtomicUsize,
    /// When false the token endpoint answers 400 invalid_grant.
    oauth_ok: Mutex<bool>,
    /// Access token minted by the next successful token request.
    issued_access_token: Mutex<String>,
    /// Bearer tokens the resource endpoints accept.
    accepted_tokens: Mutex<Vec<String>>,
    /// When set, `/ping` answers this status regardless of the token.
    forced_status: Mutex<Option<u16>>,
    /// Refresh token received by the most recent token request.
    last_refresh_token: Mutex<Option<String>>,
    /// Query received by the most recent site search.
    last_query: Mutex<Option<String>>,
    /// `status` filter received by the most recent questions search.
    last_question_status: Mutex<Option<String>>,
    search_results: Mutex<Value>,
    questions: Mutex<Value>,
    items: Mutex<HashMap<String, Value>>,
}

/// Handle to a running mock marketplace server.
pub struct MockMeli {
    pub base_url: String,
    state: Arc<MockState>,
}

impl MockMeli {
    /// Start the mock server on an ephemeral local port.
    pub async fn spawn() -> Self {
        let state = Arc::new(MockState {
            oauth_ok: Mutex::new(true),
            issued_access_token: Mutex::new("renewed-token".to_string()),
            search_results: Mutex::new(json!([])),
            questions: Mutex::new(json!([])),
            ..Default::default()
        });

        let app = Router::new()
            .route("/oauth/token", post(oauth_token))
            .route("/ping", get(ping))
            .route("/users/me", get(users_me))
            .route("/sites/{site}/search", get(site_search))
            .route("/questions/search", get(questions_search))
            .route("/items/{id}", get(item_detail))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind mock listener");
        let addr = listener.local_addr().expect("mock listener address");

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock server");
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    #[allow(dead_code)]
    pub fn oauth_calls(&self) -> usize {
        self.state.oauth_calls.load(Ordering::SeqCst)
    }

    #[allow(dead_code)]
    pub fn api_calls(&self) -> usize {
        self.state.api_calls.load(Ordering::SeqCst)
    }

    /// Make the token endpoint fail with 400 invalid_grant.
    #[allow(dead_code)]
    pub fn fail_oauth(&self) {
        *self.state.oauth_ok.lock().unwrap() = false;
    }

    /// Register a bearer token the resource endpoints will accept.
    #[allow(dead_code)]
    pub fn accept_token(&self, token: &str) {
        self.state
            .accepted_tokens
            .lock()
            .unwrap()
            .push(token.to_string());
    }

    /// Force `/ping` to answer a fixed status.
    #[allow(dead_code)]
    pub fn force_status(&self, code: u16) {
        *self.state.forced_status.lock().unwrap() = Some(code);
    }

    #[allow(dead_code)]
    pub fn last_refresh_token(&self) -> Option<String> {
        self.state.last_refresh_token.lock().unwrap().clone()
    }

    #[allow(dead_code)]
    pub fn last_query(&self) -> Option<String> {
        self.state.last_query.lock().unwrap().clone()
    }

    #[allow(dead_code)]
    pub fn set_search_results(&self, results: Value) {
        *self.state.search_results.lock().unwrap() = results;
    }

    #[allow(dead_code)]
    pub fn set_questions(&self, questions: Value) {
        *self.state.questions.lock().unwrap() = questions;
    }

    #[allow(dead_code)]
    pub fn last_question_status(&self) -> Option<String> {
        self.state.last_question_status.lock().unwrap().clone()
    }

    #[allow(dead_code)]
    pub fn insert_item(&self, id: &str, item: Value) {
        self.state
            .items
            .lock()
            .unwrap()
            .insert(id.to_string(), item);
    }
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(String::from)
}

fn authorized(state: &MockState, headers: &HeaderMap) -> bool {
    match bearer(headers) {
        Some(token) => state.accepted_tokens.lock().unwrap().contains(&token),
        None => false,
    }
}

fn reject() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "message": "invalid access token" })),
    )
        .into_response()
}

async fn oauth_token(
    State(state): State<Arc<MockState>>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    state.oauth_calls.fetch_add(1, Ordering::SeqCst);

    if let Some(refresh_token) = form.get("refresh_token") {
        *state.last_refresh_token.lock().unwrap() = Some(refresh_token.clone());
    }

    if !*state.oauth_ok.lock().unwrap() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "invalid_grant" })),
        )
            .into_response();
    }

    let access = state.issued_access_token.lock().unwrap().clone();
    Json(json!({
        "access_token": access,
        "token_type": "Bearer",
        "expires_in": 21600,
        "scope": "offline_access read write",
        "user_id": MOCK_ACCOUNT_ID,
        "refresh_token": format!("{}-refresh", access),
    }))
    .into_response()
}

async fn ping(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.api_calls.fetch_add(1, Ordering::SeqCst);

    if let Some(code) = *state.forced_status.lock().unwrap() {
        let status = StatusCode::from_u16(code).expect("valid forced status");
        return (status, Json(json!({ "message": "forced" }))).into_response();
    }
    if !authorized(&state, &headers) {
        return reject();
    }
    Json(json!({ "ok": true })).into_response()
}

async fn users_me(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.api_calls.fetch_add(1, Ordering::SeqCst);
    if !authorized(&state, &headers) {
        return reject();
    }
    Json(json!({
        "id": MOCK_ACCOUNT_ID,
        "nickname": "MOCKSELLER",
        "email": "seller@example.com",
    }))
    .into_response()
}

async fn site_search(
    State(state): State<Arc<MockState>>,
    Path(_site): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    state.api_calls.fetch_add(1, Ordering::SeqCst);
    *state.last_query.lock().unwrap() = params.get("q").cloned();

    if !authorized(&state, &headers) {
        return reject();
    }
    let results = state.search_results.lock().unwrap().clone();
    Json(json!({ "results": results })).into_response()
}

async fn questions_search(
    State(state): State<Arc<MockState>>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    state.api_calls.fetch_add(1, Ordering::SeqCst);
    *state.last_question_status.lock().unwrap() = params.get("status").cloned();

    if !authorized(&state, &headers) {
        return reject();
    }
    let questions = state.questions.lock().unwrap().clone();
    Json(json!({ "questions": questions })).into_response()
}

async fn item_detail(
    State(state): State<Arc<MockState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    state.api_calls.fetch_add(1, Ordering::SeqCst);
    if !authorized(&state, &headers) {
        return reject();
    }
    match state.items.lock().unwrap().get(&id) {
        Some(item) => Json(item.clone()).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "item not found" })),
        )
            .into_response(),
    }
}

// ─── Service wiring ──────────────────────────────────────────────────

/// Build a `MeliService` over an in-memory store, pointed at the mock.
#[allow(dead_code)]
pub fn test_service(base_url: &str) -> (MeliService, ConfigStore) {
    let mut config = Config::test_default();
    config.meli_api_base = base_url.to_string();

    let store = ConfigStore::in_memory();
    let meli = MeliService::new(&config, store.clone());
    (meli, store)
}

/// Seed a connected account. `expires_in_secs` is relative to now;
/// `None` stores no expiry at all.
#[allow(dead_code)]
pub async fn seed_connection(
    store: &ConfigStore,
    user_id: &str,
    access_token: &str,
    refresh_token: Option<&str>,
    expires_in_secs: Option<i64>,
) {
    let update = TokenUpdate {
        access_token: access_token.to_string(),
        refresh_token: refresh_token.map(String::from),
        expires_at: expires_in_secs.map(|secs| Utc::now() + Duration::seconds(secs)),
    };
    store
        .connect_account(user_id, ML_USER_ID, &update)
        .await
        .expect("failed to seed connection");
}

/// Create a test app with offline in-memory dependencies.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    create_test_app_with_base(&Config::test_default().meli_api_base)
}

/// Create a test app whose marketplace client points at `base_url`
/// (usually a [`MockMeli`]).
#[allow(dead_code)]
pub fn create_test_app_with_base(base_url: &str) -> (axum::Router, Arc<AppState>) {
    let mut config = Config::test_default();
    config.meli_api_base = base_url.to_string();
    let store = ConfigStore::in_memory();
    let meli = MeliService::new(&config, store.clone());
    let analyzer = MarketAnalyzer::new(meli.clone());

    let state = Arc::new(AppState {
        config,
        store,
        meli,
        analyzer,
    });

    (create_router(state.clone()), state)
}
