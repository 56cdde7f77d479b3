// SPDX-License-Identifier: MIT

//! API routes for authenticated app users.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::market::{MarketSummary, MeliItem, MeliOrder, MeliQuestion};
use crate::services::analysis::AnalysisRequest;
use crate::services::fees::{
    self, FeeBreakdown, FeeConfig, ListingType, MarginCalculation, OrderProfit,
    ReverseCalculation,
};
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/meli/connect-url", get(get_connect_url))
        .route("/api/meli/status", get(get_status))
        .route("/api/meli/disconnect", post(disconnect))
        .route("/api/meli/items", get(get_items))
        .route("/api/meli/orders", get(get_orders))
        .route("/api/meli/questions", get(get_questions))
        .route("/api/meli/stock", post(update_stock))
        .route("/api/analysis", get(analyze))
        .route("/api/calculations/fees", post(calc_fees))
        .route("/api/calculations/margin", post(calc_margin))
        .route("/api/calculations/order", post(calc_order))
        .route("/api/calculations/reverse", post(calc_reverse))
        .route("/api/settings/fees", get(get_fee_settings))
        .route("/api/settings/fees", put(set_fee_settings))
}

// ─── Connection Management ───────────────────────────────────

#[derive(Serialize)]
struct ConnectUrlResponse {
    url: String,
}

/// Authorization URL for connecting the user's Mercado Livre account.
async fn get_connect_url(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    headers: axum::http::HeaderMap,
) -> Result<Json<ConnectUrlResponse>> {
    let callback_url = super::auth::callback_url_from_host(&headers);
    let url = super::auth::build_authorization_url(&state, &user.user_id, &callback_url)?;

    Ok(Json(ConnectUrlResponse { url }))
}

#[derive(Serialize)]
struct StatusResponse {
    connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    ml_user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    nickname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
}

/// Connection status, verified against the live API.
async fn get_status(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<StatusResponse>> {
    let credentials = match state.meli.get_valid_credentials(&user.user_id).await {
        Ok(c) => c,
        Err(e) if e.requires_reconnect() => {
            return Ok(Json(StatusResponse {
                connected: false,
                ml_user_id: None,
                nickname: None,
                email: None,
            }));
        }
        Err(e) => return Err(e),
    };

    let account = state.meli.account(&credentials).await?;

    Ok(Json(StatusResponse {
        connected: true,
        ml_user_id: Some(account.id),
        nickname: Some(account.nickname),
        email: account.email,
    }))
}

#[derive(Serialize)]
struct DisconnectResponse {
    success: bool,
}

/// Drop the stored Mercado Livre connection.
async fn disconnect(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<DisconnectResponse>> {
    tracing::info!(user_id = %user.user_id, "User-initiated disconnect");
    state.store.disconnect(&user.user_id).await?;

    Ok(Json(DisconnectResponse { success: true }))
}

// ─── Listings & Orders ───────────────────────────────────────

/// The seller's listings.
async fn get_items(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<MeliItem>>> {
    let credentials = state.meli.get_valid_credentials(&user.user_id).await?;
    let items = state.meli.list_items(&credentials).await?;

    Ok(Json(items))
}

#[derive(Deserialize)]
struct OrdersQuery {
    /// "paid" (default) or "all"
    #[serde(default)]
    status: Option<String>,
}

/// Recent orders, newest first.
async fn get_orders(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<OrdersQuery>,
) -> Result<Json<Vec<MeliOrder>>> {
    let paid_only = !matches!(query.status.as_deref(), Some("all"));

    let credentials = state.meli.get_valid_credentials(&user.user_id).await?;
    let orders = state.meli.list_orders(&credentials, paid_only).await?;

    Ok(Json(orders))
}

#[derive(Deserialize)]
struct QuestionsQuery {
    /// "unanswered" (default) or "all"
    #[serde(default)]
    status: Option<String>,
}

/// Buyer questions awaiting an answer, newest first.
async fn get_questions(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<QuestionsQuery>,
) -> Result<Json<Vec<MeliQuestion>>> {
    let unanswered_only = !matches!(query.status.as_deref(), Some("all"));

    let credentials = state.meli.get_valid_credentials(&user.user_id).await?;
    let questions = state
        .meli
        .list_questions(&credentials, unanswered_only)
        .await?;

    Ok(Json(questions))
}

#[derive(Deserialize)]
struct StockUpdateRequest {
    item_id: String,
    quantity: i64,
}

#[derive(Serialize)]
struct StockUpdateResponse {
    success: bool,
}

/// Push a local stock quantity to the marketplace listing.
async fn update_stock(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<StockUpdateRequest>,
) -> Result<Json<StockUpdateResponse>> {
    if request.quantity < 0 {
        return Err(AppError::BadRequest("quantity must be >= 0".to_string()));
    }

    let credentials = state.meli.get_valid_credentials(&user.user_id).await?;
    state
        .meli
        .update_item_quantity(&credentials, &request.item_id, request.quantity)
        .await?;

    tracing::info!(
        user_id = %user.user_id,
        item_id = %request.item_id,
        quantity = request.quantity,
        "Stock synced to marketplace"
    );

    Ok(Json(StockUpdateResponse { success: true }))
}

// ─── Market Analysis ─────────────────────────────────────────

#[derive(Deserialize)]
struct AnalysisQuery {
    q: Option<String>,
    item_id: Option<String>,
    limit: Option<u32>,
    my_price: Option<f64>,
}

/// Competitor-price analysis for a query or an existing listing.
async fn analyze(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<AnalysisQuery>,
) -> Result<Json<MarketSummary>> {
    let request = AnalysisRequest {
        query: query.q,
        item_id: query.item_id,
        limit: query.limit,
        my_price: query.my_price,
    };

    let summary = state.analyzer.analyze(&user.user_id, request).await?;
    Ok(Json(summary))
}

// ─── Calculations ────────────────────────────────────────────

#[derive(Deserialize)]
struct FeesRequest {
    sale_price: f64,
    listing_type: ListingType,
}

/// Marketplace fees for a sale price.
async fn calc_fees(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<FeesRequest>,
) -> Result<Json<FeeBreakdown>> {
    validate_price(request.sale_price, "sale_price")?;
    let config = state.store.fee_config(&user.user_id).await?;

    Ok(Json(fees::compute_fees(
        request.sale_price,
        request.listing_type,
        &config,
    )))
}

#[derive(Deserialize)]
struct MarginRequest {
    sale_price: f64,
    cost_price: f64,
    listing_type: ListingType,
}

/// Per-unit profit and margin.
async fn calc_margin(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<MarginRequest>,
) -> Result<Json<MarginCalculation>> {
    validate_price(request.sale_price, "sale_price")?;
    validate_price(request.cost_price, "cost_price")?;
    let config = state.store.fee_config(&user.user_id).await?;

    Ok(Json(fees::unit_profit(
        request.sale_price,
        request.cost_price,
        request.listing_type,
        &config,
    )))
}

#[derive(Deserialize)]
struct OrderRequest {
    unit_price: f64,
    unit_cost: f64,
    quantity: i64,
    listing_type: ListingType,
}

/// Profit for a multi-unit order (fixed fee applied once per order).
async fn calc_order(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<OrderRequest>,
) -> Result<Json<OrderProfit>> {
    validate_price(request.unit_price, "unit_price")?;
    validate_price(request.unit_cost, "unit_cost")?;
    if request.quantity <= 0 {
        return Err(AppError::BadRequest("quantity must be > 0".to_string()));
    }
    let config = state.store.fee_config(&user.user_id).await?;

    Ok(Json(fees::order_profit(
        request.unit_price,
        request.unit_cost,
        request.quantity,
        request.listing_type,
        &config,
    )))
}

#[derive(Deserialize)]
struct ReverseRequest {
    market_price: f64,
    desired_margin_percent: Option<f64>,
    listing_type: ListingType,
}

#[derive(Serialize)]
struct ReverseResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<ReverseCalculation>,
    scenarios: Vec<ReverseCalculation>,
}

/// Reverse calculation: max purchase cost for a target margin, plus the
/// standard margin ladder.
async fn calc_reverse(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<ReverseRequest>,
) -> Result<Json<ReverseResponse>> {
    validate_price(request.market_price, "market_price")?;
    let config = state.store.fee_config(&user.user_id).await?;

    let target = request.desired_margin_percent.map(|margin| {
        fees::max_purchase_cost(request.market_price, margin, request.listing_type, &config)
    });

    Ok(Json(ReverseResponse {
        target,
        scenarios: fees::margin_scenarios(request.market_price, request.listing_type, &config),
    }))
}

// ─── Fee Settings ────────────────────────────────────────────

/// The user's fee overrides (absent fields mean defaults).
async fn get_fee_settings(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<FeeConfig>> {
    Ok(Json(state.store.fee_config(&user.user_id).await?))
}

/// Replace the user's fee overrides.
async fn set_fee_settings(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(config): Json<FeeConfig>,
) -> Result<Json<FeeConfig>> {
    for (value, name) in [
        (config.classic_percent, "classic_percent"),
        (config.premium_percent, "premium_percent"),
        (config.fixed_fee_threshold, "fixed_fee_threshold"),
        (config.fixed_fee_amount, "fixed_fee_amount"),
    ] {
        if let Some(v) = value {
            if !v.is_finite() || v < 0.0 {
                return Err(AppError::BadRequest(format!("{} must be >= 0", name)));
            }
        }
    }

    state.store.set_fee_config(&user.user_id, &config).await?;
    Ok(Json(config))
}

fn validate_price(value: f64, name: &str) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(AppError::BadRequest(format!("{} must be >= 0", name)));
    }
    Ok(())
}
