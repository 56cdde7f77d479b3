// SPDX-License-Identifier: MIT

//! Wire types for the Mercado Livre REST API and derived summaries.

use serde::{Deserialize, Serialize};

/// Authenticated account profile (`GET /users/me`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeliUser {
    pub id: i64,
    pub nickname: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

/// A seller's listing (`GET /items/{id}` and `/items?ids=` batch).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeliItem {
    pub id: String,
    pub title: String,
    pub price: f64,
    #[serde(default)]
    pub available_quantity: i64,
    #[serde(default)]
    pub sold_quantity: i64,
    #[serde(default)]
    pub thumbnail: String,
    #[serde(default)]
    pub permalink: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub category_id: String,
    #[serde(default)]
    pub seller_id: Option<i64>,
}

/// An order (`GET /orders/search`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeliOrder {
    pub id: i64,
    pub status: String,
    pub date_created: String,
    pub total_amount: f64,
    #[serde(default)]
    pub order_items: Vec<MeliOrderItem>,
    #[serde(default)]
    pub buyer: Option<MeliBuyer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeliOrderItem {
    pub item: MeliOrderItemRef,
    pub quantity: i64,
    pub unit_price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeliOrderItemRef {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeliBuyer {
    pub id: i64,
    pub nickname: String,
}

/// A buyer question on one of the seller's listings
/// (`GET /questions/search`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeliQuestion {
    pub id: i64,
    pub text: String,
    pub status: String,
    pub date_created: String,
    #[serde(default)]
    pub item_id: String,
    #[serde(default)]
    pub from: Option<MeliQuestionAuthor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeliQuestionAuthor {
    pub id: i64,
}

// ─── Public search ───────────────────────────────────────────────────

/// A competitor listing from the public site search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketListing {
    pub id: String,
    pub title: String,
    pub price: f64,
    #[serde(default)]
    pub sold_quantity: i64,
    #[serde(default)]
    pub thumbnail: String,
    #[serde(default)]
    pub permalink: String,
    #[serde(default)]
    pub seller: ListingSeller,
    #[serde(default)]
    pub shipping: ListingShipping,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListingSeller {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub power_seller_status: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListingShipping {
    #[serde(default)]
    pub free_shipping: bool,
}

impl ListingSeller {
    /// Top-tier seller flag (platinum or gold status).
    pub fn is_premium(&self) -> bool {
        matches!(self.power_seller_status.as_deref(), Some("platinum" | "gold"))
    }
}

/// Competitor-price statistics for a search query.
///
/// A query with zero competitors is not an error: all numeric fields are
/// zero and `listings` is empty.
#[derive(Debug, Clone, Serialize)]
pub struct MarketSummary {
    pub query: String,
    pub total_results: usize,
    pub min_price: f64,
    pub max_price: f64,
    pub mean_price: f64,
    pub median_price: f64,
    pub suggested_price: f64,
    pub free_shipping_percent: f64,
    pub premium_seller_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub competitiveness: Option<crate::services::fees::Competitiveness>,
    pub listings: Vec<MarketListing>,
}
