// SPDX-License-Identifier: MIT

//! Marketplace fee and margin calculations.
//!
//! Pure functions, no I/O. This module is the single source of truth for
//! fee math: route handlers, the market analyzer and any future order
//! processing all go through it.
//!
//! Callers are responsible for restricting `ListingType` to the closed
//! set of known variants; there is no runtime validation here.

use serde::{Deserialize, Serialize};

/// Default classic-listing fee percent.
pub const DEFAULT_CLASSIC_PERCENT: f64 = 11.0;
/// Default premium-listing fee percent.
pub const DEFAULT_PREMIUM_PERCENT: f64 = 16.0;
/// Below this gross value a flat fee applies (strict less-than).
pub const DEFAULT_FIXED_FEE_THRESHOLD: f64 = 79.00;
/// Flat fee charged once per order below the threshold.
pub const DEFAULT_FIXED_FEE_AMOUNT: f64 = 6.00;

/// Margin ladder evaluated by [`margin_scenarios`], ascending.
pub const SCENARIO_MARGINS: [f64; 7] = [10.0, 15.0, 20.0, 25.0, 30.0, 35.0, 40.0];

/// Marketplace listing tier, each with its own fee percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingType {
    Classic,
    Premium,
}

/// Per-user fee overrides. Absent fields fall back to the defaults.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FeeConfig {
    pub classic_percent: Option<f64>,
    pub premium_percent: Option<f64>,
    pub fixed_fee_threshold: Option<f64>,
    pub fixed_fee_amount: Option<f64>,
}

/// Fee breakdown for a single sale price.
#[derive(Debug, Clone, Serialize)]
pub struct FeeBreakdown {
    pub fee_percent: f64,
    pub fee_percent_amount: f64,
    pub fixed_fee: f64,
    pub total_fees: f64,
}

/// Per-unit profit breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct MarginCalculation {
    pub sale_price: f64,
    pub cost_price: f64,
    pub listing_type: ListingType,
    pub fee_percent: f64,
    pub fixed_fee: f64,
    pub total_fees: f64,
    pub profit: f64,
    pub margin_percent: f64,
}

/// Per-order profit breakdown. The fixed fee is evaluated against the
/// order's gross revenue and charged at most once, never per unit.
#[derive(Debug, Clone, Serialize)]
pub struct OrderProfit {
    pub gross_revenue: f64,
    pub total_cost: f64,
    pub fee_percent: f64,
    pub fixed_fee: f64,
    pub total_fees: f64,
    pub profit: f64,
}

/// Maximum purchase cost for a target margin at an observed market price.
#[derive(Debug, Clone, Serialize)]
pub struct ReverseCalculation {
    pub market_price: f64,
    pub desired_margin_percent: f64,
    pub max_purchase_cost: f64,
    pub expected_profit: f64,
}

/// How a price compares to the competition.
#[derive(Debug, Clone, Serialize)]
pub struct Competitiveness {
    pub status: CompetitivenessStatus,
    pub delta_percent: f64,
    pub recommendation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompetitivenessStatus {
    Excellent,
    Good,
    Regular,
    High,
    VeryHigh,
}

/// Fee percent for a listing type, honoring per-user overrides.
pub fn fee_percent_for(listing_type: ListingType, config: &FeeConfig) -> f64 {
    match listing_type {
        ListingType::Premium => config.premium_percent.unwrap_or(DEFAULT_PREMIUM_PERCENT),
        ListingType::Classic => config.classic_percent.unwrap_or(DEFAULT_CLASSIC_PERCENT),
    }
}

/// Flat fee for a sale price. Applies only strictly below the threshold;
/// a price exactly at the threshold pays no fixed fee.
pub fn fixed_fee_for(sale_price: f64, config: &FeeConfig) -> f64 {
    let threshold = config
        .fixed_fee_threshold
        .unwrap_or(DEFAULT_FIXED_FEE_THRESHOLD);
    let amount = config.fixed_fee_amount.unwrap_or(DEFAULT_FIXED_FEE_AMOUNT);

    if sale_price < threshold {
        amount
    } else {
        0.0
    }
}

/// Total marketplace fees for one sale price.
pub fn compute_fees(sale_price: f64, listing_type: ListingType, config: &FeeConfig) -> FeeBreakdown {
    let fee_percent = fee_percent_for(listing_type, config);
    let fee_percent_amount = sale_price * fee_percent / 100.0;
    let fixed_fee = fixed_fee_for(sale_price, config);

    FeeBreakdown {
        fee_percent,
        fee_percent_amount,
        fixed_fee,
        total_fees: fee_percent_amount + fixed_fee,
    }
}

/// Net profit for a single unit.
///
/// `margin_percent` is defined as 0 when `sale_price` is 0.
pub fn unit_profit(
    sale_price: f64,
    cost_price: f64,
    listing_type: ListingType,
    config: &FeeConfig,
) -> MarginCalculation {
    let fees = compute_fees(sale_price, listing_type, config);
    let profit = sale_price - cost_price - fees.total_fees;
    let margin_percent = if sale_price > 0.0 {
        profit / sale_price * 100.0
    } else {
        0.0
    };

    MarginCalculation {
        sale_price,
        cost_price,
        listing_type,
        fee_percent: fees.fee_percent,
        fixed_fee: fees.fixed_fee,
        total_fees: fees.total_fees,
        profit,
        margin_percent,
    }
}

/// Net profit for an order of `quantity` units.
///
/// Both the percent fee and the fixed-fee threshold check run against the
/// order's gross revenue, so a multi-unit order above the threshold pays
/// no fixed fee even when each unit alone would.
pub fn order_profit(
    unit_price: f64,
    unit_cost: f64,
    quantity: i64,
    listing_type: ListingType,
    config: &FeeConfig,
) -> OrderProfit {
    let gross_revenue = unit_price * quantity as f64;
    let total_cost = unit_cost * quantity as f64;
    let fees = compute_fees(gross_revenue, listing_type, config);

    OrderProfit {
        gross_revenue,
        total_cost,
        fee_percent: fees.fee_percent,
        fixed_fee: fees.fixed_fee,
        total_fees: fees.total_fees,
        profit: gross_revenue - total_cost - fees.total_fees,
    }
}

/// Reverse calculation: the most you can pay for an item and still hit
/// `desired_margin_percent` when selling at `market_price`.
///
/// A negative theoretical cost clamps to 0, signaling the margin target
/// is infeasible at that price.
pub fn max_purchase_cost(
    market_price: f64,
    desired_margin_percent: f64,
    listing_type: ListingType,
    config: &FeeConfig,
) -> ReverseCalculation {
    let fees = compute_fees(market_price, listing_type, config);
    let cost = market_price - fees.total_fees - market_price * desired_margin_percent / 100.0;
    let max_purchase_cost = cost.max(0.0);

    ReverseCalculation {
        market_price,
        desired_margin_percent,
        max_purchase_cost,
        expected_profit: market_price - fees.total_fees - max_purchase_cost,
    }
}

/// Reverse calculations across the fixed margin ladder, ascending.
pub fn margin_scenarios(
    market_price: f64,
    listing_type: ListingType,
    config: &FeeConfig,
) -> Vec<ReverseCalculation> {
    SCENARIO_MARGINS
        .iter()
        .map(|&margin| max_purchase_cost(market_price, margin, listing_type, config))
        .collect()
}

/// Rate a price against competitor statistics.
///
/// Thresholds are checked in priority order; the first match wins.
pub fn rate_competitiveness(
    my_price: f64,
    mean_price: f64,
    median_price: f64,
    min_price: f64,
) -> Competitiveness {
    let delta_percent = if median_price > 0.0 {
        (my_price - median_price) / median_price * 100.0
    } else {
        0.0
    };

    let (status, recommendation) = if my_price <= min_price * 1.05 {
        (
            CompetitivenessStatus::Excellent,
            "Your price is at the market floor; strong buy-box position",
        )
    } else if my_price <= median_price * 0.95 {
        (
            CompetitivenessStatus::Good,
            "Below the median; well positioned against most competitors",
        )
    } else if my_price <= median_price * 1.05 {
        (
            CompetitivenessStatus::Regular,
            "Close to the median; differentiation or a small cut could help",
        )
    } else if my_price <= mean_price * 1.15 {
        (
            CompetitivenessStatus::High,
            "Above the typical price; expect slower sales at this level",
        )
    } else {
        (
            CompetitivenessStatus::VeryHigh,
            "Far above the market; consider repricing",
        )
    };

    Competitiveness {
        status,
        delta_percent,
        recommendation: recommendation.to_string(),
    }
}
