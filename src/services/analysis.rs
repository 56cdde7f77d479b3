// SPDX-License-Identifier: MIT

//! Competitor-price analysis over the public marketplace search.

use crate::error::AppError;
use crate::models::market::{MarketListing, MarketSummary};
use crate::services::fees;
use crate::services::meli::MeliService;

/// Cap on competitor listings fetched per analysis.
const MAX_SEARCH_RESULTS: u32 = 50;

/// Listings echoed back in the summary (statistics still use all of them).
const MAX_LISTINGS_RETURNED: usize = 20;

/// What to analyze: a free-text query, a listing id, or both.
#[derive(Debug, Clone, Default)]
pub struct AnalysisRequest {
    /// Search query; when absent, resolved from the item's title
    pub query: Option<String>,
    /// The seller's own listing, used for query resolution and
    /// self-exclusion from the statistics
    pub item_id: Option<String>,
    /// Competitor listings to fetch (clamped to 50)
    pub limit: Option<u32>,
    /// When given, the summary includes a competitiveness rating
    pub my_price: Option<f64>,
}

/// Market analyzer composing the fee calculator with live search data.
#[derive(Clone)]
pub struct MarketAnalyzer {
    meli: MeliService,
}

impl MarketAnalyzer {
    pub fn new(meli: MeliService) -> Self {
        Self { meli }
    }

    /// Analyze the competition for a query or an existing listing.
    ///
    /// Zero competitors is not an error: the summary comes back with all
    /// statistics zeroed and an empty listings array.
    pub async fn analyze(
        &self,
        user_id: &str,
        request: AnalysisRequest,
    ) -> Result<MarketSummary, AppError> {
        let credentials = self.meli.get_valid_credentials(user_id).await?;

        // When an item id is given, fetch it: the title resolves a
        // missing query and the seller id drives self-exclusion.
        let own_item = match &request.item_id {
            Some(item_id) => Some(self.meli.get_item(item_id, &credentials).await?),
            None => None,
        };

        let query = match (request.query, &own_item) {
            (Some(q), _) => q,
            (None, Some(item)) => item.title.clone(),
            (None, None) => {
                return Err(AppError::BadRequest(
                    "either 'q' or 'item_id' is required".to_string(),
                ))
            }
        };

        let limit = request.limit.unwrap_or(MAX_SEARCH_RESULTS).min(MAX_SEARCH_RESULTS);
        let mut listings = self.meli.site_search(&credentials, &query, limit).await?;

        // Statistics should reflect competitors only.
        if let Some(my_seller_id) = own_item.as_ref().and_then(|i| i.seller_id) {
            listings.retain(|listing| listing.seller.id != my_seller_id);
        }

        Ok(Self::summarize(query, listings, request.my_price))
    }

    fn summarize(
        query: String,
        listings: Vec<MarketListing>,
        my_price: Option<f64>,
    ) -> MarketSummary {
        if listings.is_empty() {
            return MarketSummary {
                query,
                total_results: 0,
                min_price: 0.0,
                max_price: 0.0,
                mean_price: 0.0,
                median_price: 0.0,
                suggested_price: 0.0,
                free_shipping_percent: 0.0,
                premium_seller_count: 0,
                competitiveness: None,
                listings: Vec::new(),
            };
        }

        let total = listings.len();
        let prices: Vec<f64> = listings.iter().map(|l| l.price).collect();

        let min_price = prices.iter().copied().fold(f64::INFINITY, f64::min);
        let max_price = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean_price = prices.iter().sum::<f64>() / total as f64;
        let median_price = median(&prices);

        // Aim 5% under the median, but never undercut the observed floor
        // by more than 5%.
        let suggested_price = (median_price * 0.95).max(min_price * 1.05);

        let free_shipping = listings.iter().filter(|l| l.shipping.free_shipping).count();
        let premium_seller_count = listings.iter().filter(|l| l.seller.is_premium()).count();

        let competitiveness = my_price
            .map(|price| fees::rate_competitiveness(price, mean_price, median_price, min_price));

        let mut listings = listings;
        listings.truncate(MAX_LISTINGS_RETURNED);

        MarketSummary {
            query,
            total_results: total,
            min_price,
            max_price,
            mean_price,
            median_price,
            suggested_price,
            free_shipping_percent: free_shipping as f64 / total as f64 * 100.0,
            premium_seller_count,
            competitiveness,
            listings,
        }
    }
}

/// Standard median: average of the two middle values for even counts.
fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 != 0 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    }
}
