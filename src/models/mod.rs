// SPDX-License-Identifier: MIT

//! Data models for the application.

pub mod credentials;
pub mod market;

pub use credentials::{MeliCredentials, StoredTokens, TokenUpdate};
pub use market::{MarketListing, MarketSummary, MeliItem, MeliOrder, MeliQuestion, MeliUser};
