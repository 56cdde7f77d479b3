// SPDX-License-Identifier: MIT

//! Backend API for a small-business sales manager integrated with the
//! Mercado Livre marketplace: credential lifecycle, fee and margin
//! calculations, and competitor-price analysis.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::ConfigStore;
use services::{MarketAnalyzer, MeliService};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: ConfigStore,
    pub meli: MeliService,
    pub analyzer: MarketAnalyzer,
}
