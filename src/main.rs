// SPDX-License-Identifier: MIT

//! Meli-Control API Server
//!
//! Backend for a small-business inventory/sales manager integrated with
//! the Mercado Livre marketplace.

use meli_control::{
    config::Config,
    db::ConfigStore,
    services::{MarketAnalyzer, MeliService},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Meli-Control API");

    // Connect to Postgres and run migrations
    let store = ConfigStore::connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Initialize marketplace service and analyzer
    let meli = MeliService::new(&config, store.clone());
    let analyzer = MarketAnalyzer::new(meli.clone());

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        store,
        meli,
        analyzer,
    });

    // Build router
    let app = meli_control::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("meli_control=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
