//! Application configuration loaded from environment variables.
//!
//! Everything is read once at startup and injected into services by
//! constructor. Business logic never reads ambient environment state.

use std::env;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Mercado Livre application ID (public)
    pub meli_app_id: String,
    /// Mercado Livre API base URL (overridable for tests)
    pub meli_api_base: String,
    /// Mercado Livre authorization page base URL
    pub meli_auth_base: String,
    /// Marketplace site for public search (MLB = Brazil)
    pub meli_site_id: String,
    /// Frontend URL for OAuth redirects
    pub frontend_url: String,
    /// Server port
    pub port: u16,

    // --- Secrets ---
    /// Mercado Livre application secret
    pub meli_secret_key: String,
    /// Postgres connection string
    pub database_url: String,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// HMAC key for signing the OAuth `state` parameter
    pub oauth_state_key: Vec<u8>,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            meli_app_id: "test_app_id".to_string(),
            meli_api_base: "https://api.mercadolibre.com".to_string(),
            meli_auth_base: "https://auth.mercadolivre.com.br".to_string(),
            meli_site_id: "MLB".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            port: 8080,
            meli_secret_key: "test_secret".to_string(),
            database_url: "postgres://localhost/meli_control_test".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            oauth_state_key: b"test_oauth_state_key_32_bytes!!".to_vec(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            meli_app_id: env::var("MELI_APP_ID").map_err(|_| ConfigError::Missing("MELI_APP_ID"))?,
            meli_api_base: env::var("MELI_API_BASE")
                .unwrap_or_else(|_| "https://api.mercadolibre.com".to_string()),
            meli_auth_base: env::var("MELI_AUTH_BASE")
                .unwrap_or_else(|_| "https://auth.mercadolivre.com.br".to_string()),
            meli_site_id: env::var("MELI_SITE_ID").unwrap_or_else(|_| "MLB".to_string()),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),

            meli_secret_key: env::var("MELI_SECRET_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("MELI_SECRET_KEY"))?,
            database_url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::Missing("DATABASE_URL"))?,
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            oauth_state_key: env::var("OAUTH_STATE_KEY")
                .map_err(|_| ConfigError::Missing("OAUTH_STATE_KEY"))?
                .into_bytes(),
        })
    }

    /// Config for tests (no environment reads).
    pub fn test_default() -> Self {
        Self::default()
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}
