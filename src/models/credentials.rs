//! Mercado Livre credential models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Token fields persisted in the user's settings row.
///
/// Any field may be null: a row exists as soon as the user saves any
/// setting, before (or after) the marketplace account is connected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoredTokens {
    /// Remote Mercado Livre account ID; absence means "not connected"
    pub ml_user_id: Option<i64>,
    /// Short-lived bearer token
    pub access_token: Option<String>,
    /// Rotating refresh token (single-use per marketplace contract)
    pub refresh_token: Option<String>,
    /// Absolute access-token expiry; may be missing for freshly-issued
    /// tokens whose expiry write raced
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredTokens {
    /// Whether the row represents a connected account.
    ///
    /// `access_token` and `ml_user_id` must both be present; a partial
    /// state is treated as disconnected.
    pub fn is_connected(&self) -> bool {
        self.access_token.is_some() && self.ml_user_id.is_some()
    }
}

/// A validated, usable credential set handed to API callers.
#[derive(Debug, Clone)]
pub struct MeliCredentials {
    /// Owning app user (settings row key)
    pub user_id: String,
    /// Remote Mercado Livre account ID
    pub ml_user_id: i64,
    /// Bearer token believed to be usable right now
    pub access_token: String,
}

/// Replacement token triple written after a successful refresh or code
/// exchange. Always persisted as a single atomic update so a concurrent
/// refresh can never produce a mismatched access/refresh pair.
#[derive(Debug, Clone)]
pub struct TokenUpdate {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// `None` tolerates a provider response without a usable expiry; the
    /// token is then used until a 401 proves otherwise.
    pub expires_at: Option<DateTime<Utc>>,
}
