// SPDX-License-Identifier: MIT

//! Settings store with typed operations.
//!
//! One row per app user holds the Mercado Livre connection (account id +
//! token triple) and the fee overrides. Backed by Postgres in production;
//! an in-memory backend supports offline tests.

use crate::error::AppError;
use crate::models::credentials::{StoredTokens, TokenUpdate};
use crate::services::fees::FeeConfig;
use dashmap::DashMap;
use sqlx::postgres::PgPoolOptions;
use sqlx::Row;
use std::sync::Arc;

/// Settings store client.
#[derive(Clone)]
pub struct ConfigStore {
    backend: Backend,
}

#[derive(Clone)]
enum Backend {
    Postgres(sqlx::PgPool),
    Memory(Arc<DashMap<String, MemRow>>),
}

#[derive(Clone, Default)]
struct MemRow {
    tokens: StoredTokens,
    fees: FeeConfig,
}

impl ConfigStore {
    /// Connect to Postgres and run pending migrations.
    pub async fn connect(database_url: &str) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Postgres: {}", e)))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| AppError::Database(format!("Migration failed: {}", e)))?;

        tracing::info!("Connected to Postgres");

        Ok(Self {
            backend: Backend::Postgres(pool),
        })
    }

    /// Create an in-memory store for testing (no database required).
    pub fn in_memory() -> Self {
        Self {
            backend: Backend::Memory(Arc::new(DashMap::new())),
        }
    }

    // ─── Token Operations ────────────────────────────────────────

    /// Load the stored token fields for a user. `None` means no settings
    /// row exists at all.
    pub async fn get_tokens(&self, user_id: &str) -> Result<Option<StoredTokens>, AppError> {
        match &self.backend {
            Backend::Postgres(pool) => {
                let row = sqlx::query(
                    "SELECT ml_user_id, ml_access_token, ml_refresh_token, ml_token_expires_at \
                     FROM user_settings WHERE user_id = $1",
                )
                .bind(user_id)
                .fetch_optional(pool)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;

                Ok(row.map(|r| StoredTokens {
                    ml_user_id: r.get("ml_user_id"),
                    access_token: r.get("ml_access_token"),
                    refresh_token: r.get("ml_refresh_token"),
                    expires_at: r.get("ml_token_expires_at"),
                }))
            }
            Backend::Memory(map) => Ok(map.get(user_id).map(|r| r.tokens.clone())),
        }
    }

    /// Store a freshly-authorized connection: remote account id plus the
    /// full token triple, as a single upsert.
    pub async fn connect_account(
        &self,
        user_id: &str,
        ml_user_id: i64,
        update: &TokenUpdate,
    ) -> Result<(), AppError> {
        match &self.backend {
            Backend::Postgres(pool) => {
                sqlx::query(
                    "INSERT INTO user_settings \
                       (user_id, ml_user_id, ml_access_token, ml_refresh_token, ml_token_expires_at, updated_at) \
                     VALUES ($1, $2, $3, $4, $5, now()) \
                     ON CONFLICT (user_id) DO UPDATE SET \
                       ml_user_id = EXCLUDED.ml_user_id, \
                       ml_access_token = EXCLUDED.ml_access_token, \
                       ml_refresh_token = EXCLUDED.ml_refresh_token, \
                       ml_token_expires_at = EXCLUDED.ml_token_expires_at, \
                       updated_at = now()",
                )
                .bind(user_id)
                .bind(ml_user_id)
                .bind(&update.access_token)
                .bind(&update.refresh_token)
                .bind(update.expires_at)
                .execute(pool)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
                Ok(())
            }
            Backend::Memory(map) => {
                let mut row = map.entry(user_id.to_string()).or_default();
                row.tokens = StoredTokens {
                    ml_user_id: Some(ml_user_id),
                    access_token: Some(update.access_token.clone()),
                    refresh_token: update.refresh_token.clone(),
                    expires_at: update.expires_at,
                };
                Ok(())
            }
        }
    }

    /// Replace the token triple after a refresh. Always writes all three
    /// fields in one statement so access and refresh tokens cannot end up
    /// from different refresh cycles. Upserts like the in-memory backend:
    /// a rotated pair must never be dropped because the row vanished.
    pub async fn set_tokens(&self, user_id: &str, update: &TokenUpdate) -> Result<(), AppError> {
        match &self.backend {
            Backend::Postgres(pool) => {
                sqlx::query(
                    "INSERT INTO user_settings \
                       (user_id, ml_access_token, ml_refresh_token, ml_token_expires_at, updated_at) \
                     VALUES ($1, $2, $3, $4, now()) \
                     ON CONFLICT (user_id) DO UPDATE SET \
                       ml_access_token = EXCLUDED.ml_access_token, \
                       ml_refresh_token = EXCLUDED.ml_refresh_token, \
                       ml_token_expires_at = EXCLUDED.ml_token_expires_at, \
                       updated_at = now()",
                )
                .bind(user_id)
                .bind(&update.access_token)
                .bind(&update.refresh_token)
                .bind(update.expires_at)
                .execute(pool)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
                Ok(())
            }
            Backend::Memory(map) => {
                let mut row = map.entry(user_id.to_string()).or_default();
                row.tokens.access_token = Some(update.access_token.clone());
                row.tokens.refresh_token = update.refresh_token.clone();
                row.tokens.expires_at = update.expires_at;
                Ok(())
            }
        }
    }

    /// Null out the token triple after a confirmed auth failure. The
    /// remote account id is kept; the missing access token alone makes
    /// the row read as disconnected.
    pub async fn clear_tokens(&self, user_id: &str) -> Result<(), AppError> {
        match &self.backend {
            Backend::Postgres(pool) => {
                sqlx::query(
                    "UPDATE user_settings SET \
                       ml_access_token = NULL, \
                       ml_refresh_token = NULL, \
                       ml_token_expires_at = NULL, \
                       updated_at = now() \
                     WHERE user_id = $1",
                )
                .bind(user_id)
                .execute(pool)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
                Ok(())
            }
            Backend::Memory(map) => {
                if let Some(mut row) = map.get_mut(user_id) {
                    row.tokens.access_token = None;
                    row.tokens.refresh_token = None;
                    row.tokens.expires_at = None;
                }
                Ok(())
            }
        }
    }

    /// Explicit user-initiated disconnect: drop the account link too.
    pub async fn disconnect(&self, user_id: &str) -> Result<(), AppError> {
        match &self.backend {
            Backend::Postgres(pool) => {
                sqlx::query(
                    "UPDATE user_settings SET \
                       ml_user_id = NULL, \
                       ml_access_token = NULL, \
                       ml_refresh_token = NULL, \
                       ml_token_expires_at = NULL, \
                       updated_at = now() \
                     WHERE user_id = $1",
                )
                .bind(user_id)
                .execute(pool)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
                Ok(())
            }
            Backend::Memory(map) => {
                if let Some(mut row) = map.get_mut(user_id) {
                    row.tokens = StoredTokens::default();
                }
                Ok(())
            }
        }
    }

    // ─── Fee Override Operations ─────────────────────────────────

    /// Fee overrides for a user. A missing row means "all defaults".
    pub async fn fee_config(&self, user_id: &str) -> Result<FeeConfig, AppError> {
        match &self.backend {
            Backend::Postgres(pool) => {
                let row = sqlx::query(
                    "SELECT classic_fee_percent, premium_fee_percent, \
                            fixed_fee_threshold, fixed_fee_amount \
                     FROM user_settings WHERE user_id = $1",
                )
                .bind(user_id)
                .fetch_optional(pool)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;

                Ok(row
                    .map(|r| FeeConfig {
                        classic_percent: r.get("classic_fee_percent"),
                        premium_percent: r.get("premium_fee_percent"),
                        fixed_fee_threshold: r.get("fixed_fee_threshold"),
                        fixed_fee_amount: r.get("fixed_fee_amount"),
                    })
                    .unwrap_or_default())
            }
            Backend::Memory(map) => Ok(map.get(user_id).map(|r| r.fees).unwrap_or_default()),
        }
    }

    /// Store fee overrides for a user.
    pub async fn set_fee_config(&self, user_id: &str, fees: &FeeConfig) -> Result<(), AppError> {
        match &self.backend {
            Backend::Postgres(pool) => {
                sqlx::query(
                    "INSERT INTO user_settings \
                       (user_id, classic_fee_percent, premium_fee_percent, \
                        fixed_fee_threshold, fixed_fee_amount, updated_at) \
                     VALUES ($1, $2, $3, $4, $5, now()) \
                     ON CONFLICT (user_id) DO UPDATE SET \
                       classic_fee_percent = EXCLUDED.classic_fee_percent, \
                       premium_fee_percent = EXCLUDED.premium_fee_percent, \
                       fixed_fee_threshold = EXCLUDED.fixed_fee_threshold, \
                       fixed_fee_amount = EXCLUDED.fixed_fee_amount, \
                       updated_at = now()",
                )
                .bind(user_id)
                .bind(fees.classic_percent)
                .bind(fees.premium_percent)
                .bind(fees.fixed_fee_threshold)
                .bind(fees.fixed_fee_amount)
                .execute(pool)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
                Ok(())
            }
            Backend::Memory(map) => {
                map.entry(user_id.to_string()).or_default().fees = *fees;
                Ok(())
            }
        }
    }
}
