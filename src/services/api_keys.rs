// src/services/api_keys.rs
//! Per-account OpenAI API keys, always encrypted at rest

use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

use crate::common::generate_api_key_id;
use crate::services::encryption::{EncryptionError, EncryptionService};

#[derive(Debug, Error)]
pub enum ApiKeyError {
    #[error("Encryption key not configured")]
    EncryptionUnavailable,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Encryption error: {0}")]
    Encryption(#[from] EncryptionError),
}

#[derive(Debug, Clone)]
pub struct ApiKeyService {
    db_pool: SqlitePool,
    encryption: Option<Arc<EncryptionService>>,
}

impl ApiKeyService {
    pub fn new(db_pool: SqlitePool, encryption: Option<Arc<EncryptionService>>) -> Self {
        Self {
            db_pool,
            encryption,
        }
    }

    fn cipher(&self) -> Result<&EncryptionService, ApiKeyError> {
        self.encryption
            .as_deref()
            .ok_or(ApiKeyError::EncryptionUnavailable)
    }

    pub async fn set_api_key(&self, account_id: &str, api_key: &str) -> Result<(), ApiKeyError> {
        let sealed = self.cipher()?.encrypt(api_key)?;

        sqlx::query(
            r#"
            INSERT INTO api_keys (id, account_id, encrypted_key)
            VALUES (?, ?, ?)
            ON CONFLICT(account_id) DO UPDATE SET
                encrypted_key = excluded.encrypted_key,
                updated_at = datetime('now')
            "#,
        )
        .bind(generate_api_key_id())
        .bind(account_id)
        .bind(sealed)
        .execute(&self.db_pool)
        .await
        .map_err(|e| {
            error!(error = %e, account_id = %account_id, "Database error storing API key");
            ApiKeyError::Database(e)
        })?;

        info!(account_id = %account_id, "API key saved");
        Ok(())
    }

    pub async fn get_api_key(&self, account_id: &str) -> Result<Option<String>, ApiKeyError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT encrypted_key FROM api_keys WHERE account_id = ?")
                .bind(account_id)
                .fetch_optional(&self.db_pool)
                .await?;

        match row {
            Some((sealed,)) => Ok(Some(self.cipher()?.decrypt(&sealed)?)),
            None => Ok(None),
        }
    }

    pub async fn has_api_key(&self, account_id: &str) -> Result<bool, ApiKeyError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM api_keys WHERE account_id = ?")
            .bind(account_id)
            .fetch_optional(&self.db_pool)
            .await?;
        Ok(row.is_some())
    }
}
