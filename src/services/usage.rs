// src/services/usage.rs
//! Per-account subscription tier and token quota records

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::common::generate_usage_record_id;
use crate::services::encryption::{open_token, seal_token, EncryptionError, EncryptionService};

/// Token quota granted to every linked account on the free tier
pub const DEFAULT_FREE_TOKEN_LIMIT: i64 = 10_000;

#[derive(Debug, Error)]
pub enum UsageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Encryption error: {0}")]
    Encryption(#[from] EncryptionError),

    #[error("Unknown tier: {0}")]
    UnknownTier(String),

    #[error("Usage record not found for account {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Pro,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Pro => "pro",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = UsageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Tier::Free),
            "pro" => Ok(Tier::Pro),
            other => Err(UsageError::UnknownTier(other.to_string())),
        }
    }
}

/// One subscription/quota row per account
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageRecord {
    pub id: String,
    pub account_id: String,
    pub tier: Tier,
    pub token_limit: i64,
    pub tokens_consumed: i64,
    pub provider_account_id: Option<String>,
    pub workspace_name: Option<String>,
    /// Notion bot user id of the integration in the linked workspace
    pub bot_id: Option<String>,
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// Fields written when an account (re-)links its Notion workspace
#[derive(Debug, Clone, PartialEq)]
pub struct WorkspaceLink {
    pub account_id: String,
    pub provider_account_id: Option<String>,
    pub workspace_name: Option<String>,
    pub bot_id: Option<String>,
    pub access_token: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome {
    Created,
    Relinked,
}

/// Table-like access to usage records keyed by account id
#[async_trait]
pub trait UsageStore: Send + Sync {
    async fn find(&self, account_id: &str) -> Result<Option<UsageRecord>, UsageError>;

    async fn insert(&self, record: &UsageRecord) -> Result<(), UsageError>;

    /// Resets tier and limit to the free defaults and refreshes link fields.
    /// Tokens consumed is left untouched.
    async fn update(&self, link: &WorkspaceLink) -> Result<(), UsageError>;
}

/// Upserts the usage record for a freshly linked account
pub async fn provision_usage_record(
    store: &dyn UsageStore,
    link: &WorkspaceLink,
) -> Result<ProvisionOutcome, UsageError> {
    match store.find(&link.account_id).await? {
        Some(existing) => {
            debug!(
                account_id = %link.account_id,
                record_id = %existing.id,
                tokens_consumed = existing.tokens_consumed,
                "Usage record exists, re-linking"
            );
            store.update(link).await?;
            Ok(ProvisionOutcome::Relinked)
        }
        None => {
            let record = UsageRecord {
                id: generate_usage_record_id(),
                account_id: link.account_id.clone(),
                tier: Tier::Free,
                token_limit: DEFAULT_FREE_TOKEN_LIMIT,
                tokens_consumed: 0,
                provider_account_id: link.provider_account_id.clone(),
                workspace_name: link.workspace_name.clone(),
                bot_id: link.bot_id.clone(),
                access_token: Some(link.access_token.clone()),
                created_at: None,
                updated_at: None,
            };
            store.insert(&record).await?;
            info!(account_id = %link.account_id, record_id = %record.id, "Usage record created");
            Ok(ProvisionOutcome::Created)
        }
    }
}

#[derive(Debug, FromRow)]
struct UsageRow {
    id: String,
    account_id: String,
    tier: String,
    token_limit: i64,
    tokens_consumed: i64,
    provider_account_id: Option<String>,
    workspace_name: Option<String>,
    bot_id: Option<String>,
    access_token: Option<String>,
    access_token_encrypted: i64,
    created_at: Option<String>,
    updated_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UsageService {
    db_pool: SqlitePool,
    encryption: Option<Arc<EncryptionService>>,
}

impl UsageService {
    pub fn new(db_pool: SqlitePool, encryption: Option<Arc<EncryptionService>>) -> Self {
        Self {
            db_pool,
            encryption,
        }
    }

    fn seal(&self, token: &str) -> Result<(String, i64), EncryptionError> {
        seal_token(self.encryption.as_deref(), token).map(|(v, enc)| (v, enc as i64))
    }
}

#[async_trait]
impl UsageStore for UsageService {
    async fn find(&self, account_id: &str) -> Result<Option<UsageRecord>, UsageError> {
        let row = sqlx::query_as::<_, UsageRow>(
            r#"
            SELECT id, account_id, tier, token_limit, tokens_consumed, provider_account_id,
                   workspace_name, bot_id, access_token, access_token_encrypted,
                   created_at, updated_at
            FROM usage_records WHERE account_id = ?
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.db_pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let access_token = row
            .access_token
            .map(|t| {
                open_token(
                    self.encryption.as_deref(),
                    &t,
                    row.access_token_encrypted == 1,
                )
            })
            .transpose()?;

        Ok(Some(UsageRecord {
            id: row.id,
            account_id: row.account_id,
            tier: row.tier.parse()?,
            token_limit: row.token_limit,
            tokens_consumed: row.tokens_consumed,
            provider_account_id: row.provider_account_id,
            workspace_name: row.workspace_name,
            bot_id: row.bot_id,
            access_token,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }))
    }

    async fn insert(&self, record: &UsageRecord) -> Result<(), UsageError> {
        let (token, encrypted) = match record.access_token.as_deref() {
            Some(t) => {
                let (v, enc) = self.seal(t)?;
                (Some(v), enc)
            }
            None => (None, 0),
        };

        sqlx::query(
            r#"
            INSERT INTO usage_records (
                id, account_id, tier, token_limit, tokens_consumed, provider_account_id,
                workspace_name, bot_id, access_token, access_token_encrypted,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, datetime('now'), datetime('now'))
            "#,
        )
        .bind(&record.id)
        .bind(&record.account_id)
        .bind(record.tier.as_str())
        .bind(record.token_limit)
        .bind(record.tokens_consumed)
        .bind(record.provider_account_id.as_deref())
        .bind(record.workspace_name.as_deref())
        .bind(record.bot_id.as_deref())
        .bind(token)
        .bind(encrypted)
        .execute(&self.db_pool)
        .await?;

        Ok(())
    }

    async fn update(&self, link: &WorkspaceLink) -> Result<(), UsageError> {
        let (token, encrypted) = self.seal(&link.access_token)?;

        let result = sqlx::query(
            r#"
            UPDATE usage_records SET
                tier = ?,
                token_limit = ?,
                provider_account_id = ?,
                workspace_name = COALESCE(?, workspace_name),
                bot_id = COALESCE(?, bot_id),
                access_token = ?,
                access_token_encrypted = ?,
                updated_at = datetime('now')
            WHERE account_id = ?
            "#,
        )
        .bind(Tier::Free.as_str())
        .bind(DEFAULT_FREE_TOKEN_LIMIT)
        .bind(link.provider_account_id.as_deref())
        .bind(link.workspace_name.as_deref())
        .bind(link.bot_id.as_deref())
        .bind(token)
        .bind(encrypted)
        .bind(&link.account_id)
        .execute(&self.db_pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(UsageError::NotFound(link.account_id.clone()));
        }
        Ok(())
    }
}

/// Values the dashboard shows for the token usage bar
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageSummary {
    pub tier: Tier,
    pub tokens_consumed: i64,
    pub token_limit: i64,
    /// Rounded share of the limit used, absent when there is no limit
    pub percent_used: Option<i64>,
    /// Width of the progress bar fill, clamped to 0..=100
    pub bar_fill_percent: f64,
    pub limit_label: String,
}

impl UsageSummary {
    pub fn from_record(record: Option<&UsageRecord>) -> Self {
        let (tier, consumed, limit) = match record {
            Some(r) => (r.tier, r.tokens_consumed, r.token_limit),
            None => (Tier::Free, 0, 0),
        };

        let percent_used = if limit > 0 {
            Some(((consumed as f64 / limit as f64) * 100.0).round() as i64)
        } else {
            None
        };
        let bar_fill_percent = ((consumed as f64 / limit.max(1) as f64) * 100.0).clamp(0.0, 100.0);
        let limit_label = match percent_used {
            Some(p) => format!("{}% of limit used", p),
            None => "No limit set".to_string(),
        };

        Self {
            tier,
            tokens_consumed: consumed,
            token_limit: limit,
            percent_used,
            bar_fill_percent,
            limit_label,
        }
    }
}
