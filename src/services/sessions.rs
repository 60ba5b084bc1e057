// src/services/sessions.rs
//! Persisted login sessions keyed by an opaque session id

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};
use uuid::Uuid;

use crate::auth::models::{Account, Session};
use crate::common::db_timestamp;
use crate::services::encryption::{open_token, seal_token, EncryptionError, EncryptionService};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Encryption error: {0}")]
    Encryption(#[from] EncryptionError),

    #[error("Corrupt session row: {0}")]
    Corrupt(String),
}

/// Where established sessions live between requests
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persists a session and returns its id
    async fn create(&self, session: &Session) -> Result<String, SessionError>;

    /// Returns the session if it exists and has not expired
    async fn get(&self, session_id: &str) -> Result<Option<Session>, SessionError>;

    async fn delete(&self, session_id: &str) -> Result<(), SessionError>;
}

#[derive(Debug, FromRow)]
struct SessionRow {
    account_id: String,
    email: String,
    display_name: Option<String>,
    provider: String,
    providers: String,
    provider_user_id: Option<String>,
    access_token: String,
    refresh_token: Option<String>,
    provider_token: Option<String>,
    provider_refresh_token: Option<String>,
    tokens_encrypted: i64,
    expires_at: String,
}

#[derive(Debug, Clone)]
pub struct SqliteSessionStore {
    db_pool: SqlitePool,
    encryption: Option<Arc<EncryptionService>>,
}

impl SqliteSessionStore {
    pub fn new(db_pool: SqlitePool, encryption: Option<Arc<EncryptionService>>) -> Self {
        Self {
            db_pool,
            encryption,
        }
    }

    fn seal(&self, value: &str) -> Result<String, EncryptionError> {
        seal_token(self.encryption.as_deref(), value).map(|(stored, _)| stored)
    }

    fn seal_opt(&self, value: Option<&str>) -> Result<Option<String>, EncryptionError> {
        value.map(|v| self.seal(v)).transpose()
    }

    fn open_row(&self, row: SessionRow) -> Result<Session, SessionError> {
        let encrypted = row.tokens_encrypted == 1;
        let enc = self.encryption.as_deref();
        let open_opt = |v: Option<String>| -> Result<Option<String>, EncryptionError> {
            v.map(|v| open_token(enc, &v, encrypted)).transpose()
        };

        let expires_at = DateTime::parse_from_rfc3339(&row.expires_at)
            .map_err(|e| SessionError::Corrupt(format!("expires_at: {}", e)))?
            .with_timezone(&Utc);
        let providers: Vec<String> = serde_json::from_str(&row.providers).unwrap_or_default();

        Ok(Session {
            account: Account {
                id: row.account_id,
                email: row.email,
                display_name: row.display_name,
                provider: row.provider,
                providers,
                provider_user_id: row.provider_user_id,
            },
            access_token: open_token(enc, &row.access_token, encrypted)?,
            refresh_token: open_opt(row.refresh_token)?,
            provider_token: open_opt(row.provider_token)?,
            provider_refresh_token: open_opt(row.provider_refresh_token)?,
            expires_at,
        })
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn create(&self, session: &Session) -> Result<String, SessionError> {
        let id = Uuid::new_v4().to_string();
        let providers =
            serde_json::to_string(&session.account.providers).unwrap_or_else(|_| "[]".to_string());

        sqlx::query(
            r#"
            INSERT INTO sessions (
                id, account_id, email, display_name, provider, providers, provider_user_id,
                access_token, refresh_token, provider_token, provider_refresh_token,
                tokens_encrypted, expires_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&session.account.id)
        .bind(&session.account.email)
        .bind(session.account.display_name.as_deref())
        .bind(&session.account.provider)
        .bind(providers)
        .bind(session.account.provider_user_id.as_deref())
        .bind(self.seal(&session.access_token)?)
        .bind(self.seal_opt(session.refresh_token.as_deref())?)
        .bind(self.seal_opt(session.provider_token.as_deref())?)
        .bind(self.seal_opt(session.provider_refresh_token.as_deref())?)
        .bind(if self.encryption.is_some() { 1i64 } else { 0i64 })
        .bind(db_timestamp(session.expires_at))
        .execute(&self.db_pool)
        .await
        .map_err(|e| {
            error!(error = %e, account_id = %session.account.id, "Database error persisting session");
            SessionError::Database(e)
        })?;

        debug!(account_id = %session.account.id, provider = %session.account.provider, "Session persisted");
        Ok(id)
    }

    async fn get(&self, session_id: &str) -> Result<Option<Session>, SessionError> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT account_id, email, display_name, provider, providers, provider_user_id,
                   access_token, refresh_token, provider_token, provider_refresh_token,
                   tokens_encrypted, expires_at
            FROM sessions WHERE id = ?
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.db_pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let session = self.open_row(row)?;
        if session.is_expired() {
            debug!(session_id = %session_id, "Session expired, removing");
            self.delete(session_id).await?;
            return Ok(None);
        }
        Ok(Some(session))
    }

    async fn delete(&self, session_id: &str) -> Result<(), SessionError> {
        sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(session_id)
            .execute(&self.db_pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::migrations::create_tables;
    use chrono::Duration;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        create_tables(&pool).await.unwrap();
        pool
    }

    fn sample_session(expires_at: DateTime<Utc>) -> Session {
        Session {
            account: Account {
                id: "acc-1".to_string(),
                email: "ada@example.com".to_string(),
                display_name: Some("Ada".to_string()),
                provider: "notion".to_string(),
                providers: vec!["notion".to_string()],
                provider_user_id: Some("notion-user-1".to_string()),
            },
            access_token: "gotrue-access".to_string(),
            refresh_token: Some("gotrue-refresh".to_string()),
            provider_token: Some("secret_notion".to_string()),
            provider_refresh_token: None,
            expires_at,
        }
    }

    fn truncated(at: DateTime<Utc>) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(&db_timestamp(at))
            .unwrap()
            .with_timezone(&Utc)
    }

    #[tokio::test]
    async fn test_create_and_get_session() {
        let store = SqliteSessionStore::new(setup_test_db().await, None);
        let expires_at = Utc::now() + Duration::hours(1);
        let session = sample_session(expires_at);

        let id = store.create(&session).await.unwrap();
        let loaded = store.get(&id).await.unwrap().expect("session should exist");

        assert_eq!(loaded.account, session.account);
        assert_eq!(loaded.provider_token.as_deref(), Some("secret_notion"));
        assert_eq!(loaded.expires_at, truncated(expires_at));
    }

    #[tokio::test]
    async fn test_tokens_encrypted_at_rest() {
        let pool = setup_test_db().await;
        let encryption = Arc::new(
            EncryptionService::from_key(&EncryptionService::generate_key()).unwrap(),
        );
        let store = SqliteSessionStore::new(pool.clone(), Some(encryption));

        let id = store
            .create(&sample_session(Utc::now() + Duration::hours(1)))
            .await
            .unwrap();

        let (raw,): (Option<String>,) =
            sqlx::query_as("SELECT provider_token FROM sessions WHERE id = ?")
                .bind(&id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_ne!(raw.as_deref(), Some("secret_notion"));

        let loaded = store.get(&id).await.unwrap().unwrap();
        assert_eq!(loaded.provider_token.as_deref(), Some("secret_notion"));
        assert_eq!(loaded.access_token, "gotrue-access");
    }

    #[tokio::test]
    async fn test_expired_session_is_absent() {
        let store = SqliteSessionStore::new(setup_test_db().await, None);
        let id = store
            .create(&sample_session(Utc::now() - Duration::minutes(5)))
            .await
            .unwrap();
        assert!(store.get(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_session_row_removed_on_read() {
        let pool = setup_test_db().await;
        let store = SqliteSessionStore::new(pool.clone(), None);
        let expired = store
            .create(&sample_session(Utc::now() - Duration::minutes(5)))
            .await
            .unwrap();
        let live = store
            .create(&sample_session(Utc::now() + Duration::hours(1)))
            .await
            .unwrap();

        assert!(store.get(&expired).await.unwrap().is_none());

        let ids: Vec<(String,)> = sqlx::query_as("SELECT id FROM sessions")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert_eq!(ids, vec![(live,)]);
    }

    #[tokio::test]
    async fn test_delete_session() {
        let store = SqliteSessionStore::new(setup_test_db().await, None);
        let id = store
            .create(&sample_session(Utc::now() + Duration::hours(1)))
            .await
            .unwrap();

        store.delete(&id).await.unwrap();
        assert!(store.get(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_session_id() {
        let store = SqliteSessionStore::new(setup_test_db().await, None);
        assert!(store.get("does-not-exist").await.unwrap().is_none());
    }
}
