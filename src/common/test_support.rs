//! Fakes and builders shared by the module tests

use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::Client;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;

use crate::auth::models::{Account, Session};
use crate::common::migrations::create_tables;
use crate::common::{AppConfig, AppState};
use crate::services::identity::IdentityError;
use crate::services::notion::{NotionError, WorkspaceInfo};
use crate::services::sessions::SessionError;
use crate::services::usage::{UsageError, UsageRecord, WorkspaceLink};
use crate::services::{
    ApiKeyService, EncryptionService, IdentityProvider, MonitoringService, SessionStore,
    SqliteSessionStore, SupabaseAuthService, UsageService, UsageStore, WorkspaceDirectory,
};

pub const TEST_JWT_SECRET: &str = "test_secret_key";

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".to_string(),
        port: 8080,
        jwt_secret: TEST_JWT_SECRET.to_string(),
        site_url: "http://localhost:8080".to_string(),
        supabase_url: None,
        supabase_anon_key: None,
        notion_api_url: "http://127.0.0.1:9".to_string(),
        notion_workspace_lookup: false,
        public_dir: None,
        cors_origins: vec![],
        sentry_dsn: None,
        sentry_traces: false,
        environment: "test".to_string(),
    }
}

pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    create_tables(&pool).await.unwrap();
    pool
}

pub fn session_for(account_id: &str, provider: &str, provider_token: Option<&str>) -> Session {
    Session {
        account: Account {
            id: account_id.to_string(),
            email: format!("{}@example.com", account_id),
            display_name: Some("Ada Lovelace".to_string()),
            provider: provider.to_string(),
            providers: vec![provider.to_string()],
            provider_user_id: Some(format!("{}-notion-user", account_id)),
        },
        access_token: format!("{}-access", account_id),
        refresh_token: Some(format!("{}-refresh", account_id)),
        provider_token: provider_token.map(str::to_string),
        provider_refresh_token: None,
        expires_at: Utc::now() + Duration::hours(1),
    }
}

/// Identity provider with single-use codes
#[derive(Default)]
pub struct FakeIdentity {
    codes: Mutex<HashMap<String, Session>>,
    consumed: Mutex<HashSet<String>>,
    pub sign_outs: Mutex<Vec<String>>,
    pub unreachable: bool,
}

impl FakeIdentity {
    pub fn with_code(code: &str, session: Session) -> Self {
        let fake = Self::default();
        fake.add_code(code, session);
        fake
    }

    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    pub fn add_code(&self, code: &str, session: Session) {
        self.codes
            .lock()
            .unwrap()
            .insert(code.to_string(), session);
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn exchange_code(
        &self,
        code: &str,
        _code_verifier: Option<&str>,
    ) -> Result<Session, IdentityError> {
        if self.unreachable {
            return Err(IdentityError::RequestFailed(
                "connection refused".to_string(),
            ));
        }
        if self.consumed.lock().unwrap().contains(code) {
            return Err(IdentityError::Rejected(
                "invalid flow state, flow state has already been used".to_string(),
            ));
        }
        match self.codes.lock().unwrap().remove(code) {
            Some(session) => {
                self.consumed.lock().unwrap().insert(code.to_string());
                Ok(session)
            }
            None => Err(IdentityError::Rejected(
                "invalid authorization code".to_string(),
            )),
        }
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError> {
        self.sign_outs
            .lock()
            .unwrap()
            .push(access_token.to_string());
        Ok(())
    }
}

/// In-memory session store; `fail_create` simulates a datastore outage,
/// `forget_on_read` a session that cannot be re-read
#[derive(Default)]
pub struct FakeSessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    next_id: AtomicUsize,
    pub fail_create: bool,
    pub forget_on_read: bool,
}

impl FakeSessionStore {
    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }
}

#[async_trait]
impl SessionStore for FakeSessionStore {
    async fn create(&self, session: &Session) -> Result<String, SessionError> {
        if self.fail_create {
            return Err(SessionError::Database(sqlx::Error::PoolTimedOut));
        }
        let id = format!("sess-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.sessions
            .lock()
            .unwrap()
            .insert(id.clone(), session.clone());
        Ok(id)
    }

    async fn get(&self, session_id: &str) -> Result<Option<Session>, SessionError> {
        if self.forget_on_read {
            return Ok(None);
        }
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .get(session_id)
            .filter(|s| !s.is_expired())
            .cloned())
    }

    async fn delete(&self, session_id: &str) -> Result<(), SessionError> {
        self.sessions.lock().unwrap().remove(session_id);
        Ok(())
    }
}

/// In-memory usage store counting every call; `fail` makes all calls error
#[derive(Default)]
pub struct FakeUsageStore {
    pub records: Mutex<HashMap<String, UsageRecord>>,
    pub calls: AtomicUsize,
    pub writes: AtomicUsize,
    pub fail: bool,
}

impl FakeUsageStore {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn record(&self, account_id: &str) -> Option<UsageRecord> {
        self.records.lock().unwrap().get(account_id).cloned()
    }

    fn outage(&self) -> Result<(), UsageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(UsageError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl UsageStore for FakeUsageStore {
    async fn find(&self, account_id: &str) -> Result<Option<UsageRecord>, UsageError> {
        self.outage()?;
        Ok(self.record(account_id))
    }

    async fn insert(&self, record: &UsageRecord) -> Result<(), UsageError> {
        self.outage()?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.records
            .lock()
            .unwrap()
            .insert(record.account_id.clone(), record.clone());
        Ok(())
    }

    async fn update(&self, link: &WorkspaceLink) -> Result<(), UsageError> {
        self.outage()?;
        let mut records = self.records.lock().unwrap();
        let record = records
            .get_mut(&link.account_id)
            .ok_or_else(|| UsageError::NotFound(link.account_id.clone()))?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        record.tier = crate::services::usage::Tier::Free;
        record.token_limit = crate::services::usage::DEFAULT_FREE_TOKEN_LIMIT;
        record.provider_account_id = link.provider_account_id.clone();
        if link.workspace_name.is_some() {
            record.workspace_name = link.workspace_name.clone();
        }
        if link.bot_id.is_some() {
            record.bot_id = link.bot_id.clone();
        }
        record.access_token = Some(link.access_token.clone());
        Ok(())
    }
}

pub struct FakeWorkspaces {
    pub name: Option<String>,
}

#[async_trait]
impl WorkspaceDirectory for FakeWorkspaces {
    async fn workspace_info(&self, _access_token: &str) -> Result<WorkspaceInfo, NotionError> {
        match &self.name {
            Some(name) => Ok(WorkspaceInfo {
                bot_id: "bot-1".to_string(),
                workspace_name: Some(name.clone()),
            }),
            None => Err(NotionError::Api(401)),
        }
    }
}

/// Shared state wired to sqlite-backed stores unless a usage store is given
pub async fn test_state(
    identity: Arc<dyn IdentityProvider>,
    usage: Option<Arc<dyn UsageStore>>,
) -> (Arc<RwLock<AppState>>, SqlitePool) {
    let pool = test_pool().await;
    let encryption = Some(Arc::new(
        EncryptionService::from_key(&EncryptionService::generate_key()).unwrap(),
    ));

    let usage = usage
        .unwrap_or_else(|| Arc::new(UsageService::new(pool.clone(), encryption.clone())));

    let state = AppState {
        db: pool.clone(),
        config: test_config(),
        supabase: Arc::new(SupabaseAuthService::new(Client::new(), None, None)),
        identity,
        sessions: Arc::new(SqliteSessionStore::new(pool.clone(), encryption.clone())),
        usage,
        workspaces: None,
        api_keys: Arc::new(ApiKeyService::new(pool.clone(), encryption)),
        monitoring: Arc::new(MonitoringService::disabled()),
    };

    (Arc::new(RwLock::new(state)), pool)
}
