// Application state shared across all modules

use sqlx::SqlitePool;
use std::sync::Arc;

use crate::common::AppConfig;
use crate::services::{
    ApiKeyService, IdentityProvider, MonitoringService, SessionStore, SupabaseAuthService,
    UsageStore, WorkspaceDirectory,
};

/// Application state containing database pool, services, and configuration
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: AppConfig,
    /// Concrete client, needed for building authorize URLs
    pub supabase: Arc<SupabaseAuthService>,
    pub identity: Arc<dyn IdentityProvider>,
    pub sessions: Arc<dyn SessionStore>,
    pub usage: Arc<dyn UsageStore>,
    pub workspaces: Option<Arc<dyn WorkspaceDirectory>>,
    pub api_keys: Arc<ApiKeyService>,
    pub monitoring: Arc<MonitoringService>,
}
