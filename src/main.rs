// src/main.rs
use dotenv::dotenv;
use reqwest::Client;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::PathBuf;
use std::time::Duration;
use std::{net::SocketAddr, str::FromStr, sync::Arc};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// ============================================================================
// MODULE IMPORTS
// ============================================================================

mod app;
mod auth;
mod common;
mod dashboard;
mod logging_middleware;
mod services;

// ============================================================================
// COMMON IMPORTS
// ============================================================================

use common::config::print_config_status;
use common::{AppConfig, AppState};
use services::monitoring::MonitoringConfig;
use services::{
    ApiKeyService, EncryptionService, MonitoringService, NotionService, SqliteSessionStore,
    SupabaseAuthService, UsageService, WorkspaceDirectory,
};

const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Sweeps expired session rows at startup and then once per interval
fn spawn_session_purge(pool: sqlx::SqlitePool) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_PURGE_INTERVAL);
        loop {
            ticker.tick().await;
            match common::migrations::purge_expired_sessions(&pool).await {
                Ok(0) => {}
                Ok(purged) => info!(purged, "Expired sessions removed"),
                Err(e) => warn!(error = %e, "Failed to purge expired sessions"),
            }
        }
    });
}

// ============================================================================
// MAIN APPLICATION ENTRY POINT
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(sentry_tracing::layer())
        .init();

    // ========================================================================
    // ENVIRONMENT CONFIGURATION
    // ========================================================================

    let config = AppConfig::from_env();
    print_config_status(&config);

    let monitoring = Arc::new(MonitoringService::init(&MonitoringConfig::from_app_config(
        &config,
    )));

    let encryption = match EncryptionService::from_env() {
        Ok(service) => {
            info!("🔒 Token encryption enabled");
            Some(Arc::new(service))
        }
        Err(e) => {
            warn!(error = %e, "Token encryption disabled; API key storage unavailable");
            None
        }
    };

    // ========================================================================
    // DATABASE SETUP
    // ========================================================================

    if let Some(path_part) = config.database_url.strip_prefix("sqlite://") {
        let path_without_params = path_part.split('?').next().unwrap_or("");
        if !path_without_params.is_empty() && !path_without_params.starts_with(':') {
            let db_path = PathBuf::from(path_without_params);
            if let Some(parent) = db_path.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
        }
    }

    let connect_options =
        SqliteConnectOptions::from_str(&config.database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .connect_with(connect_options)
        .await?;

    // Run database migrations
    common::migrations::run_migrations(&pool).await?;

    spawn_session_purge(pool.clone());

    // ========================================================================
    // SERVICE INITIALIZATION
    // ========================================================================

    let http_client = Client::builder().timeout(Duration::from_secs(30)).build()?;

    let supabase = Arc::new(SupabaseAuthService::new(
        http_client.clone(),
        config.supabase_url.clone(),
        config.supabase_anon_key.clone(),
    ));
    info!("SupabaseAuthService initialized");

    let workspaces: Option<Arc<dyn WorkspaceDirectory>> = if config.notion_workspace_lookup {
        Some(Arc::new(NotionService::new(
            http_client.clone(),
            &config.notion_api_url,
        )))
    } else {
        None
    };

    // ========================================================================
    // APPLICATION STATE
    // ========================================================================

    let app_state = AppState {
        db: pool.clone(),
        config: config.clone(),
        supabase: supabase.clone(),
        identity: supabase,
        sessions: Arc::new(SqliteSessionStore::new(pool.clone(), encryption.clone())),
        usage: Arc::new(UsageService::new(pool.clone(), encryption.clone())),
        workspaces,
        api_keys: Arc::new(ApiKeyService::new(pool, encryption)),
        monitoring,
    };

    let shared = Arc::new(RwLock::new(app_state));

    // ========================================================================
    // ROUTER COMPOSITION
    // ========================================================================

    let app = app::build_router(shared, &config);

    // ========================================================================
    // SERVER STARTUP
    // ========================================================================

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
