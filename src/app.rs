// src/app.rs
//! Router composition shared by the server binary and the router tests

use axum::{
    extract::Extension,
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

use crate::auth::{self, route_guard};
use crate::common::{ApiError, AppConfig, AppState};
use crate::dashboard;
use crate::logging_middleware;

/// GET /health
/// Liveness plus a datastore round-trip
pub async fn health_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let state = state_lock.read().await.clone();
    sqlx::query("SELECT 1")
        .execute(&state.db)
        .await
        .map_err(ApiError::DatabaseError)?;
    Ok(Json(json!({ "status": "ok" })))
}

async fn not_found_handler() -> ApiError {
    ApiError::NotFound("route not found".to_string())
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
        .allow_credentials(true)
}

pub fn build_router(shared: Arc<RwLock<AppState>>, config: &AppConfig) -> Router {
    let mut router = Router::new()
        .route("/health", get(health_handler))
        // ====================================================================
        // AUTHENTICATION ROUTES
        // ====================================================================
        .merge(auth::auth_routes())
        // ====================================================================
        // DASHBOARD ROUTES (usage, API key)
        // ====================================================================
        .merge(dashboard::dashboard_routes());

    // Built frontend, SPA-style: unknown paths get index.html
    if let Some(dir) = &config.public_dir {
        let index = ServeFile::new(format!("{}/index.html", dir.trim_end_matches('/')));
        router = router.fallback_service(ServeDir::new(dir).fallback(index));
    } else {
        router = router.fallback(not_found_handler);
    }

    router
        // ====================================================================
        // MIDDLEWARE AND LAYERS
        // ====================================================================
        .layer(middleware::from_fn(route_guard))
        // Add request/response body logging in debug mode
        .layer(middleware::from_fn(logging_middleware::log_request_response))
        .layer(Extension(shared))
        .layer(cors_layer(config))
        .layer(TraceLayer::new_for_http())
}
