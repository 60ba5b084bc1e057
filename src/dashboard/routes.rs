//! Dashboard routes

use axum::{routing::get, Router};

use super::handlers;

/// Creates and returns the dashboard router
///
/// # Routes
/// - `GET /api/dashboard` - Connection status, usage and API key presence
/// - `GET /api/api-key` - Stored OpenAI API key
/// - `PUT /api/api-key` - Save the OpenAI API key
pub fn dashboard_routes() -> Router {
    Router::new()
        .route("/api/dashboard", get(handlers::dashboard_handler))
        .route(
            "/api/api-key",
            get(handlers::get_api_key).put(handlers::update_api_key),
        )
}
