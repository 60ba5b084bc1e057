//! Authentication routes

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers;

/// Creates and returns the authentication router
///
/// # Routes
/// - `GET /auth/callback` - OAuth completion, always redirects
/// - `GET /auth/notion` - Start the Notion login
/// - `POST /api/auth/logout` - End the session
/// - `GET /api/me` - Current account
pub fn auth_routes() -> Router {
    Router::new()
        .route("/auth/callback", get(handlers::oauth_callback))
        .route("/auth/notion", get(handlers::notion_sign_in))
        .route("/api/auth/logout", post(handlers::logout_handler))
        .route("/api/me", get(handlers::me_handler))
}
