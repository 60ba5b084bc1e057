//! # Auth Module
//!
//! Sign-in through the managed identity provider:
//! - Notion OAuth start and callback completion (usage record provisioning)
//! - Signed session cookie and the AuthedSession extractor
//! - Route protection for dashboard and guest-only pages

pub mod extractors;
pub mod flow;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod session_cookie;


pub use extractors::AuthedSession;
pub use middleware::route_guard;
pub use routes::auth_routes;
