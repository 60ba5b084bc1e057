//! # Dashboard Module
//!
//! Signed-in account views backing the `/home` page:
//! - Notion connection status and token usage summary
//! - Per-account OpenAI API key storage

pub mod handlers;
pub mod models;
pub mod routes;
pub mod validators;


pub use routes::dashboard_routes;
