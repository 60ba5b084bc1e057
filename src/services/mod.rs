// src/services/mod.rs
//
// Collaborators the request handlers are built on: identity provider,
// session and usage stores, Notion lookups, encryption and monitoring

pub mod api_keys;
pub mod encryption;
pub mod identity;
pub mod monitoring;
pub mod notion;
pub mod sessions;
pub mod usage;

// Re-export commonly used types for convenience
pub use api_keys::ApiKeyService;
pub use encryption::EncryptionService;
pub use identity::{IdentityProvider, SupabaseAuthService};
pub use monitoring::MonitoringService;
pub use notion::{NotionService, WorkspaceDirectory};
pub use sessions::{SessionStore, SqliteSessionStore};
pub use usage::{UsageService, UsageStore};
