// src/common/config.rs
//! Runtime configuration loaded from environment variables

use std::env;
use tracing::{info, warn};

const DEFAULT_DATABASE_URL: &str = "sqlite://notion_comments.db";
const DEFAULT_SITE_URL: &str = "http://localhost:8080";
const DEFAULT_NOTION_API_URL: &str = "https://api.notion.com";
const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000,http://localhost:8080";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub jwt_secret: String,
    pub site_url: String,
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub notion_api_url: String,
    pub notion_workspace_lookup: bool,
    pub public_dir: Option<String>,
    pub cors_origins: Vec<String>,
    pub sentry_dsn: Option<String>,
    /// SENTRY_TRACES: sample performance traces when Sentry is on
    pub sentry_traces: bool,
    pub environment: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(8080);

        let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| {
            warn!("JWT_SECRET not set, using an insecure development secret");
            "replace_with_strong_secret".to_string()
        });

        let site_url = env::var("SITE_URL")
            .unwrap_or_else(|_| DEFAULT_SITE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| DEFAULT_CORS_ORIGINS.to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            port,
            jwt_secret,
            site_url,
            supabase_url: non_empty_var("SUPABASE_URL"),
            supabase_anon_key: non_empty_var("SUPABASE_ANON_KEY"),
            notion_api_url: env::var("NOTION_API_URL")
                .unwrap_or_else(|_| DEFAULT_NOTION_API_URL.to_string()),
            notion_workspace_lookup: parse_flag(env::var("NOTION_WORKSPACE_LOOKUP").ok(), true),
            public_dir: non_empty_var("PUBLIC_DIR"),
            cors_origins,
            sentry_dsn: non_empty_var("SENTRY_DSN"),
            sentry_traces: parse_flag(env::var("SENTRY_TRACES").ok(), false),
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        }
    }

    /// Session cookies get the Secure attribute only when served over https
    pub fn secure_cookies(&self) -> bool {
        self.site_url.starts_with("https://")
    }

    /// Absolute URL the identity provider sends the browser back to
    pub fn callback_url(&self) -> String {
        format!("{}/auth/callback", self.site_url)
    }

    pub fn supabase_configured(&self) -> bool {
        self.supabase_url.is_some() && self.supabase_anon_key.is_some()
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_flag(value: Option<String>, default: bool) -> bool {
    match value.map(|v| v.trim().to_lowercase()) {
        Some(v) if v == "true" || v == "1" || v == "yes" => true,
        Some(v) if v == "false" || v == "0" || v == "no" => false,
        _ => default,
    }
}

/// Log a startup summary without leaking secrets
pub fn print_config_status(config: &AppConfig) {
    info!(
        environment = %config.environment,
        site_url = %config.site_url,
        port = config.port,
        "Configuration loaded"
    );
    if config.supabase_configured() {
        info!("🔐 Supabase auth configured");
    } else {
        warn!("Supabase auth not configured - sign-in and code exchange will fail");
    }
    if config.notion_workspace_lookup {
        info!(api = %config.notion_api_url, "Notion workspace lookup enabled");
    }
    if let Some(dir) = &config.public_dir {
        info!(public_dir = %dir, "Serving static frontend");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AppConfig {
        AppConfig {
            database_url: "sqlite::memory:".to_string(),
            port: 8080,
            jwt_secret: "secret".to_string(),
            site_url: "http://localhost:8080".to_string(),
            supabase_url: None,
            supabase_anon_key: None,
            notion_api_url: DEFAULT_NOTION_API_URL.to_string(),
            notion_workspace_lookup: false,
            public_dir: None,
            cors_origins: vec![],
            sentry_dsn: None,
            sentry_traces: false,
            environment: "test".to_string(),
        }
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag(None, true));
        assert!(!parse_flag(None, false));
        assert!(parse_flag(Some("TRUE".into()), false));
        assert!(!parse_flag(Some("0".into()), true));
        assert!(parse_flag(Some("maybe".into()), true));
    }

    #[test]
    fn test_secure_cookies_follow_scheme() {
        let mut config = sample();
        assert!(!config.secure_cookies());
        config.site_url = "https://comments.example.com".to_string();
        assert!(config.secure_cookies());
    }

    #[test]
    fn test_callback_url() {
        assert_eq!(sample().callback_url(), "http://localhost:8080/auth/callback");
    }

    #[test]
    fn test_supabase_configured_requires_both_values() {
        let mut config = sample();
        config.supabase_url = Some("https://xyz.supabase.co".to_string());
        assert!(!config.supabase_configured());
        config.supabase_anon_key = Some("anon".to_string());
        assert!(config.supabase_configured());
    }
}
