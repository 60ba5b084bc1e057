//! Authentication data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provider name the identity provider reports for Notion logins
pub const NOTION_PROVIDER: &str = "notion";

/// Cookie carrying the signed session token
pub const SESSION_COOKIE: &str = "nc_session";

/// Cookie carrying the PKCE verifier between sign-in start and callback
pub const PKCE_COOKIE: &str = "nc_pkce";

/// JWT claims stored in the session cookie
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SessionClaims {
    /// Account id
    pub sub: String,
    /// Session id in the session store
    pub sid: String,
    pub exp: usize,
}

/// An authenticated end user as reported by the identity provider
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Account {
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
    /// Provider that authenticated this login (e.g. "notion", "email")
    pub provider: String,
    #[serde(default)]
    pub providers: Vec<String>,
    /// The provider's own id for this user, when it reports one
    pub provider_user_id: Option<String>,
}

impl Account {
    /// Full name when known, otherwise the local part of the email
    pub fn greeting_name(&self) -> String {
        match self.display_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.email.split('@').next().unwrap_or_default().to_string(),
        }
    }

    pub fn is_notion_login(&self) -> bool {
        self.provider == NOTION_PROVIDER
    }
}

/// A live authenticated context
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub account: Account,
    /// Identity provider access token
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Upstream OAuth provider access token (Notion)
    pub provider_token: Option<String>,
    pub provider_refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, at: DateTime<Utc>) -> bool {
        self.expires_at <= at
    }
}

/// Query parameters of the OAuth redirect
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl CallbackParams {
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref().filter(|c| !c.is_empty())
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref().filter(|e| !e.is_empty())
    }
}

/// Account payload returned by `/api/me`
#[derive(Serialize, Debug)]
pub struct MeResponse {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub provider: String,
}

impl From<&Account> for MeResponse {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id.clone(),
            email: account.email.clone(),
            display_name: account.greeting_name(),
            provider: account.provider.clone(),
        }
    }
}
