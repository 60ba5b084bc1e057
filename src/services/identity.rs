// src/services/identity.rs
//! Supabase Auth (GoTrue) client: PKCE authorize URL, code exchange, sign-out

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, TimeZone, Utc};
use rand::RngCore;
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::auth::models::{Account, Session};

/// Fallback lifetime when the provider omits expiry information
const DEFAULT_SESSION_SECONDS: i64 = 3600;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Identity provider not configured")]
    NotConfigured,

    #[error("{0}")]
    Rejected(String),

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Unexpected identity provider response: {0}")]
    InvalidResponse(String),
}

/// The managed identity provider the OAuth flow finalizes logins against
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Trades a single-use authorization code for a session
    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<Session, IdentityError>;

    /// Revokes the identity provider session
    async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError>;
}

#[derive(Debug, Deserialize)]
struct GoTrueSession {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    expires_at: Option<i64>,
    provider_token: Option<String>,
    provider_refresh_token: Option<String>,
    user: GoTrueUser,
}

#[derive(Debug, Deserialize)]
struct GoTrueUser {
    id: String,
    email: Option<String>,
    #[serde(default)]
    app_metadata: AppMetadata,
    #[serde(default)]
    user_metadata: serde_json::Value,
}

#[derive(Debug, Default, Deserialize)]
struct AppMetadata {
    provider: Option<String>,
    #[serde(default)]
    providers: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GoTrueError {
    error: Option<String>,
    error_description: Option<String>,
    msg: Option<String>,
    message: Option<String>,
}

impl GoTrueError {
    fn into_message(self) -> Option<String> {
        self.error_description
            .or(self.msg)
            .or(self.message)
            .or(self.error)
            .filter(|m| !m.is_empty())
    }
}

impl GoTrueSession {
    fn into_session(self) -> Session {
        let metadata = &self.user.user_metadata;
        let display_name = metadata_str(metadata, "full_name").or_else(|| metadata_str(metadata, "name"));
        let provider_user_id =
            metadata_str(metadata, "provider_id").or_else(|| metadata_str(metadata, "sub"));

        let expires_at = match (self.expires_at, self.expires_in) {
            (Some(at), _) => Utc.timestamp_opt(at, 0).single(),
            (None, Some(secs)) => Some(Utc::now() + Duration::seconds(secs)),
            (None, None) => None,
        }
        .unwrap_or_else(|| Utc::now() + Duration::seconds(DEFAULT_SESSION_SECONDS));

        Session {
            account: Account {
                id: self.user.id,
                email: self.user.email.unwrap_or_default(),
                display_name,
                provider: self
                    .user
                    .app_metadata
                    .provider
                    .unwrap_or_else(|| "email".to_string()),
                providers: self.user.app_metadata.providers,
                provider_user_id,
            },
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            provider_token: self.provider_token.filter(|t| !t.is_empty()),
            provider_refresh_token: self.provider_refresh_token.filter(|t| !t.is_empty()),
            expires_at,
        }
    }
}

fn metadata_str(metadata: &serde_json::Value, key: &str) -> Option<String> {
    metadata
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Clone)]
pub struct SupabaseAuthService {
    client: Client,
    base_url: Option<String>,
    anon_key: Option<String>,
}

impl SupabaseAuthService {
    pub fn new(client: Client, base_url: Option<String>, anon_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.map(|u| u.trim_end_matches('/').to_string()),
            anon_key,
        }
    }

    fn endpoint(&self) -> Result<(&str, &str), IdentityError> {
        match (&self.base_url, &self.anon_key) {
            (Some(url), Some(key)) => Ok((url.as_str(), key.as_str())),
            _ => Err(IdentityError::NotConfigured),
        }
    }

    /// Builds the provider authorize URL for a PKCE sign-in
    pub fn authorization_url(
        &self,
        provider: &str,
        redirect_to: &str,
        code_challenge: &str,
    ) -> Result<String, IdentityError> {
        let (base_url, _) = self.endpoint()?;
        let auth_url = format!(
            "{}/auth/v1/authorize?provider={}&redirect_to={}&code_challenge={}&code_challenge_method=s256",
            base_url,
            urlencoding::encode(provider),
            urlencoding::encode(redirect_to),
            urlencoding::encode(code_challenge)
        );
        debug!(provider = %provider, "Generated authorization URL");
        Ok(auth_url)
    }
}

#[async_trait]
impl IdentityProvider for SupabaseAuthService {
    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<Session, IdentityError> {
        let (base_url, anon_key) = self.endpoint()?;
        let url = format!("{}/auth/v1/token?grant_type=pkce", base_url);

        debug!("Exchanging authorization code for session");

        let response = self
            .client
            .post(&url)
            .header("apikey", anon_key)
            .json(&serde_json::json!({
                "auth_code": code,
                "code_verifier": code_verifier.unwrap_or_default(),
            }))
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "HTTP error contacting identity provider token endpoint");
                IdentityError::RequestFailed(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GoTrueError>(&body)
                .ok()
                .and_then(GoTrueError::into_message)
                .unwrap_or_else(|| format!("HTTP {}", status));
            warn!(http_status = %status, error = %message, "Code exchange rejected");
            return Err(IdentityError::Rejected(message));
        }

        let session = response
            .json::<GoTrueSession>()
            .await
            .map_err(|e| IdentityError::InvalidResponse(e.to_string()))?;

        Ok(session.into_session())
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError> {
        let (base_url, anon_key) = self.endpoint()?;
        let response = self
            .client
            .post(format!("{}/auth/v1/logout", base_url))
            .header("apikey", anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| IdentityError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(IdentityError::Rejected(format!(
                "HTTP {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// A PKCE verifier and its S256 challenge
#[derive(Debug, Clone)]
pub struct PkcePair {
    pub verifier: String,
    pub challenge: String,
}

impl PkcePair {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 48];
        rand::thread_rng().fill_bytes(&mut bytes);
        let verifier = URL_SAFE_NO_PAD.encode(bytes);
        let challenge = pkce_challenge(&verifier);
        Self {
            verifier,
            challenge,
        }
    }
}

pub fn pkce_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}
