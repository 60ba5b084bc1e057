//! Authentication extractors for Axum

use async_trait::async_trait;
use axum::{
    extract::{Extension, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::models::Session;
use super::session_cookie::resolve_session;
use crate::common::{safe_email_log, ApiError, AppState};

/// Authenticated session extractor
///
/// Reads the session cookie, verifies its signature and loads the live
/// session from the session store. Rejects with 401 otherwise.
#[derive(Debug)]
pub struct AuthedSession {
    pub session_id: String,
    pub session: Session,
}

impl AuthedSession {
    pub fn account_id(&self) -> &str {
        &self.session.account.id
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthedSession
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Extension(state_lock): Extension<Arc<RwLock<AppState>>> =
            Extension::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::InternalServer("missing app state".to_string()))?;

        let app_state = state_lock.read().await.clone();
        let jar = CookieJar::from_headers(&parts.headers);

        match resolve_session(&app_state, &jar).await {
            Some((session_id, session)) => {
                debug!(
                    account_id = %session.account.id,
                    email = %safe_email_log(&session.account.email),
                    "Session authenticated"
                );
                Ok(AuthedSession {
                    session_id,
                    session,
                })
            }
            None => {
                warn!("Authentication failed: no valid session");
                Err(ApiError::Unauthorized("not signed in".into()))
            }
        }
    }
}
