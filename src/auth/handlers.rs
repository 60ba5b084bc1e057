//! Authentication handlers

use axum::{
    extract::{Extension, Json, Query},
    response::Redirect,
};
use axum_extra::extract::cookie::CookieJar;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use super::extractors::AuthedSession;
use super::flow::{
    complete_oauth_login, error_location, CallbackOutcome, FlowContext, AUTHENTICATION_ERROR,
    SESSION_START_FAILED,
};
use super::models::{CallbackParams, MeResponse, NOTION_PROVIDER, PKCE_COOKIE, SESSION_COOKIE};
use super::session_cookie::{issue_session_token, pkce_cookie, removal_cookie, session_cookie};
use crate::common::{safe_email_log, ApiError, AppState};
use crate::services::identity::PkcePair;

/// GET /auth/callback
///
/// Completes the OAuth login and always answers with a redirect:
/// `/error?..` for provider errors and failed exchanges, `/home` otherwise
/// (with `?integration_error=true` when the Notion token was missing).
pub async fn oauth_callback(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> (CookieJar, Redirect) {
    let state = state_lock.read().await.clone();
    let verifier = jar.get(PKCE_COOKIE).map(|c| c.value().to_string());

    let ctx = FlowContext {
        identity: state.identity.as_ref(),
        sessions: state.sessions.as_ref(),
        usage: state.usage.as_ref(),
        workspaces: state.workspaces.as_deref(),
        monitoring: state.monitoring.as_ref(),
    };
    let outcome = complete_oauth_login(&params, verifier.as_deref(), &ctx).await;

    let mut jar = jar;
    if let CallbackOutcome::SignedIn {
        session_id,
        account_id,
        expires_at,
        ..
    } = &outcome
    {
        let token = match issue_session_token(
            &state.config.jwt_secret,
            account_id,
            session_id,
            *expires_at,
        ) {
            Ok(token) => token,
            Err(e) => {
                error!(error = %e, "Could not issue session cookie");
                if let Err(e) = state.sessions.delete(session_id).await {
                    warn!(error = %e, "Failed to discard orphaned session");
                }
                let location = error_location(AUTHENTICATION_ERROR, SESSION_START_FAILED);
                return (jar, Redirect::to(&location));
            }
        };
        jar = jar.add(session_cookie(token, state.config.secure_cookies()));
    }

    if params.code().is_some() && verifier.is_some() {
        jar = jar.remove(removal_cookie(PKCE_COOKIE));
    }

    let location = outcome.location();
    debug!(signed_in = outcome.is_signed_in(), location = %location, "OAuth callback handled");
    (jar, Redirect::to(&location))
}

/// GET /auth/notion
/// Starts the Notion login through the identity provider (PKCE)
pub async fn notion_sign_in(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), ApiError> {
    let state = state_lock.read().await.clone();

    let pkce = PkcePair::generate();
    let auth_url = state
        .supabase
        .authorization_url(
            NOTION_PROVIDER,
            &state.config.callback_url(),
            &pkce.challenge,
        )
        .map_err(|e| {
            warn!(error = %e, "Sign-in requested but identity provider is unavailable");
            ApiError::ServiceUnavailable(e.to_string())
        })?;

    info!("Redirecting to Notion sign-in");
    let jar = jar.add(pkce_cookie(pkce.verifier, state.config.secure_cookies()));
    Ok((jar, Redirect::to(&auth_url)))
}

/// POST /api/auth/logout
pub async fn logout_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    jar: CookieJar,
    authed: AuthedSession,
) -> Result<(CookieJar, Json<serde_json::Value>), ApiError> {
    let state = state_lock.read().await.clone();

    if let Err(e) = state.identity.sign_out(&authed.session.access_token).await {
        warn!(error = %e, account_id = %authed.account_id(), "Identity provider sign-out failed");
    }

    state.sessions.delete(&authed.session_id).await?;

    info!(
        account_id = %authed.account_id(),
        email = %safe_email_log(&authed.session.account.email),
        "User logged out"
    );

    Ok((
        jar.remove(removal_cookie(SESSION_COOKIE)),
        Json(json!({ "message": "Logout successful" })),
    ))
}

/// GET /api/me
pub async fn me_handler(authed: AuthedSession) -> Json<MeResponse> {
    Json(MeResponse::from(&authed.session.account))
}
