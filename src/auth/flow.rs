//! OAuth completion flow
//!
//! Turns the identity provider's redirect into a signed-in session and, for
//! Notion logins, provisions the account's usage record. Every collaborator
//! error is caught here and folded into a [`CallbackOutcome`]; only the
//! redirect location leaves this module.

use chrono::{DateTime, Utc};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::models::{CallbackParams, Session};
use crate::common::safe_token_log;
use crate::services::identity::IdentityError;
use crate::services::sessions::SessionError;
use crate::services::usage::{provision_usage_record, ProvisionOutcome, UsageError, WorkspaceLink};
use crate::services::{
    IdentityProvider, MonitoringService, SessionStore, UsageStore, WorkspaceDirectory,
};

pub const HOME_PATH: &str = "/home";
pub const ERROR_PATH: &str = "/error";
pub const SIGN_IN_PATH: &str = "/auth";

/// Error code used on the error page for failed code exchanges
pub const AUTHENTICATION_ERROR: &str = "authentication_error";

#[derive(Debug, Error)]
pub enum CallbackFailure {
    #[error("OAuth provider returned {code}: {description}")]
    OAuthProvider { code: String, description: String },

    #[error("{0}")]
    Exchange(#[from] IdentityError),

    #[error("Failed to store session: {0}")]
    SessionStore(#[from] SessionError),

    #[error("Notion access token missing from session")]
    Integration,

    #[error("Usage record provisioning failed: {0}")]
    Provisioning(#[from] UsageError),
}

/// Shown on the error page when the session could not be kept
pub const SESSION_START_FAILED: &str = "Could not start session";

impl CallbackFailure {
    /// Description safe to put in the error page URL
    pub fn user_message(&self) -> String {
        match self {
            CallbackFailure::SessionStore(_) => SESSION_START_FAILED.to_string(),
            other => other.to_string(),
        }
    }
}

/// Everything the flow talks to
pub struct FlowContext<'a> {
    pub identity: &'a dyn IdentityProvider,
    pub sessions: &'a dyn SessionStore,
    pub usage: &'a dyn UsageStore,
    pub workspaces: Option<&'a dyn WorkspaceDirectory>,
    pub monitoring: &'a MonitoringService,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrationStatus {
    /// Login did not come from Notion
    NotRequested,
    Linked(ProvisionOutcome),
    TokenMissing,
    /// Datastore write failed; the login itself still succeeded
    ProvisioningFailed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallbackOutcome {
    ProviderError {
        error: String,
        description: String,
    },
    NoCode,
    ExchangeFailed {
        message: String,
    },
    SignedIn {
        session_id: String,
        account_id: String,
        expires_at: DateTime<Utc>,
        integration: IntegrationStatus,
    },
}

impl CallbackOutcome {
    pub fn location(&self) -> String {
        match self {
            CallbackOutcome::ProviderError { error, description } => {
                error_location(error, description)
            }
            CallbackOutcome::ExchangeFailed { message } => {
                error_location(AUTHENTICATION_ERROR, message)
            }
            CallbackOutcome::SignedIn {
                integration: IntegrationStatus::TokenMissing,
                ..
            } => format!("{}?integration_error=true", HOME_PATH),
            CallbackOutcome::NoCode | CallbackOutcome::SignedIn { .. } => HOME_PATH.to_string(),
        }
    }

    pub fn is_signed_in(&self) -> bool {
        matches!(self, CallbackOutcome::SignedIn { .. })
    }
}

/// `/error?error=..&description=..`, form-encoded
pub fn error_location(error: &str, description: &str) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("error", error)
        .append_pair("description", description)
        .finish();
    format!("{}?{}", ERROR_PATH, query)
}

/// Runs the callback: provider error, then code exchange, then Notion linking
pub async fn complete_oauth_login(
    params: &CallbackParams,
    code_verifier: Option<&str>,
    ctx: &FlowContext<'_>,
) -> CallbackOutcome {
    if let Some(error) = params.error() {
        let description = params.error_description.clone().unwrap_or_default();
        let failure = CallbackFailure::OAuthProvider {
            code: error.to_string(),
            description: description.clone(),
        };
        warn!(error = %failure, "OAuth callback carried a provider error");
        return CallbackOutcome::ProviderError {
            error: error.to_string(),
            description,
        };
    }

    let Some(code) = params.code() else {
        debug!("OAuth callback without code or error");
        return CallbackOutcome::NoCode;
    };

    let (session_id, session) = match establish_session(code, code_verifier, ctx).await {
        Ok(established) => established,
        Err(failure) => {
            warn!(error = %failure, "OAuth code exchange failed");
            return CallbackOutcome::ExchangeFailed {
                message: failure.user_message(),
            };
        }
    };

    info!(
        account_id = %session.account.id,
        provider = %session.account.provider,
        "OAuth login completed"
    );

    let integration = if session.account.is_notion_login() {
        link_notion_workspace(&session_id, ctx).await
    } else {
        IntegrationStatus::NotRequested
    };

    CallbackOutcome::SignedIn {
        session_id,
        account_id: session.account.id,
        expires_at: session.expires_at,
        integration,
    }
}

async fn establish_session(
    code: &str,
    code_verifier: Option<&str>,
    ctx: &FlowContext<'_>,
) -> Result<(String, Session), CallbackFailure> {
    let session = ctx.identity.exchange_code(code, code_verifier).await?;
    let session_id = ctx.sessions.create(&session).await.map_err(|e| {
        error!(error = %e, account_id = %session.account.id, "Failed to persist session");
        CallbackFailure::SessionStore(e)
    })?;
    Ok((session_id, session))
}

async fn link_notion_workspace(session_id: &str, ctx: &FlowContext<'_>) -> IntegrationStatus {
    let link = match workspace_link(session_id, ctx).await {
        Ok(link) => link,
        Err(failure) => {
            warn!(error = %failure, "Notion integration failed");
            return IntegrationStatus::TokenMissing;
        }
    };

    match provision_usage_record(ctx.usage, &link).await {
        Ok(outcome) => {
            info!(account_id = %link.account_id, outcome = ?outcome, "Notion workspace linked");
            IntegrationStatus::Linked(outcome)
        }
        Err(e) => {
            let failure = CallbackFailure::Provisioning(e);
            ctx.monitoring.log_error(
                &failure,
                Some(json!({
                    "account_id": link.account_id,
                    "stage": "usage_record_upsert",
                })),
            );
            IntegrationStatus::ProvisioningFailed
        }
    }
}

/// Re-reads the stored session for the Notion token and builds the upsert input
async fn workspace_link(
    session_id: &str,
    ctx: &FlowContext<'_>,
) -> Result<WorkspaceLink, CallbackFailure> {
    let current = match ctx.sessions.get(session_id).await {
        Ok(Some(current)) => current,
        Ok(None) => return Err(CallbackFailure::Integration),
        Err(e) => {
            warn!(error = %e, "Could not re-read session after login");
            return Err(CallbackFailure::Integration);
        }
    };

    let Some(access_token) = current.provider_token.clone() else {
        return Err(CallbackFailure::Integration);
    };

    debug!(
        account_id = %current.account.id,
        token = %safe_token_log(&access_token),
        has_refresh_token = current.provider_refresh_token.is_some(),
        "Notion token found in session"
    );

    let workspace = match ctx.workspaces {
        Some(directory) => match directory.workspace_info(&access_token).await {
            Ok(info) => Some(info),
            Err(e) => {
                warn!(error = %e, account_id = %current.account.id, "Workspace lookup failed");
                None
            }
        },
        None => None,
    };
    let (workspace_name, bot_id) = match workspace {
        Some(info) => (info.workspace_name, Some(info.bot_id)),
        None => (None, None),
    };

    Ok(WorkspaceLink {
        account_id: current.account.id,
        provider_account_id: current.account.provider_user_id,
        workspace_name,
        bot_id,
        access_token,
    })
}
