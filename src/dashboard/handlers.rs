//! Dashboard handlers

use axum::extract::{Extension, Json};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::models::{ApiKeyResponse, DashboardResponse, UpdateApiKeyRequest};
use super::validators::ApiKeyValidator;
use crate::auth::models::MeResponse;
use crate::auth::AuthedSession;
use crate::common::{ApiError, AppState, Validator};
use crate::services::usage::UsageSummary;

/// GET /api/dashboard
pub async fn dashboard_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    authed: AuthedSession,
) -> Result<Json<DashboardResponse>, ApiError> {
    let state = state_lock.read().await.clone();
    let account = &authed.session.account;

    let record = state.usage.find(&account.id).await?;
    let has_api_key = state.api_keys.has_api_key(&account.id).await?;

    let notion_connected = account.is_notion_login() && authed.session.provider_token.is_some();
    debug!(
        account_id = %account.id,
        notion_connected,
        has_usage_record = record.is_some(),
        "Dashboard loaded"
    );

    Ok(Json(DashboardResponse {
        account: MeResponse::from(account),
        notion_connected,
        workspace_name: record.as_ref().and_then(|r| r.workspace_name.clone()),
        usage: UsageSummary::from_record(record.as_ref()),
        has_api_key,
    }))
}

/// GET /api/api-key
pub async fn get_api_key(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    authed: AuthedSession,
) -> Result<Json<ApiKeyResponse>, ApiError> {
    let state = state_lock.read().await.clone();
    let api_key = state.api_keys.get_api_key(authed.account_id()).await?;
    Ok(Json(ApiKeyResponse { api_key }))
}

/// PUT /api/api-key
///
/// # Request Body
/// ```json
/// { "api_key": "sk-..." }
/// ```
pub async fn update_api_key(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    authed: AuthedSession,
    Json(payload): Json<UpdateApiKeyRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let validation = ApiKeyValidator.validate(&payload);
    if !validation.is_valid {
        return Err(validation.into());
    }

    let state = state_lock.read().await.clone();
    state
        .api_keys
        .set_api_key(authed.account_id(), payload.api_key.trim())
        .await?;

    info!(account_id = %authed.account_id(), "API key updated");
    Ok(Json(json!({ "message": "API key saved" })))
}
