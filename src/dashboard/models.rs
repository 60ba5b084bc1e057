//! Dashboard request and response payloads

use serde::{Deserialize, Serialize};

use crate::auth::models::MeResponse;
use crate::services::usage::UsageSummary;

/// Maximum accepted API key length after trimming
pub const MAX_API_KEY_LENGTH: usize = 256;

#[derive(Serialize, Debug)]
pub struct DashboardResponse {
    pub account: MeResponse,
    /// Login came from Notion and the session carries its access token
    pub notion_connected: bool,
    pub workspace_name: Option<String>,
    pub usage: UsageSummary,
    pub has_api_key: bool,
}

#[derive(Deserialize, Debug)]
pub struct UpdateApiKeyRequest {
    pub api_key: String,
}

#[derive(Serialize, Debug)]
pub struct ApiKeyResponse {
    pub api_key: Option<String>,
}
