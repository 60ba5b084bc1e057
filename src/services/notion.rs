// src/services/notion.rs
//! Read-only Notion API lookups used to enrich linked accounts

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

const NOTION_VERSION: &str = "2022-06-28";

#[derive(Debug, Error)]
pub enum NotionError {
    #[error("Notion API error: HTTP {0}")]
    Api(u16),

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Unexpected Notion response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkspaceInfo {
    pub bot_id: String,
    pub workspace_name: Option<String>,
}

/// Looks up workspace details for a provider access token
#[async_trait]
pub trait WorkspaceDirectory: Send + Sync {
    async fn workspace_info(&self, access_token: &str) -> Result<WorkspaceInfo, NotionError>;
}

#[derive(Debug, Deserialize)]
struct NotionUser {
    id: String,
    #[serde(default)]
    bot: Option<NotionBot>,
}

#[derive(Debug, Deserialize)]
struct NotionBot {
    workspace_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NotionService {
    client: Client,
    api_url: String,
}

impl NotionService {
    pub fn new(client: Client, api_url: &str) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl WorkspaceDirectory for NotionService {
    async fn workspace_info(&self, access_token: &str) -> Result<WorkspaceInfo, NotionError> {
        let response = self
            .client
            .get(format!("{}/v1/users/me", self.api_url))
            .bearer_auth(access_token)
            .header("Notion-Version", NOTION_VERSION)
            .send()
            .await
            .map_err(|e| NotionError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(http_status = %status, "Notion users/me lookup failed");
            return Err(NotionError::Api(status.as_u16()));
        }

        let user = response
            .json::<NotionUser>()
            .await
            .map_err(|e| NotionError::InvalidResponse(e.to_string()))?;

        debug!(bot_id = %user.id, "Fetched Notion workspace info");
        Ok(parse_workspace(user))
    }
}

fn parse_workspace(user: NotionUser) -> WorkspaceInfo {
    WorkspaceInfo {
        bot_id: user.id,
        workspace_name: user
            .bot
            .and_then(|b| b.workspace_name)
            .filter(|n| !n.trim().is_empty()),
    }
}
