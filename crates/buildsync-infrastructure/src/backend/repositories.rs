//! Port implementations over the REST client.

use std::time::Duration;

use buildsync_core::auth::{AuthSession, Role};
use buildsync_core::backend::{
    AuthProvider, ChatMessageRepository, FunctionInvoker, ProjectRepository, RoleRepository,
    WorkspaceRepository,
};
use buildsync_core::chat::{ChatMessage, NewChatMessage};
use buildsync_core::config::BackendSettings;
use buildsync_core::error::{BuildsyncError, Result};
use buildsync_core::project::{Project, ProjectMember};
use buildsync_core::workspace::Workspace;
use serde::Deserialize;
use serde_json::Value;

use super::functions::RestFunctionInvoker;
use super::rest::{Filter, Order, RestClient};
use super::tables;

#[derive(Debug, Deserialize)]
struct RoleRow {
    role: Role,
}

#[derive(Debug, Deserialize)]
struct MembershipRow {
    workspace_id: String,
}

/// The hosted backend reached over HTTP.
#[derive(Clone)]
pub struct RestBackend {
    client: RestClient,
    functions: RestFunctionInvoker,
}

impl RestBackend {
    pub fn new(client: RestClient) -> Self {
        let functions = RestFunctionInvoker::new(client.clone());
        Self { client, functions }
    }

    /// Builds the HTTP client from configuration.
    pub fn from_settings(settings: &BackendSettings) -> Result<Self> {
        if !settings.is_configured() {
            return Err(BuildsyncError::config(
                "Backend url and anon_key must be set in config.toml or the environment",
            ));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| BuildsyncError::config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self::new(RestClient::new(http, &settings.url, &settings.anon_key)))
    }

    pub fn client(&self) -> &RestClient {
        &self.client
    }
}

#[async_trait::async_trait]
impl RoleRepository for RestBackend {
    async fn fetch_role(&self, user_id: &str) -> Result<Option<Role>> {
        let rows: Vec<RoleRow> = self
            .client
            .select(tables::USER_ROLES, &[Filter::eq("user_id", user_id)], None)
            .await?;
        Ok(rows.into_iter().next().map(|row| row.role))
    }
}

#[async_trait::async_trait]
impl WorkspaceRepository for RestBackend {
    async fn list_owned(&self, user_id: &str) -> Result<Vec<Workspace>> {
        self.client
            .select(
                tables::WORKSPACES,
                &[Filter::eq("owner_id", user_id)],
                Some(Order::asc("created_at")),
            )
            .await
    }

    async fn list_member(&self, user_id: &str) -> Result<Vec<Workspace>> {
        let memberships: Vec<MembershipRow> = self
            .client
            .select(
                tables::WORKSPACE_MEMBERS,
                &[Filter::eq("user_id", user_id)],
                Some(Order::asc("created_at")),
            )
            .await?;
        if memberships.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = memberships.into_iter().map(|m| m.workspace_id).collect();
        let mut workspaces: Vec<Workspace> = self
            .client
            .select(tables::WORKSPACES, &[Filter::is_in("id", ids.clone())], None)
            .await?;
        // Keep membership order rather than whatever order `in.(...)` returns.
        workspaces.sort_by_key(|ws| ids.iter().position(|id| *id == ws.id).unwrap_or(usize::MAX));
        Ok(workspaces)
    }
}

#[async_trait::async_trait]
impl ProjectRepository for RestBackend {
    async fn find_by_id(&self, project_id: &str) -> Result<Option<Project>> {
        let rows: Vec<Project> = self
            .client
            .select(tables::PROJECTS, &[Filter::eq("id", project_id)], None)
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn list_by_workspace(&self, workspace_id: &str) -> Result<Vec<Project>> {
        self.client
            .select(
                tables::PROJECTS,
                &[Filter::eq("workspace_id", workspace_id)],
                Some(Order::asc("created_at")),
            )
            .await
    }

    async fn list_members(&self, project_id: &str) -> Result<Vec<ProjectMember>> {
        self.client
            .select(
                tables::PROJECT_MEMBERS,
                &[Filter::eq("project_id", project_id)],
                None,
            )
            .await
    }

    async fn remove_member(&self, project_id: &str, user_id: &str) -> Result<()> {
        self.client
            .delete(
                tables::PROJECT_MEMBERS,
                &[Filter::eq("project_id", project_id), Filter::eq("user_id", user_id)],
            )
            .await
    }
}

#[async_trait::async_trait]
impl ChatMessageRepository for RestBackend {
    async fn list_by_project(&self, project_id: &str) -> Result<Vec<ChatMessage>> {
        self.client
            .select(
                tables::CHAT_MESSAGES,
                &[Filter::eq("project_id", project_id)],
                Some(Order::asc("created_at")),
            )
            .await
    }

    async fn insert(&self, message: NewChatMessage) -> Result<ChatMessage> {
        self.client.insert(tables::CHAT_MESSAGES, &message).await
    }

    async fn update_content(&self, message_id: &str, content: &str) -> Result<ChatMessage> {
        self.client
            .update(
                tables::CHAT_MESSAGES,
                &[Filter::eq("id", message_id)],
                &serde_json::json!({ "content": content }),
            )
            .await
    }

    async fn delete(&self, message_id: &str) -> Result<()> {
        self.client
            .delete(tables::CHAT_MESSAGES, &[Filter::eq("id", message_id)])
            .await
    }
}

#[async_trait::async_trait]
impl FunctionInvoker for RestBackend {
    async fn invoke(&self, name: &str, body: Value) -> Result<Value> {
        self.functions.invoke(name, body).await
    }
}

#[async_trait::async_trait]
impl AuthProvider for RestBackend {
    async fn current_session(&self) -> Option<AuthSession> {
        self.client.auth().current_session().await
    }

    async fn set_session(&self, session: Option<AuthSession>) {
        self.client.auth().set_session(session).await;
    }

    async fn refresh_session(&self) -> Result<AuthSession> {
        self.client.auth().refresh_session().await
    }
}
