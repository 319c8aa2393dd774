//! Ports to the hosted backend.
//!
//! The backend (auth, row-level-security tables, realtime change feed and
//! server-side functions) is an external collaborator. Application services
//! depend only on these traits; infrastructure provides REST and in-memory
//! implementations.

use async_trait::async_trait;
use serde_json::Value;

use crate::auth::{AuthSession, Role};
use crate::chat::{ChatMessage, FeedFilter, FeedSubscription, NewChatMessage};
use crate::error::Result;
use crate::project::{Project, ProjectMember};
use crate::workspace::Workspace;

/// Lookup of a user's role, keyed by user id.
#[async_trait]
pub trait RoleRepository: Send + Sync {
    /// Returns `Ok(None)` when the user has no role row.
    async fn fetch_role(&self, user_id: &str) -> Result<Option<Role>>;
}

#[async_trait]
pub trait WorkspaceRepository: Send + Sync {
    /// Workspaces owned by the user, in backend order.
    async fn list_owned(&self, user_id: &str) -> Result<Vec<Workspace>>;

    /// Workspaces the user is a member of, in backend order.
    async fn list_member(&self, user_id: &str) -> Result<Vec<Workspace>>;
}

#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn find_by_id(&self, project_id: &str) -> Result<Option<Project>>;

    async fn list_by_workspace(&self, workspace_id: &str) -> Result<Vec<Project>>;

    async fn list_members(&self, project_id: &str) -> Result<Vec<ProjectMember>>;

    async fn remove_member(&self, project_id: &str, user_id: &str) -> Result<()>;
}

#[async_trait]
pub trait ChatMessageRepository: Send + Sync {
    /// All messages for a project, ordered by `created_at` ascending.
    async fn list_by_project(&self, project_id: &str) -> Result<Vec<ChatMessage>>;

    async fn insert(&self, message: NewChatMessage) -> Result<ChatMessage>;

    async fn update_content(&self, message_id: &str, content: &str) -> Result<ChatMessage>;

    async fn delete(&self, message_id: &str) -> Result<()>;
}

/// Live change-feed subscriptions.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn subscribe(&self, filter: FeedFilter) -> Result<FeedSubscription>;
}

/// Privileged server-side functions (project creation, member invitation).
#[async_trait]
pub trait FunctionInvoker: Send + Sync {
    /// Invokes `name` with a JSON object body and returns the `data` part of a
    /// successful response envelope.
    async fn invoke(&self, name: &str, body: Value) -> Result<Value>;
}

/// Session token storage, retrieval and refresh.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn current_session(&self) -> Option<AuthSession>;

    /// Installs the session used for subsequent requests, or clears it.
    async fn set_session(&self, session: Option<AuthSession>);

    async fn refresh_session(&self) -> Result<AuthSession>;
}
