//! In-memory backend for tests and offline demos.
//!
//! Implements every port over plain vectors. Chat mutations publish feed
//! events through an owned `ChangeFeedHub`, so services observe their own
//! writes the same way they would against the hosted backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use buildsync_core::auth::{AuthSession, Role};
use buildsync_core::backend::{
    AuthProvider, ChangeFeed, ChatMessageRepository, FunctionInvoker, ProjectRepository, RoleRepository,
    WorkspaceRepository,
};
use buildsync_core::chat::{ChatMessage, FeedFilter, FeedPayload, FeedSubscription, NewChatMessage};
use buildsync_core::error::{BuildsyncError, Result};
use buildsync_core::project::{MemberInvite, NewProject, Project, ProjectMember};
use buildsync_core::workspace::Workspace;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::feed_hub::ChangeFeedHub;
use super::{function_names, tables};

#[derive(Default)]
struct Tables {
    roles: HashMap<String, Role>,
    workspaces: Vec<Workspace>,
    workspace_members: Vec<(String, String)>,
    projects: Vec<Project>,
    project_members: Vec<ProjectMember>,
    messages: Vec<ChatMessage>,
}

#[derive(Clone, Default)]
pub struct InMemoryBackend {
    tables: Arc<Mutex<Tables>>,
    feed: ChangeFeedHub,
    fail_reads: Arc<AtomicBool>,
    session: Arc<RwLock<Option<AuthSession>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&self) -> &ChangeFeedHub {
        &self.feed
    }

    /// Makes every subsequent read fail with `BuildsyncError::Fetch`.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_role(&self, user_id: &str, role: Role) -> Result<()> {
        self.lock()?.roles.insert(user_id.to_string(), role);
        Ok(())
    }

    pub fn add_workspace(&self, workspace: Workspace) -> Result<()> {
        self.lock()?.workspaces.push(workspace);
        Ok(())
    }

    pub fn add_workspace_member(&self, workspace_id: &str, user_id: &str) -> Result<()> {
        self.lock()?
            .workspace_members
            .push((workspace_id.to_string(), user_id.to_string()));
        Ok(())
    }

    pub fn add_project(&self, project: Project) -> Result<()> {
        self.lock()?.projects.push(project);
        Ok(())
    }

    /// Seeds a message without publishing a feed event.
    pub fn seed_message(&self, message: ChatMessage) -> Result<()> {
        self.lock()?.messages.push(message);
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| BuildsyncError::internal("in-memory backend lock poisoned"))
    }

    fn check_read(&self) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(BuildsyncError::fetch("simulated network failure"));
        }
        Ok(())
    }

    fn create_project(&self, body: Value) -> Result<Value> {
        let request: NewProject = serde_json::from_value(body)?;
        let mut tables = self.lock()?;
        if !tables.workspaces.iter().any(|w| w.id == request.workspace_id) {
            return Err(BuildsyncError::mutation(
                format!("Workspace {} does not exist", request.workspace_id),
                Some("WORKSPACE_NOT_FOUND".to_string()),
            ));
        }
        let project = Project {
            id: Uuid::new_v4().to_string(),
            workspace_id: request.workspace_id,
            name: request.name,
            address: request.address,
            created_at: Some(Utc::now()),
        };
        tables.projects.push(project.clone());
        Ok(serde_json::to_value(project)?)
    }

    fn invite_member(&self, body: Value) -> Result<Value> {
        let invite: MemberInvite = serde_json::from_value(body)?;
        let mut tables = self.lock()?;
        if tables
            .project_members
            .iter()
            .any(|m| m.project_id == invite.project_id && m.email.as_deref() == Some(invite.email.as_str()))
        {
            return Err(BuildsyncError::mutation(
                format!("{} is already a member of this project", invite.email),
                Some("ALREADY_MEMBER".to_string()),
            ));
        }
        let member = ProjectMember {
            project_id: invite.project_id,
            user_id: Uuid::new_v4().to_string(),
            role: invite.role,
            email: Some(invite.email),
        };
        tables.project_members.push(member.clone());
        Ok(serde_json::to_value(member)?)
    }
}

#[async_trait::async_trait]
impl RoleRepository for InMemoryBackend {
    async fn fetch_role(&self, user_id: &str) -> Result<Option<Role>> {
        self.check_read()?;
        Ok(self.lock()?.roles.get(user_id).copied())
    }
}

#[async_trait::async_trait]
impl WorkspaceRepository for InMemoryBackend {
    async fn list_owned(&self, user_id: &str) -> Result<Vec<Workspace>> {
        self.check_read()?;
        Ok(self
            .lock()?
            .workspaces
            .iter()
            .filter(|w| w.owner_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_member(&self, user_id: &str) -> Result<Vec<Workspace>> {
        self.check_read()?;
        let tables = self.lock()?;
        Ok(tables
            .workspace_members
            .iter()
            .filter(|(_, member)| member == user_id)
            .filter_map(|(workspace_id, _)| tables.workspaces.iter().find(|w| &w.id == workspace_id))
            .cloned()
            .collect())
    }
}

#[async_trait::async_trait]
impl ProjectRepository for InMemoryBackend {
    async fn find_by_id(&self, project_id: &str) -> Result<Option<Project>> {
        self.check_read()?;
        Ok(self.lock()?.projects.iter().find(|p| p.id == project_id).cloned())
    }

    async fn list_by_workspace(&self, workspace_id: &str) -> Result<Vec<Project>> {
        self.check_read()?;
        Ok(self
            .lock()?
            .projects
            .iter()
            .filter(|p| p.workspace_id == workspace_id)
            .cloned()
            .collect())
    }

    async fn list_members(&self, project_id: &str) -> Result<Vec<ProjectMember>> {
        self.check_read()?;
        Ok(self
            .lock()?
            .project_members
            .iter()
            .filter(|m| m.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn remove_member(&self, project_id: &str, user_id: &str) -> Result<()> {
        self.lock()?
            .project_members
            .retain(|m| !(m.project_id == project_id && m.user_id == user_id));
        Ok(())
    }
}

#[async_trait::async_trait]
impl ChatMessageRepository for InMemoryBackend {
    async fn list_by_project(&self, project_id: &str) -> Result<Vec<ChatMessage>> {
        self.check_read()?;
        let mut messages: Vec<ChatMessage> = self
            .lock()?
            .messages
            .iter()
            .filter(|m| m.project_id == project_id)
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }

    async fn insert(&self, message: NewChatMessage) -> Result<ChatMessage> {
        let row = ChatMessage {
            id: Uuid::new_v4().to_string(),
            project_id: message.project_id,
            user_id: message.user_id,
            content: message.content,
            created_at: Utc::now(),
            photo_urls: (!message.photo_urls.is_empty()).then_some(message.photo_urls),
        };
        self.lock()?.messages.push(row.clone());
        self.feed.publish(tables::CHAT_MESSAGES, FeedPayload::insert(&row)?);
        Ok(row)
    }

    async fn update_content(&self, message_id: &str, content: &str) -> Result<ChatMessage> {
        let row = {
            let mut tables = self.lock()?;
            let message = tables
                .messages
                .iter_mut()
                .find(|m| m.id == message_id)
                .ok_or_else(|| BuildsyncError::not_found("ChatMessage", message_id))?;
            message.content = content.to_string();
            message.clone()
        };
        self.feed.publish(tables::CHAT_MESSAGES, FeedPayload::update(&row)?);
        Ok(row)
    }

    async fn delete(&self, message_id: &str) -> Result<()> {
        let removed = {
            let mut tables = self.lock()?;
            let before = tables.messages.len();
            tables.messages.retain(|m| m.id != message_id);
            tables.messages.len() != before
        };
        if removed {
            self.feed.publish(tables::CHAT_MESSAGES, FeedPayload::delete(message_id));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ChangeFeed for InMemoryBackend {
    async fn subscribe(&self, filter: FeedFilter) -> Result<FeedSubscription> {
        self.feed.subscribe(filter).await
    }
}

#[async_trait::async_trait]
impl AuthProvider for InMemoryBackend {
    async fn current_session(&self) -> Option<AuthSession> {
        self.session.read().await.clone()
    }

    async fn set_session(&self, session: Option<AuthSession>) {
        *self.session.write().await = session;
    }

    async fn refresh_session(&self) -> Result<AuthSession> {
        self.current_session()
            .await
            .ok_or_else(|| BuildsyncError::auth("No session to refresh"))
    }
}

#[async_trait::async_trait]
impl FunctionInvoker for InMemoryBackend {
    async fn invoke(&self, name: &str, body: Value) -> Result<Value> {
        match name {
            function_names::CREATE_PROJECT => self.create_project(body),
            function_names::INVITE_MEMBER => self.invite_member(body),
            other => Err(BuildsyncError::mutation(
                format!("Unknown function: {}", other),
                Some("NOT_FOUND".to_string()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buildsync_core::chat::ChangeEvent;

    #[tokio::test]
    async fn test_member_workspaces_follow_membership_rows() {
        let backend = InMemoryBackend::new();
        backend.add_workspace(Workspace::new("w1", "owner", "Depot")).unwrap();
        backend.add_workspace(Workspace::new("w2", "owner", "Harbor")).unwrap();
        backend.add_workspace_member("w2", "u1").unwrap();

        let member = backend.list_member("u1").await.unwrap();
        assert_eq!(member.len(), 1);
        assert_eq!(member[0].id, "w2");
        assert!(backend.list_owned("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insert_publishes_feed_event() {
        let backend = InMemoryBackend::new();
        let mut sub = backend
            .subscribe(FeedFilter::eq(tables::CHAT_MESSAGES, "project_id", "p1"))
            .await
            .unwrap();

        let sent = backend
            .insert(NewChatMessage {
                project_id: "p1".into(),
                user_id: "u1".into(),
                content: "Rebar delivered".into(),
                photo_urls: Vec::new(),
            })
            .await
            .unwrap();

        let payload = sub.recv().await.unwrap();
        let event = ChangeEvent::<ChatMessage>::from_payload(payload).unwrap();
        assert_eq!(event, ChangeEvent::Insert(sent));
    }

    #[tokio::test]
    async fn test_fail_reads_yields_fetch_error() {
        let backend = InMemoryBackend::new();
        backend.set_fail_reads(true);
        let err = backend.list_by_project("p1").await.unwrap_err();
        assert!(err.is_fetch());
    }

    #[tokio::test]
    async fn test_create_project_in_unknown_workspace_fails() {
        let backend = InMemoryBackend::new();
        let err = backend
            .invoke(
                function_names::CREATE_PROJECT,
                serde_json::json!({ "workspace_id": "w9", "name": "Tower" }),
            )
            .await
            .unwrap_err();
        assert!(err.is_mutation());
    }

    #[tokio::test]
    async fn test_duplicate_invite_rejected_inline() {
        let backend = InMemoryBackend::new();
        let body = serde_json::json!({ "project_id": "p1", "email": "a@crew.io", "role": "contractor" });
        backend.invoke(function_names::INVITE_MEMBER, body.clone()).await.unwrap();
        let err = backend.invoke(function_names::INVITE_MEMBER, body).await.unwrap_err();
        assert_eq!(err.inline_message(), "a@crew.io is already a member of this project");
    }

    #[tokio::test]
    async fn test_session_install_and_clear() {
        let backend = InMemoryBackend::new();
        assert!(matches!(
            backend.refresh_session().await,
            Err(BuildsyncError::Auth(_))
        ));

        let session = AuthSession::new(
            buildsync_core::auth::Session::new("u1", "pm@site.io"),
            "tok-1",
            "refresh-1",
            Utc::now() + chrono::Duration::hours(1),
        );
        backend.set_session(Some(session)).await;
        assert_eq!(backend.refresh_session().await.unwrap().access_token, "tok-1");

        backend.set_session(None).await;
        assert!(backend.current_session().await.is_none());
    }
}
