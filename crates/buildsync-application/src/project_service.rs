//! Project creation and team membership.

use std::sync::Arc;

use buildsync_core::backend::{FunctionInvoker, ProjectRepository};
use buildsync_core::error::{BuildsyncError, Result};
use buildsync_core::project::{MemberInvite, NewProject, Project, ProjectMember};
use buildsync_infrastructure::backend::function_names;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::role_resolver::SessionRoleResolver;

/// Privileged project operations, checked against the resolved role before
/// anything reaches the backend.
#[derive(Clone)]
pub struct ProjectService {
    projects: Arc<dyn ProjectRepository>,
    functions: Arc<dyn FunctionInvoker>,
    identity: SessionRoleResolver,
}

impl ProjectService {
    pub fn new(
        projects: Arc<dyn ProjectRepository>,
        functions: Arc<dyn FunctionInvoker>,
        identity: SessionRoleResolver,
    ) -> Self {
        Self {
            projects,
            functions,
            identity,
        }
    }

    pub async fn list_projects(&self, workspace_id: &str) -> Result<Vec<Project>> {
        self.projects.list_by_workspace(workspace_id).await
    }

    pub async fn create_project(&self, request: NewProject) -> Result<Project> {
        if !self.identity.gate().can_create_projects() {
            return Err(BuildsyncError::auth("Your role cannot create projects"));
        }
        if request.name.trim().is_empty() {
            return Err(BuildsyncError::mutation("Project name is required", None));
        }

        let project: Project = self.call(function_names::CREATE_PROJECT, &request).await?;
        tracing::info!(
            "[ProjectService] Created project {} in workspace {}",
            project.id,
            project.workspace_id
        );
        Ok(project)
    }

    pub async fn invite_member(&self, invite: MemberInvite) -> Result<ProjectMember> {
        if !self.identity.gate().can_invite_members() {
            return Err(BuildsyncError::auth("Your role cannot invite members"));
        }
        if !invite.email.contains('@') {
            return Err(BuildsyncError::mutation("Enter a valid email address", None));
        }

        let member: ProjectMember = self.call(function_names::INVITE_MEMBER, &invite).await?;
        tracing::info!(
            "[ProjectService] Invited {} to project {} as {}",
            invite.email,
            invite.project_id,
            member.role
        );
        Ok(member)
    }

    pub async fn list_members(&self, project_id: &str) -> Result<Vec<ProjectMember>> {
        self.projects.list_members(project_id).await
    }

    pub async fn remove_member(&self, project_id: &str, user_id: &str) -> Result<()> {
        if !self.identity.gate().can_remove_members() {
            return Err(BuildsyncError::auth("Only admins can remove members"));
        }
        self.projects.remove_member(project_id, user_id).await?;
        tracing::info!("[ProjectService] Removed {} from project {}", user_id, project_id);
        Ok(())
    }

    async fn call<B: Serialize, T: DeserializeOwned>(&self, name: &str, body: &B) -> Result<T> {
        let data = self.functions.invoke(name, serde_json::to_value(body)?).await?;
        Ok(serde_json::from_value(data)?)
    }
}
