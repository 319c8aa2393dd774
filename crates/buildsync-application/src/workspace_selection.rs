//! Workspace selection: accessible set, default choice, explicit changes.

use std::sync::Arc;

use buildsync_core::backend::{ProjectRepository, WorkspaceRepository};
use buildsync_core::error::{BuildsyncError, Result};
use buildsync_core::project::{Project, ProjectFetch};
use buildsync_core::selection::SelectionRepository;
use buildsync_core::workspace::{ReconcileInput, Workspace, accessible_workspaces, reconcile};
use tokio::sync::RwLock;

/// Keeps the persisted workspace selection consistent with what the user can
/// access and fills it in when nothing is selected.
#[derive(Clone)]
pub struct WorkspaceSelectionService {
    workspaces: Arc<dyn WorkspaceRepository>,
    projects: Arc<dyn ProjectRepository>,
    selection: Arc<dyn SelectionRepository>,
    /// Accessible set from the last refresh, empty until then
    accessible: Arc<RwLock<Vec<Workspace>>>,
    /// Fetch status of the selected project, keyed by its id
    project_fetch: Arc<RwLock<Option<(String, ProjectFetch)>>>,
}

impl WorkspaceSelectionService {
    pub fn new(
        workspaces: Arc<dyn WorkspaceRepository>,
        projects: Arc<dyn ProjectRepository>,
        selection: Arc<dyn SelectionRepository>,
    ) -> Self {
        Self {
            workspaces,
            projects,
            selection,
            accessible: Arc::new(RwLock::new(Vec::new())),
            project_fetch: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn accessible(&self) -> Vec<Workspace> {
        self.accessible.read().await.clone()
    }

    pub async fn selected_workspace(&self) -> Option<String> {
        self.selection.selected_workspace().await
    }

    pub async fn selected_project(&self) -> Option<String> {
        self.selection.selected_project().await
    }

    /// Reloads the accessible set for `user_id`, drops a selection that is no
    /// longer accessible, then reconciles.
    ///
    /// Returns the selected workspace id afterwards.
    pub async fn refresh(&self, user_id: &str) -> Result<Option<String>> {
        let (owned, member) = futures::try_join!(
            self.workspaces.list_owned(user_id),
            self.workspaces.list_member(user_id)
        )?;
        let accessible = accessible_workspaces(owned, member);
        tracing::debug!(
            "[WorkspaceSelection] {} accessible workspace(s) for user {}",
            accessible.len(),
            user_id
        );

        self.selection.retain_accessible(&accessible, true).await?;
        *self.accessible.write().await = accessible;

        self.reconcile().await?;
        Ok(self.selection.selected_workspace().await)
    }

    /// Runs the reconciler against current state and persists its decision.
    ///
    /// Returns the newly selected id, or `None` when nothing changed.
    pub async fn reconcile(&self) -> Result<Option<String>> {
        let selected_workspace = self.selection.selected_workspace().await;
        let selected_project = self.selection.selected_project().await;
        let fetch = self.project_fetch.read().await.clone();

        // A selected project whose fetch has not started yet counts as pending.
        let project_status = selected_project.as_ref().map(|project_id| match &fetch {
            Some((id, status)) if id == project_id => status.clone(),
            _ => ProjectFetch::Pending,
        });

        let accessible = self.accessible.read().await;
        let decision = reconcile(&ReconcileInput {
            workspaces: accessible.as_slice(),
            selected_workspace_id: selected_workspace.as_deref(),
            selected_project: project_status.as_ref(),
        });
        drop(accessible);

        if let Some(workspace_id) = &decision {
            tracing::info!("[WorkspaceSelection] Defaulting to workspace {}", workspace_id);
            self.selection
                .set_selected_workspace(workspace_id.clone())
                .await?;
        }
        Ok(decision)
    }

    /// Explicit user choice. Only accessible workspaces can be selected.
    pub async fn select_workspace(&self, workspace_id: &str) -> Result<()> {
        let accessible = self.accessible.read().await;
        if !accessible.iter().any(|ws| ws.id == workspace_id) {
            return Err(BuildsyncError::not_found("Workspace", workspace_id));
        }
        drop(accessible);

        tracing::info!("[WorkspaceSelection] Workspace {} selected", workspace_id);
        self.selection
            .set_selected_workspace(workspace_id.to_string())
            .await
    }

    pub async fn clear_workspace(&self) -> Result<()> {
        self.selection.clear_selected_workspace().await
    }

    /// Selects a project and fetches its record so the reconciler can align
    /// the workspace.
    ///
    /// A failed fetch is logged and treated as "project unknown".
    pub async fn select_project(&self, project_id: &str) -> Result<Option<Project>> {
        self.selection
            .set_selected_project(project_id.to_string())
            .await;
        *self.project_fetch.write().await = Some((project_id.to_string(), ProjectFetch::Pending));

        let project = match self.projects.find_by_id(project_id).await {
            Ok(project) => project,
            Err(e) => {
                tracing::warn!(
                    "[WorkspaceSelection] Failed to fetch project {}: {}",
                    project_id,
                    e
                );
                None
            }
        };

        {
            let mut fetch = self.project_fetch.write().await;
            match fetch.as_mut() {
                Some((id, status)) if id == project_id => {
                    *status = ProjectFetch::Ready(project.clone());
                }
                // Another project was selected while this fetch was in flight.
                _ => return Ok(project),
            }
        }

        self.reconcile().await?;
        Ok(project)
    }

    pub async fn clear_project(&self) {
        self.selection.clear_selected_project().await;
        *self.project_fetch.write().await = None;
    }

    /// Projects of the selected workspace, empty when none is selected.
    pub async fn projects_in_selected_workspace(&self) -> Result<Vec<Project>> {
        match self.selection.selected_workspace().await {
            Some(workspace_id) => self.projects.list_by_workspace(&workspace_id).await,
            None => Ok(Vec::new()),
        }
    }
}
