//! Selection repository trait.

use async_trait::async_trait;

use crate::error::Result;
use crate::selection::model::SelectionState;
use crate::workspace::Workspace;

/// Owner of the process-wide workspace/project selection.
///
/// Implementations read the persisted workspace id once when constructed and
/// write it through on every change.
#[async_trait]
pub trait SelectionRepository: Send + Sync {
    async fn get_state(&self) -> Result<SelectionState>;

    async fn selected_workspace(&self) -> Option<String>;

    async fn set_selected_workspace(&self, workspace_id: String) -> Result<()>;

    async fn clear_selected_workspace(&self) -> Result<()>;

    async fn selected_project(&self) -> Option<String>;

    async fn set_selected_project(&self, project_id: String);

    async fn clear_selected_project(&self);

    /// Resets the workspace selection if it no longer references a workspace
    /// in `accessible`.
    ///
    /// `loaded` tells whether `accessible` is the complete answer. An empty set
    /// that is still loading is ignored; an empty loaded set means the user has
    /// no workspaces and clears any selection.
    ///
    /// Returns true if the selection was reset.
    async fn retain_accessible(&self, accessible: &[Workspace], loaded: bool) -> Result<bool> {
        if accessible.is_empty() && !loaded {
            return Ok(false);
        }
        match self.selected_workspace().await {
            Some(id) if !accessible.iter().any(|ws| ws.id == id) => {
                tracing::info!(
                    "[Selection] Workspace {} is no longer accessible, resetting selection",
                    id
                );
                self.clear_selected_workspace().await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
