//! Default workspace selection.
//!
//! Decides which workspace becomes current once data is available, without
//! ever overriding a selection that already exists.

use super::model::Workspace;
use crate::project::ProjectFetch;

/// Everything the reconciler looks at.
#[derive(Debug, Clone, Copy)]
pub struct ReconcileInput<'a> {
    /// Accessible workspaces in display order; empty while loading.
    pub workspaces: &'a [Workspace],
    pub selected_workspace_id: Option<&'a str>,
    /// Fetch status of the selected project; `None` when no project is selected.
    pub selected_project: Option<&'a ProjectFetch>,
}

/// Returns the workspace id to select, or `None` to leave things as they are.
///
/// A stale selection (the selected project moved to another workspace) is not
/// corrected here because an existing selection always short-circuits.
pub fn reconcile(input: &ReconcileInput<'_>) -> Option<String> {
    if input.workspaces.is_empty() {
        return None;
    }
    if input.selected_workspace_id.is_some() {
        return None;
    }

    let project_workspace = match input.selected_project {
        Some(ProjectFetch::Pending) => return None,
        Some(ProjectFetch::Ready(Some(project))) => Some(project.workspace_id.as_str()),
        Some(ProjectFetch::Ready(None)) | None => None,
    };

    if let Some(workspace_id) = project_workspace
        && input.workspaces.iter().any(|ws| ws.id == workspace_id)
    {
        return Some(workspace_id.to_string());
    }

    input.workspaces.first().map(|ws| ws.id.clone())
}
