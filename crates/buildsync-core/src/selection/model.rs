//! Selection state domain models.

use serde::{Deserialize, Serialize};

/// Workspace/project selection shared by every screen.
///
/// Only `selected_workspace_id` survives a restart; the selected project is
/// chosen again by the user each run.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SelectionState {
    /// ID of the last selected workspace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_workspace_id: Option<String>,

    #[serde(skip)]
    pub selected_project_id: Option<String>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workspace(workspace_id: impl Into<String>) -> Self {
        Self {
            selected_workspace_id: Some(workspace_id.into()),
            selected_project_id: None,
        }
    }
}
