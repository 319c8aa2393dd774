use serde::{Deserialize, Serialize};

/// A named tenant boundary that groups projects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Workspace {
    /// Unique identifier for the workspace
    pub id: String,
    /// ID of the user who owns the workspace
    pub owner_id: String,
    /// Display name shown in the workspace switcher
    pub name: String,
    /// Archived workspaces are never offered for selection
    #[serde(default)]
    pub archived: bool,
}

impl Workspace {
    pub fn new(id: impl Into<String>, owner_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            name: name.into(),
            archived: false,
        }
    }
}
