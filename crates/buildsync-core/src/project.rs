//! Project and team membership domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::Role;

/// A construction project. Belongs to exactly one workspace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Project {
    pub id: String,
    pub workspace_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Project {
    pub fn new(id: impl Into<String>, workspace_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            workspace_id: workspace_id.into(),
            name: name.into(),
            address: None,
            created_at: None,
        }
    }
}

/// Fetch status of the currently selected project record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectFetch {
    /// Request dispatched, no answer yet.
    Pending,
    /// Fetch finished. `None` when the row is missing or the fetch failed.
    Ready(Option<Project>),
}

impl ProjectFetch {
    pub fn is_pending(&self) -> bool {
        matches!(self, ProjectFetch::Pending)
    }

    pub fn project(&self) -> Option<&Project> {
        match self {
            ProjectFetch::Ready(project) => project.as_ref(),
            ProjectFetch::Pending => None,
        }
    }
}

/// A user's membership in a project team.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectMember {
    pub project_id: String,
    pub user_id: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Body of the `create-project` server-side function.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewProject {
    pub workspace_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// Body of the `invite-member` server-side function.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemberInvite {
    pub project_id: String,
    pub email: String,
    pub role: Role,
}
