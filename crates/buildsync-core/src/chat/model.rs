use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Rows that carry a stable string identity.
pub trait Identified {
    fn id(&self) -> &str;
}

/// A chat message posted to a project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: String,
    pub project_id: String,
    pub user_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Storage URLs of attached site photos
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_urls: Option<Vec<String>>,
}

impl Identified for ChatMessage {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Insert body for a new chat message. The backend assigns id and timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewChatMessage {
    pub project_id: String,
    pub user_id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub photo_urls: Vec<String>,
}
