//! Live change-feed payloads.
//!
//! The backend delivers `{ eventType, new, old }` records for a table scoped
//! by an equality filter. `ChangeEvent` is the typed form the cache consumes.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{BuildsyncError, Result};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum FeedEventType {
    Insert,
    Update,
    Delete,
}

/// Raw feed record as delivered by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedPayload {
    #[serde(rename = "eventType")]
    pub event_type: FeedEventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old: Option<Value>,
}

impl FeedPayload {
    pub fn insert<T: Serialize>(row: &T) -> Result<Self> {
        Ok(Self {
            event_type: FeedEventType::Insert,
            new: Some(serde_json::to_value(row)?),
            old: None,
        })
    }

    pub fn update<T: Serialize>(row: &T) -> Result<Self> {
        Ok(Self {
            event_type: FeedEventType::Update,
            new: Some(serde_json::to_value(row)?),
            old: None,
        })
    }

    pub fn delete(id: &str) -> Self {
        Self {
            event_type: FeedEventType::Delete,
            new: None,
            old: Some(serde_json::json!({ "id": id })),
        }
    }
}

/// Typed change event.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent<T> {
    Insert(T),
    Update(T),
    Delete { id: String },
}

impl<T: DeserializeOwned> ChangeEvent<T> {
    /// Decodes a raw payload. Deletes only need `old.id`.
    pub fn from_payload(payload: FeedPayload) -> Result<Self> {
        match payload.event_type {
            FeedEventType::Insert => Ok(Self::Insert(decode_row(payload.new, "new")?)),
            FeedEventType::Update => Ok(Self::Update(decode_row(payload.new, "new")?)),
            FeedEventType::Delete => {
                let id = payload
                    .old
                    .as_ref()
                    .and_then(|old| old.get("id"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| BuildsyncError::Serialization {
                        format: "JSON".to_string(),
                        message: "delete event without old.id".to_string(),
                    })?;
                Ok(Self::Delete { id: id.to_string() })
            }
        }
    }
}

fn decode_row<T: DeserializeOwned>(row: Option<Value>, field: &str) -> Result<T> {
    let row = row.ok_or_else(|| BuildsyncError::Serialization {
        format: "JSON".to_string(),
        message: format!("feed event without `{}` row", field),
    })?;
    Ok(serde_json::from_value(row)?)
}

/// Table + equality filter a subscription is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeedFilter {
    pub table: String,
    pub column: String,
    pub value: String,
}

impl FeedFilter {
    pub fn eq(table: impl Into<String>, column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            value: value.into(),
        }
    }

    /// Whether a row belongs to this subscription.
    pub fn matches(&self, table: &str, row: &Value) -> bool {
        table == self.table
            && row
                .get(&self.column)
                .and_then(Value::as_str)
                .is_some_and(|v| v == self.value)
    }
}

/// Handle to a live feed subscription.
///
/// Events arrive in delivery order through `recv`. Dropping the handle or
/// calling `cancel` unsubscribes.
#[derive(Debug)]
pub struct FeedSubscription {
    filter: FeedFilter,
    events: mpsc::UnboundedReceiver<FeedPayload>,
    cancel: CancellationToken,
}

impl FeedSubscription {
    pub fn new(
        filter: FeedFilter,
        events: mpsc::UnboundedReceiver<FeedPayload>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            filter,
            events,
            cancel,
        }
    }

    pub fn filter(&self) -> &FeedFilter {
        &self.filter
    }

    /// Next event, or `None` once the feed is closed or cancelled.
    pub async fn recv(&mut self) -> Option<FeedPayload> {
        if self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            event = self.events.recv() => event,
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Drop for FeedSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ChatMessage;
    use chrono::Utc;

    fn message(id: &str) -> ChatMessage {
        ChatMessage {
            id: id.to_string(),
            project_id: "p1".to_string(),
            user_id: "u1".to_string(),
            content: "Pour scheduled".to_string(),
            created_at: Utc::now(),
            photo_urls: None,
        }
    }

    #[test]
    fn test_decode_backend_payload() {
        let raw = serde_json::json!({
            "eventType": "INSERT",
            "new": serde_json::to_value(message("m1")).unwrap(),
            "old": {}
        });
        let payload: FeedPayload = serde_json::from_value(raw).unwrap();
        let event = ChangeEvent::<ChatMessage>::from_payload(payload).unwrap();
        assert!(matches!(event, ChangeEvent::Insert(m) if m.id == "m1"));
    }

    #[test]
    fn test_delete_needs_only_old_id() {
        let event = ChangeEvent::<ChatMessage>::from_payload(FeedPayload::delete("m7")).unwrap();
        assert_eq!(event, ChangeEvent::Delete { id: "m7".to_string() });
    }

    #[test]
    fn test_update_without_row_is_error() {
        let payload = FeedPayload {
            event_type: FeedEventType::Update,
            new: None,
            old: None,
        };
        assert!(ChangeEvent::<ChatMessage>::from_payload(payload).is_err());
    }

    #[test]
    fn test_filter_matches_project_column() {
        let filter = FeedFilter::eq("chat_messages", "project_id", "p1");
        let row = serde_json::to_value(message("m1")).unwrap();
        assert!(filter.matches("chat_messages", &row));
        assert!(!filter.matches("drawings", &row));
        let other = FeedFilter::eq("chat_messages", "project_id", "p2");
        assert!(!other.matches("chat_messages", &row));
    }

    #[tokio::test]
    async fn test_cancelled_subscription_yields_none() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut sub = FeedSubscription::new(
            FeedFilter::eq("chat_messages", "project_id", "p1"),
            rx,
            CancellationToken::new(),
        );
        tx.send(FeedPayload::delete("m1")).unwrap();
        sub.cancel();
        assert!(sub.recv().await.is_none());
    }
}
