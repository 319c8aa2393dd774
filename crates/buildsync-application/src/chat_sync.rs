//! Live chat cache for the selected project.

use std::sync::Arc;

use buildsync_core::backend::{ChangeFeed, ChatMessageRepository};
use buildsync_core::chat::{
    CacheStatus, ChangeEvent, ChatCacheStore, ChatMessage, FeedFilter, FeedSubscription,
    NewChatMessage,
};
use buildsync_core::error::{BuildsyncError, Result};
use buildsync_infrastructure::backend::tables;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// The task applying feed events for the selected project.
struct Drain {
    project_id: String,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Keeps one project's chat cache live: bulk fetch, then change-feed merge.
///
/// Switching projects stops the previous feed before the next one opens.
/// Previously viewed projects keep their messages in a detached cache.
#[derive(Clone)]
pub struct ChatSyncService {
    messages: Arc<dyn ChatMessageRepository>,
    feed: Arc<dyn ChangeFeed>,
    caches: Arc<Mutex<ChatCacheStore>>,
    drain: Arc<Mutex<Option<Drain>>>,
}

impl ChatSyncService {
    pub fn new(messages: Arc<dyn ChatMessageRepository>, feed: Arc<dyn ChangeFeed>) -> Self {
        Self {
            messages,
            feed,
            caches: Arc::new(Mutex::new(ChatCacheStore::new())),
            drain: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn active_project(&self) -> Option<String> {
        self.caches.lock().await.active_project().map(str::to_string)
    }

    /// Status of the cache for `project_id`, if it was ever selected.
    pub async fn status(&self, project_id: &str) -> Option<CacheStatus> {
        self.caches.lock().await.get(project_id).map(|c| c.status())
    }

    /// Cached messages for `project_id` in display order.
    pub async fn messages(&self, project_id: &str) -> Vec<ChatMessage> {
        self.caches
            .lock()
            .await
            .get(project_id)
            .map(|c| c.messages().to_vec())
            .unwrap_or_default()
    }

    /// Makes `project_id` the live project, or stops syncing with `None`.
    ///
    /// A failed bulk fetch leaves the cache `Failed` and returns the fetch
    /// error; `retry` starts over.
    pub async fn select_project(&self, project_id: Option<&str>) -> Result<()> {
        let mut drain = self.drain.lock().await;
        if let Some(previous) = drain.take() {
            tracing::debug!("[ChatSync] Stopping feed for project {}", previous.project_id);
            previous.cancel.cancel();
            if let Err(e) = previous.task.await {
                tracing::warn!(
                    "[ChatSync] Feed task for {} ended abnormally: {}",
                    previous.project_id,
                    e
                );
            }
        }

        self.caches.lock().await.switch_to(project_id);
        let Some(project_id) = project_id else {
            return Ok(());
        };

        let filter = FeedFilter::eq(tables::CHAT_MESSAGES, "project_id", project_id);
        let subscription = match self.feed.subscribe(filter).await {
            Ok(subscription) => subscription,
            Err(e) => {
                tracing::warn!("[ChatSync] Failed to subscribe to project {}: {}", project_id, e);
                self.fail_load(project_id).await;
                return Err(e);
            }
        };

        let cancel = subscription.cancellation_token();
        let task = tokio::spawn(drain_feed(
            subscription,
            self.caches.clone(),
            project_id.to_string(),
        ));
        *drain = Some(Drain {
            project_id: project_id.to_string(),
            cancel,
            task,
        });
        drop(drain);

        self.load_snapshot(project_id).await
    }

    /// Resubscribes and refetches the active project.
    pub async fn retry(&self) -> Result<()> {
        let Some(project_id) = self.active_project().await else {
            return Ok(());
        };
        tracing::info!("[ChatSync] Retrying project {}", project_id);
        self.select_project(Some(&project_id)).await
    }

    /// Posts a message to the active project.
    pub async fn send_message(
        &self,
        user_id: &str,
        content: &str,
        photo_urls: Vec<String>,
    ) -> Result<ChatMessage> {
        let project_id = self
            .active_project()
            .await
            .ok_or_else(|| BuildsyncError::mutation("No project selected", None))?;
        if content.trim().is_empty() && photo_urls.is_empty() {
            return Err(BuildsyncError::mutation("Message is empty", None));
        }

        let sent = self
            .messages
            .insert(NewChatMessage {
                project_id,
                user_id: user_id.to_string(),
                content: content.trim().to_string(),
                photo_urls,
            })
            .await?;
        self.echo(ChangeEvent::Insert(sent.clone()), &sent.project_id).await;
        Ok(sent)
    }

    pub async fn edit_message(&self, message_id: &str, content: &str) -> Result<ChatMessage> {
        let updated = self.messages.update_content(message_id, content).await?;
        self.echo(ChangeEvent::Update(updated.clone()), &updated.project_id)
            .await;
        Ok(updated)
    }

    pub async fn delete_message(&self, message_id: &str) -> Result<()> {
        self.messages.delete(message_id).await?;
        if let Some(project_id) = self.active_project().await {
            self.echo(
                ChangeEvent::Delete {
                    id: message_id.to_string(),
                },
                &project_id,
            )
            .await;
        }
        Ok(())
    }

    async fn load_snapshot(&self, project_id: &str) -> Result<()> {
        match self.messages.list_by_project(project_id).await {
            Ok(snapshot) => {
                let count = snapshot.len();
                let mut caches = self.caches.lock().await;
                if let Some(cache) = caches.get_mut(project_id)
                    && cache.complete_load(snapshot)
                {
                    tracing::info!("[ChatSync] Project {} live with {} message(s)", project_id, count);
                }
                Ok(())
            }
            Err(e) => {
                tracing::warn!("[ChatSync] Failed to load messages for {}: {}", project_id, e);
                self.fail_load(project_id).await;
                Err(e)
            }
        }
    }

    async fn fail_load(&self, project_id: &str) {
        if let Some(cache) = self.caches.lock().await.get_mut(project_id) {
            cache.fail_load();
        }
    }

    /// Applies the row returned by our own mutation. The feed will deliver the
    /// same change again, which the cache treats as a no-op.
    async fn echo(&self, event: ChangeEvent<ChatMessage>, project_id: &str) {
        if let Some(cache) = self.caches.lock().await.get_mut(project_id) {
            cache.apply(event);
        }
    }
}

async fn drain_feed(
    mut subscription: FeedSubscription,
    caches: Arc<Mutex<ChatCacheStore>>,
    project_id: String,
) {
    let cancel = subscription.cancellation_token();
    while let Some(payload) = subscription.recv().await {
        let event = match ChangeEvent::<ChatMessage>::from_payload(payload) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!("[ChatSync] Skipping malformed feed event for {}: {}", project_id, e);
                continue;
            }
        };
        if let Some(cache) = caches.lock().await.get_mut(&project_id) {
            let outcome = cache.apply(event);
            tracing::trace!("[ChatSync] {} <- {:?}", project_id, outcome);
        }
    }

    if !cancel.is_cancelled() {
        tracing::warn!(
            "[ChatSync] Feed for project {} closed; messages stop updating until retry",
            project_id
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buildsync_core::backend::ChatMessageRepository;
    use buildsync_infrastructure::InMemoryBackend;
    use chrono::{Duration, Utc};
    use std::time::Duration as StdDuration;

    fn seeded(id: &str, project_id: &str, minutes_ago: i64) -> ChatMessage {
        ChatMessage {
            id: id.to_string(),
            project_id: project_id.to_string(),
            user_id: "u2".to_string(),
            content: format!("note {}", id),
            created_at: Utc::now() - Duration::minutes(minutes_ago),
            photo_urls: None,
        }
    }

    fn service(backend: &InMemoryBackend) -> ChatSyncService {
        ChatSyncService::new(Arc::new(backend.clone()), Arc::new(backend.clone()))
    }

    async fn eventually<F, Fut>(mut check: F)
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        for _ in 0..200 {
            if check().await {
                return;
            }
            tokio::time::sleep(StdDuration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn test_select_loads_snapshot_in_order() {
        let backend = InMemoryBackend::new();
        backend.seed_message(seeded("m2", "p1", 1)).unwrap();
        backend.seed_message(seeded("m1", "p1", 10)).unwrap();
        backend.seed_message(seeded("x1", "p2", 5)).unwrap();
        let chat = service(&backend);

        chat.select_project(Some("p1")).await.unwrap();

        assert_eq!(chat.status("p1").await, Some(CacheStatus::Live));
        let ids: Vec<_> = chat.messages("p1").await.into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["m1", "m2"]);
    }

    #[tokio::test]
    async fn test_remote_insert_is_appended() {
        let backend = InMemoryBackend::new();
        backend.seed_message(seeded("m1", "p1", 10)).unwrap();
        let chat = service(&backend);
        chat.select_project(Some("p1")).await.unwrap();

        let remote = backend
            .insert(NewChatMessage {
                project_id: "p1".into(),
                user_id: "u2".into(),
                content: "Crane arrives 7am".into(),
                photo_urls: Vec::new(),
            })
            .await
            .unwrap();

        let chat_ref = &chat;
        eventually(|| async move { chat_ref.messages("p1").await.len() == 2 }).await;
        assert_eq!(chat.messages("p1").await[1], remote);
    }

    #[tokio::test]
    async fn test_own_message_not_duplicated_by_feed_echo() {
        let backend = InMemoryBackend::new();
        let chat = service(&backend);
        chat.select_project(Some("p1")).await.unwrap();

        let sent = chat.send_message("u1", "  Slab poured  ", Vec::new()).await.unwrap();
        assert_eq!(sent.content, "Slab poured");

        tokio::time::sleep(StdDuration::from_millis(20)).await;
        let messages = chat.messages("p1").await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, sent.id);
    }

    #[tokio::test]
    async fn test_edit_and_delete_update_cache() {
        let backend = InMemoryBackend::new();
        backend.seed_message(seeded("m1", "p1", 10)).unwrap();
        backend.seed_message(seeded("m2", "p1", 5)).unwrap();
        let chat = service(&backend);
        chat.select_project(Some("p1")).await.unwrap();

        chat.edit_message("m1", "Inspection moved to Friday").await.unwrap();
        let messages = chat.messages("p1").await;
        assert_eq!(messages[0].content, "Inspection moved to Friday");
        assert_eq!(messages[1].content, "note m2");

        chat.delete_message("m2").await.unwrap();
        let chat_ref = &chat;
        eventually(|| async move { chat_ref.messages("p1").await.len() == 1 }).await;
    }

    #[tokio::test]
    async fn test_switch_detaches_previous_and_cancels_feed() {
        let backend = InMemoryBackend::new();
        backend.seed_message(seeded("m1", "p1", 10)).unwrap();
        let chat = service(&backend);

        chat.select_project(Some("p1")).await.unwrap();
        chat.select_project(Some("p2")).await.unwrap();

        assert_eq!(chat.status("p1").await, Some(CacheStatus::Detached));
        assert_eq!(chat.messages("p1").await.len(), 1);
        assert_eq!(chat.status("p2").await, Some(CacheStatus::Live));
        assert_eq!(backend.feed().subscriber_count(), 1);

        backend
            .insert(NewChatMessage {
                project_id: "p1".into(),
                user_id: "u2".into(),
                content: "late".into(),
                photo_urls: Vec::new(),
            })
            .await
            .unwrap();
        tokio::time::sleep(StdDuration::from_millis(20)).await;
        assert_eq!(chat.messages("p1").await.len(), 1);
    }

    #[tokio::test]
    async fn test_deselect_stops_feed() {
        let backend = InMemoryBackend::new();
        let chat = service(&backend);
        chat.select_project(Some("p1")).await.unwrap();
        chat.select_project(None).await.unwrap();

        assert_eq!(chat.active_project().await, None);
        assert_eq!(chat.status("p1").await, Some(CacheStatus::Detached));
        assert_eq!(backend.feed().subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_then_retry() {
        let backend = InMemoryBackend::new();
        backend.seed_message(seeded("m1", "p1", 10)).unwrap();
        let chat = service(&backend);

        backend.set_fail_reads(true);
        let err = chat.select_project(Some("p1")).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(chat.status("p1").await, Some(CacheStatus::Failed));

        backend.set_fail_reads(false);
        chat.retry().await.unwrap();
        assert_eq!(chat.status("p1").await, Some(CacheStatus::Live));
        assert_eq!(chat.messages("p1").await.len(), 1);
        assert_eq!(backend.feed().subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_send_without_project_is_rejected() {
        let backend = InMemoryBackend::new();
        let chat = service(&backend);
        let err = chat.send_message("u1", "hello", Vec::new()).await.unwrap_err();
        assert!(err.is_mutation());
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected() {
        let backend = InMemoryBackend::new();
        let chat = service(&backend);
        chat.select_project(Some("p1")).await.unwrap();
        let err = chat.send_message("u1", "   ", Vec::new()).await.unwrap_err();
        assert_eq!(err.inline_message(), "Message is empty");
    }
}
