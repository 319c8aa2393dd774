//! In-process change-feed fan-out.
//!
//! Transport adapters (and the in-memory backend) publish raw payloads per
//! table; the hub forwards each one to every subscription whose filter
//! matches the row.

use std::sync::{Arc, Mutex};

use buildsync_core::backend::ChangeFeed;
use buildsync_core::chat::{FeedFilter, FeedPayload, FeedSubscription};
use buildsync_core::error::{BuildsyncError, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

struct Subscriber {
    filter: FeedFilter,
    tx: mpsc::UnboundedSender<FeedPayload>,
    cancel: CancellationToken,
}

impl Subscriber {
    fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.tx.is_closed()
    }

    fn wants(&self, table: &str, payload: &FeedPayload) -> bool {
        if self.filter.table != table {
            return false;
        }
        match (&payload.new, &payload.old) {
            (Some(row), _) => self.filter.matches(table, row),
            // Deletes usually carry only the primary key.
            (None, Some(old)) => {
                old.get(&self.filter.column).is_none() || self.filter.matches(table, old)
            }
            (None, None) => false,
        }
    }
}

#[derive(Clone, Default)]
pub struct ChangeFeedHub {
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
}

impl ChangeFeedHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers `payload` to matching subscribers. Returns how many received it.
    pub fn publish(&self, table: &str, payload: FeedPayload) -> usize {
        let Ok(mut subscribers) = self.subscribers.lock() else {
            tracing::error!("[FeedHub] Subscriber list poisoned, dropping event");
            return 0;
        };
        subscribers.retain(|s| !s.is_closed());

        let mut delivered = 0;
        for subscriber in subscribers.iter().filter(|s| s.wants(table, &payload)) {
            if subscriber.tx.send(payload.clone()).is_ok() {
                delivered += 1;
            }
        }
        tracing::trace!("[FeedHub] {:?} on {} -> {} subscriber(s)", payload.event_type, table, delivered);
        delivered
    }

    /// Live subscriptions, after pruning cancelled ones.
    pub fn subscriber_count(&self) -> usize {
        match self.subscribers.lock() {
            Ok(mut subscribers) => {
                subscribers.retain(|s| !s.is_closed());
                subscribers.len()
            }
            Err(_) => 0,
        }
    }
}

#[async_trait::async_trait]
impl ChangeFeed for ChangeFeedHub {
    async fn subscribe(&self, filter: FeedFilter) -> Result<FeedSubscription> {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        self.subscribers
            .lock()
            .map_err(|_| BuildsyncError::internal("feed hub subscriber list poisoned"))?
            .push(Subscriber {
                filter: filter.clone(),
                tx,
                cancel: cancel.clone(),
            });
        tracing::debug!(
            "[FeedHub] Subscribed to {} where {} = {}",
            filter.table,
            filter.column,
            filter.value
        );
        Ok(FeedSubscription::new(filter, rx, cancel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(project_id: &str) -> FeedPayload {
        FeedPayload {
            event_type: buildsync_core::chat::FeedEventType::Insert,
            new: Some(json!({ "id": "m1", "project_id": project_id })),
            old: None,
        }
    }

    #[tokio::test]
    async fn test_publish_routes_by_filter() {
        let hub = ChangeFeedHub::new();
        let mut p1 = hub
            .subscribe(FeedFilter::eq("chat_messages", "project_id", "p1"))
            .await
            .unwrap();
        let _p2 = hub
            .subscribe(FeedFilter::eq("chat_messages", "project_id", "p2"))
            .await
            .unwrap();

        assert_eq!(hub.publish("chat_messages", row("p1")), 1);
        assert_eq!(hub.publish("drawings", row("p1")), 0);
        assert_eq!(p1.recv().await, Some(row("p1")));
    }

    #[tokio::test]
    async fn test_delete_without_filter_column_reaches_table_subscribers() {
        let hub = ChangeFeedHub::new();
        let _a = hub
            .subscribe(FeedFilter::eq("chat_messages", "project_id", "p1"))
            .await
            .unwrap();
        let _b = hub
            .subscribe(FeedFilter::eq("chat_messages", "project_id", "p2"))
            .await
            .unwrap();
        assert_eq!(hub.publish("chat_messages", FeedPayload::delete("m1")), 2);
    }

    #[tokio::test]
    async fn test_cancelled_subscription_is_pruned() {
        let hub = ChangeFeedHub::new();
        let sub = hub
            .subscribe(FeedFilter::eq("chat_messages", "project_id", "p1"))
            .await
            .unwrap();
        assert_eq!(hub.subscriber_count(), 1);

        sub.cancel();
        assert_eq!(hub.subscriber_count(), 0);
        assert_eq!(hub.publish("chat_messages", row("p1")), 0);
    }

    #[tokio::test]
    async fn test_dropped_subscription_is_pruned() {
        let hub = ChangeFeedHub::new();
        let sub = hub
            .subscribe(FeedFilter::eq("chat_messages", "project_id", "p1"))
            .await
            .unwrap();
        drop(sub);
        assert_eq!(hub.subscriber_count(), 0);
    }
}
