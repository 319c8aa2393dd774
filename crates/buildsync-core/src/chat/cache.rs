//! Per-project chat message cache.
//!
//! A cache entry moves `Uninitialized -> Loading -> Live`. While live, feed
//! events are merged by id. Events that arrive while the bulk fetch is still
//! in flight are buffered and replayed in delivery order once it lands.

use std::collections::HashMap;

use super::feed::ChangeEvent;
use super::model::{ChatMessage, Identified};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Uninitialized,
    Loading,
    Live,
    /// Bulk fetch failed; the screen offers a manual retry.
    Failed,
    /// No longer the selected project. Messages are kept, feed events ignored.
    Detached,
}

/// What applying a single event did to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Appended,
    Replaced,
    Removed,
    /// Duplicate insert, or update/delete for an unknown id.
    Unchanged,
    /// Held until the bulk fetch completes.
    Buffered,
    /// Cache is not accepting events, or the row belongs to another project.
    Ignored,
}

/// Ordered chat messages for a single project.
#[derive(Debug, Clone)]
pub struct ChatCache {
    project_id: String,
    status: CacheStatus,
    messages: Vec<ChatMessage>,
    pending: Vec<ChangeEvent<ChatMessage>>,
}

impl ChatCache {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            status: CacheStatus::Uninitialized,
            messages: Vec::new(),
            pending: Vec::new(),
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn status(&self) -> CacheStatus {
        self.status
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn is_live(&self) -> bool {
        self.status == CacheStatus::Live
    }

    /// Enters `Loading`, dropping any events buffered by an earlier attempt.
    pub fn begin_loading(&mut self) {
        self.status = CacheStatus::Loading;
        self.pending.clear();
    }

    /// Installs the bulk-fetched snapshot (already ordered by `created_at`)
    /// and replays buffered events.
    ///
    /// Ignored unless the cache is `Loading`, so a fetch that completes after
    /// a project switch cannot revive a detached entry.
    pub fn complete_load(&mut self, snapshot: Vec<ChatMessage>) -> bool {
        if self.status != CacheStatus::Loading {
            tracing::debug!(
                "[ChatCache] Dropping late snapshot for project {} ({:?})",
                self.project_id,
                self.status
            );
            return false;
        }
        self.messages = snapshot;
        self.status = CacheStatus::Live;
        let pending = std::mem::take(&mut self.pending);
        let replayed = pending.len();
        for event in pending {
            self.merge(event);
        }
        if replayed > 0 {
            tracing::debug!(
                "[ChatCache] Replayed {} buffered events for project {}",
                replayed,
                self.project_id
            );
        }
        true
    }

    pub fn fail_load(&mut self) {
        if self.status == CacheStatus::Loading {
            self.status = CacheStatus::Failed;
            self.pending.clear();
        }
    }

    pub fn detach(&mut self) {
        self.status = CacheStatus::Detached;
        self.pending.clear();
    }

    /// Applies one feed event according to the current status.
    pub fn apply(&mut self, event: ChangeEvent<ChatMessage>) -> ApplyOutcome {
        if let ChangeEvent::Insert(row) | ChangeEvent::Update(row) = &event
            && row.project_id != self.project_id
        {
            return ApplyOutcome::Ignored;
        }

        match self.status {
            CacheStatus::Live => self.merge(event),
            CacheStatus::Loading => {
                self.pending.push(event);
                ApplyOutcome::Buffered
            }
            CacheStatus::Uninitialized | CacheStatus::Failed | CacheStatus::Detached => {
                ApplyOutcome::Ignored
            }
        }
    }

    fn merge(&mut self, event: ChangeEvent<ChatMessage>) -> ApplyOutcome {
        match event {
            ChangeEvent::Insert(message) => {
                if self.position(message.id()).is_some() {
                    return ApplyOutcome::Unchanged;
                }
                // Feed is scoped to one project and delivered in commit order.
                self.messages.push(message);
                ApplyOutcome::Appended
            }
            ChangeEvent::Update(message) => match self.position(message.id()) {
                Some(index) => {
                    self.messages[index] = message;
                    ApplyOutcome::Replaced
                }
                None => ApplyOutcome::Unchanged,
            },
            ChangeEvent::Delete { id } => match self.position(&id) {
                Some(index) => {
                    self.messages.remove(index);
                    ApplyOutcome::Removed
                }
                None => ApplyOutcome::Unchanged,
            },
        }
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.messages.iter().position(|m| m.id == id)
    }
}

/// Chat caches keyed by project id, with at most one live entry.
#[derive(Debug, Default)]
pub struct ChatCacheStore {
    caches: HashMap<String, ChatCache>,
    active: Option<String>,
}

impl ChatCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_project(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn get(&self, project_id: &str) -> Option<&ChatCache> {
        self.caches.get(project_id)
    }

    pub fn get_mut(&mut self, project_id: &str) -> Option<&mut ChatCache> {
        self.caches.get_mut(project_id)
    }

    /// The entry for the currently selected project.
    pub fn active_mut(&mut self) -> Option<&mut ChatCache> {
        let active = self.active.as_deref()?;
        self.caches.get_mut(active)
    }

    /// Detaches the previously active entry and puts `project_id` into
    /// `Loading`. Passing `None` only detaches.
    pub fn switch_to(&mut self, project_id: Option<&str>) -> Option<&mut ChatCache> {
        if let Some(previous) = self.active.take()
            && let Some(cache) = self.caches.get_mut(&previous)
        {
            cache.detach();
        }

        let project_id = project_id?;
        self.active = Some(project_id.to_string());
        let cache = self
            .caches
            .entry(project_id.to_string())
            .or_insert_with(|| ChatCache::new(project_id));
        cache.begin_loading();
        Some(cache)
    }

    pub fn remove(&mut self, project_id: &str) -> Option<ChatCache> {
        if self.active.as_deref() == Some(project_id) {
            self.active = None;
        }
        self.caches.remove(project_id)
    }
}
