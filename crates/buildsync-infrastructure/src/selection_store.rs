//! Persisted workspace/project selection.
//!
//! The workspace id is read once when the store is opened and written through
//! on every change. The selected project lives in memory only.

use std::path::PathBuf;
use std::sync::Arc;

use buildsync_core::error::{BuildsyncError, Result};
use buildsync_core::selection::{SelectionRepository, SelectionState};
use tokio::sync::Mutex;

use crate::paths::BuildsyncPaths;
use crate::storage::AtomicTomlFile;

/// File-backed `SelectionRepository`.
///
/// # Example
///
/// ```ignore
/// use buildsync_infrastructure::SelectionStore;
///
/// let store = SelectionStore::open(&BuildsyncPaths::default()).await?;
/// store.set_selected_workspace("w1".to_string()).await?;
/// ```
#[derive(Clone)]
pub struct SelectionStore {
    state: Arc<Mutex<SelectionState>>,
    file: Arc<AtomicTomlFile<SelectionState>>,
}

impl SelectionStore {
    pub async fn open(paths: &BuildsyncPaths) -> Result<Self> {
        Self::open_at(paths.selection_file()?).await
    }

    /// Opens the store at an explicit file path and loads the persisted state.
    pub async fn open_at(path: PathBuf) -> Result<Self> {
        let file = Arc::new(AtomicTomlFile::<SelectionState>::new(path));
        let loader = file.clone();
        let initial = tokio::task::spawn_blocking(move || loader.load())
            .await
            .map_err(|e| BuildsyncError::internal(format!("Failed to join task: {}", e)))??
            .unwrap_or_default();

        tracing::debug!(
            "[SelectionStore] Restored workspace selection: {:?}",
            initial.selected_workspace_id
        );

        Ok(Self {
            state: Arc::new(Mutex::new(initial)),
            file,
        })
    }

    /// Writes the new workspace id to disk, then to memory.
    ///
    /// The state lock is held across the write so disk and memory change in
    /// the same order, and a failed write leaves both untouched.
    async fn persist_workspace(&self, workspace_id: Option<String>) -> Result<()> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        next.selected_workspace_id = workspace_id;

        let file = self.file.clone();
        let snapshot = next.clone();
        tokio::task::spawn_blocking(move || file.save(&snapshot))
            .await
            .map_err(|e| BuildsyncError::internal(format!("Failed to join task: {}", e)))??;

        *state = next;
        Ok(())
    }
}

#[async_trait::async_trait]
impl SelectionRepository for SelectionStore {
    async fn get_state(&self) -> Result<SelectionState> {
        Ok(self.state.lock().await.clone())
    }

    async fn selected_workspace(&self) -> Option<String> {
        self.state.lock().await.selected_workspace_id.clone()
    }

    async fn set_selected_workspace(&self, workspace_id: String) -> Result<()> {
        self.persist_workspace(Some(workspace_id)).await
    }

    async fn clear_selected_workspace(&self) -> Result<()> {
        self.persist_workspace(None).await
    }

    async fn selected_project(&self) -> Option<String> {
        self.state.lock().await.selected_project_id.clone()
    }

    async fn set_selected_project(&self, project_id: String) {
        self.state.lock().await.selected_project_id = Some(project_id);
    }

    async fn clear_selected_project(&self) {
        self.state.lock().await.selected_project_id = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buildsync_core::workspace::Workspace;
    use tempfile::TempDir;

    async fn open(dir: &TempDir) -> SelectionStore {
        SelectionStore::open_at(dir.path().join("selection.toml"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_default_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir).await;
        assert!(store.selected_workspace().await.is_none());
        assert!(store.selected_project().await.is_none());
    }

    #[tokio::test]
    async fn test_workspace_survives_restart() {
        let dir = TempDir::new().unwrap();
        open(&dir)
            .await
            .set_selected_workspace("w2".to_string())
            .await
            .unwrap();

        let reopened = open(&dir).await;
        assert_eq!(reopened.selected_workspace().await.as_deref(), Some("w2"));
    }

    #[tokio::test]
    async fn test_project_is_not_persisted() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir).await;
        store.set_selected_project("p1".to_string()).await;
        store.set_selected_workspace("w1".to_string()).await.unwrap();
        assert_eq!(store.selected_project().await.as_deref(), Some("p1"));

        let reopened = open(&dir).await;
        assert!(reopened.selected_project().await.is_none());
    }

    #[tokio::test]
    async fn test_clear_workspace_persists() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir).await;
        store.set_selected_workspace("w1".to_string()).await.unwrap();
        store.clear_selected_workspace().await.unwrap();

        let reopened = open(&dir).await;
        assert!(reopened.selected_workspace().await.is_none());
    }

    #[tokio::test]
    async fn test_retain_accessible_resets_stale_selection() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir).await;
        store.set_selected_workspace("gone".to_string()).await.unwrap();

        let accessible = vec![Workspace::new("w1", "u1", "Depot")];
        assert!(store.retain_accessible(&accessible, true).await.unwrap());
        assert!(store.selected_workspace().await.is_none());
    }

    #[tokio::test]
    async fn test_retain_accessible_ignores_loading_set() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir).await;
        store.set_selected_workspace("w1".to_string()).await.unwrap();

        assert!(!store.retain_accessible(&[], false).await.unwrap());
        assert_eq!(store.selected_workspace().await.as_deref(), Some("w1"));
    }

    #[tokio::test]
    async fn test_retain_accessible_clears_on_loaded_empty_set() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir).await;
        store.set_selected_workspace("w1".to_string()).await.unwrap();

        assert!(store.retain_accessible(&[], true).await.unwrap());
        assert!(store.selected_workspace().await.is_none());
        assert!(open(&dir).await.selected_workspace().await.is_none());
    }

    #[tokio::test]
    async fn test_failed_write_leaves_selection_unchanged() {
        let dir = TempDir::new().unwrap();
        // A regular file where the config directory should be.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let store = SelectionStore::open_at(blocker.join("selection.toml"))
            .await
            .unwrap();

        assert!(store.set_selected_workspace("w1".to_string()).await.is_err());
        assert!(store.selected_workspace().await.is_none());
    }
}
