use buildsync_core::config::BackendSettings;
use buildsync_core::error::Result;
use once_cell::sync::OnceCell;

use super::repositories::RestBackend;

/// Backend constructed from configuration on first use.
///
/// A failed construction is not cached; the next `get` tries again.
pub struct BackendHandle {
    settings: BackendSettings,
    backend: OnceCell<RestBackend>,
}

impl BackendHandle {
    pub fn new(settings: BackendSettings) -> Self {
        Self {
            settings,
            backend: OnceCell::new(),
        }
    }

    pub fn settings(&self) -> &BackendSettings {
        &self.settings
    }

    /// Returns the backend, building it on the first call.
    pub fn get(&self) -> Result<&RestBackend> {
        self.backend.get_or_try_init(|| {
            tracing::debug!("[Backend] Initializing REST backend for {}", self.settings.url);
            RestBackend::from_settings(&self.settings)
        })
    }

    pub fn is_initialized(&self) -> bool {
        self.backend.get().is_some()
    }
}
