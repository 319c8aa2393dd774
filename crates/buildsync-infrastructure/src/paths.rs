//! Path management for buildsync configuration and state files.
//!
//! ```text
//! ~/.config/buildsync/
//! ├── config.toml        # Backend and logging configuration
//! └── selection.toml     # Last selected workspace
//! ```

use std::path::PathBuf;

use buildsync_core::error::{BuildsyncError, Result};

const APP_DIR_NAME: &str = "buildsync";
const CONFIG_FILE: &str = "config.toml";
const SELECTION_FILE: &str = "selection.toml";

/// Resolves file locations, optionally rooted at an explicit base directory.
///
/// `BuildsyncPaths::new(None)` uses the platform config directory; tests pass
/// a temporary directory instead.
#[derive(Debug, Clone, Default)]
pub struct BuildsyncPaths {
    base_dir: Option<PathBuf>,
}

impl BuildsyncPaths {
    pub fn new(base_dir: Option<PathBuf>) -> Self {
        Self { base_dir }
    }

    /// Returns the buildsync configuration directory.
    pub fn config_dir(&self) -> Result<PathBuf> {
        if let Some(base) = &self.base_dir {
            return Ok(base.clone());
        }
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR_NAME))
            .ok_or_else(|| BuildsyncError::config("Cannot find platform config directory"))
    }

    pub fn config_file(&self) -> Result<PathBuf> {
        Ok(self.config_dir()?.join(CONFIG_FILE))
    }

    pub fn selection_file(&self) -> Result<PathBuf> {
        Ok(self.config_dir()?.join(SELECTION_FILE))
    }
}
