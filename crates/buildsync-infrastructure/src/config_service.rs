//! Loads `config.toml` and applies environment overrides.

use std::path::PathBuf;

use buildsync_core::config::BuildsyncConfig;
use buildsync_core::error::Result;

use crate::paths::BuildsyncPaths;
use crate::storage::AtomicTomlFile;

pub const ENV_BACKEND_URL: &str = "BUILDSYNC_BACKEND_URL";
pub const ENV_ANON_KEY: &str = "BUILDSYNC_ANON_KEY";
pub const ENV_LOG_LEVEL: &str = "BUILDSYNC_LOG";

pub struct ConfigService {
    file: AtomicTomlFile<BuildsyncConfig>,
}

impl ConfigService {
    pub fn new(paths: &BuildsyncPaths) -> Result<Self> {
        Ok(Self::with_path(paths.config_file()?))
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self {
            file: AtomicTomlFile::new(path),
        }
    }

    /// Reads the file (defaults if missing) and applies environment overrides.
    pub fn load(&self) -> Result<BuildsyncConfig> {
        let mut config = self.file.load()?.unwrap_or_default();
        apply_overrides(&mut config, |key| std::env::var(key).ok());
        tracing::debug!(
            "[Config] Loaded from {:?} (backend configured: {})",
            self.file.path(),
            config.backend.is_configured()
        );
        Ok(config)
    }

    /// Persists the file-backed part of the configuration.
    pub fn save(&self, config: &BuildsyncConfig) -> Result<()> {
        self.file.save(config)
    }
}

fn apply_overrides<F>(config: &mut BuildsyncConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup(ENV_BACKEND_URL).filter(|v| !v.is_empty()) {
        config.backend.url = url;
    }
    if let Some(key) = lookup(ENV_ANON_KEY).filter(|v| !v.is_empty()) {
        config.backend.anon_key = key;
    }
    if let Some(level) = lookup(ENV_LOG_LEVEL).filter(|v| !v.is_empty()) {
        config.log.level = level;
    }
}
