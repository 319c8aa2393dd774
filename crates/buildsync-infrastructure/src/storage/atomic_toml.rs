//! Atomic TOML file operations.
//!
//! Writes go to a sibling temp file which is fsynced and renamed over the
//! target, under an exclusive lock file, so a crash never leaves a torn file.

use std::fs::{self, File, OpenOptions};
use std::io::Write as IoWrite;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use buildsync_core::error::{BuildsyncError, Result};
use serde::{Serialize, de::DeserializeOwned};

/// A typed handle to a TOML document on disk.
pub struct AtomicTomlFile<T> {
    path: PathBuf,
    _phantom: PhantomData<T>,
}

impl<T> AtomicTomlFile<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _phantom: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads and deserializes the document.
    ///
    /// A missing or blank file yields `Ok(None)`.
    pub fn load(&self) -> Result<Option<T>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(None);
        }

        Ok(Some(toml::from_str(&content)?))
    }

    /// Serializes `data` and replaces the file atomically.
    pub fn save(&self, data: &T) -> Result<()> {
        let _lock = FileLock::acquire(&self.path)?;
        self.write_unlocked(data)
    }

    /// Load-modify-save under one lock. `default_value` is used when the file
    /// does not exist yet. Returns the value that was written.
    pub fn update<F>(&self, default_value: T, f: F) -> Result<T>
    where
        F: FnOnce(&mut T),
    {
        let _lock = FileLock::acquire(&self.path)?;
        let mut data = self.load()?.unwrap_or(default_value);
        f(&mut data);
        self.write_unlocked(&data)?;
        Ok(data)
    }

    fn write_unlocked(&self, data: &T) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent)?;
        }

        let text = toml::to_string_pretty(data)?;
        let tmp_path = self.temp_path()?;
        let mut tmp_file = File::create(&tmp_path)?;
        tmp_file.write_all(text.as_bytes())?;
        tmp_file.sync_all()?;
        drop(tmp_file);

        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn temp_path(&self) -> Result<PathBuf> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| BuildsyncError::io("Path has no parent directory"))?;
        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| BuildsyncError::io("Path has no file name"))?;
        Ok(parent.join(format!(".{}.tmp", file_name.to_string_lossy())))
    }
}

/// Exclusive lock held on `<file>.lock` for the guard's lifetime.
struct FileLock {
    file: File,
    lock_path: PathBuf,
}

impl FileLock {
    fn acquire(path: &Path) -> Result<Self> {
        let lock_path = path.with_extension("lock");
        if let Some(parent) = lock_path.parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        fs2::FileExt::lock_exclusive(&file)
            .map_err(|e| BuildsyncError::io(format!("Failed to acquire lock: {}", e)))?;

        Ok(Self { file, lock_path })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
        let _ = fs::remove_file(&self.lock_path);
    }
}
