//! Thread-safe configuration storage.
//!
//! Holds the live config behind a read-write lock and persists the
//! repository map back to disk when repositories are registered.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs2::FileExt;
use parking_lot::RwLock;

use crate::config::loader::ConfigError;
use crate::config::types::{Config, RepoConfig, SearchLimits};

/// Thread-safe config container with interior mutability.
///
/// Allows multiple readers to access config concurrently while
/// supporting atomic updates when needed.
#[derive(Clone)]
pub struct ConfigStore {
    inner: Arc<RwLock<Config>>,
    path: PathBuf,
}

impl ConfigStore {
    /// Create a new ConfigStore from initial config and path.
    pub fn new(config: Config, path: PathBuf) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
            path,
        }
    }

    /// Get a clone of the current config.
    pub fn get(&self) -> Config {
        self.inner.read().clone()
    }

    /// Query limits, without cloning the repository map.
    pub fn search_limits(&self) -> SearchLimits {
        self.inner.read().search.clone()
    }

    pub fn min_password_len(&self) -> usize {
        self.inner.read().auth.min_password_len
    }

    pub fn ui_dir(&self) -> Option<PathBuf> {
        self.inner.read().server.ui_dir.clone()
    }

    /// Every repository entry, ordered by name.
    pub fn repos(&self) -> Vec<(String, RepoConfig)> {
        self.inner
            .read()
            .repos
            .iter()
            .map(|(name, repo)| (name.clone(), repo.clone()))
            .collect()
    }

    /// Look up one repository's configuration.
    pub fn repo(&self, name: &str) -> Option<RepoConfig> {
        self.inner.read().repos.get(name).cloned()
    }

    /// Add or replace a repository entry in memory. Returns the previous entry.
    pub fn insert_repo(&self, name: &str, repo: RepoConfig) -> Option<RepoConfig> {
        self.inner.write().repos.insert(name.to_string(), repo)
    }

    /// Drop a repository entry in memory. Returns the removed entry.
    pub fn remove_repo(&self, name: &str) -> Option<RepoConfig> {
        self.inner.write().repos.remove(name)
    }

    /// Persist the current config to its file.
    ///
    /// The TOML is rendered from a snapshot taken under the read lock, then
    /// written through a temp file and renamed into place while holding an
    /// exclusive lock on a sibling `.lock` file.
    pub fn save(&self) -> Result<(), ConfigError> {
        let rendered = toml::to_string_pretty(&*self.inner.read())?;
        write_locked(&self.path, rendered.as_bytes()).map_err(|e| ConfigError::WriteError {
            path: self.path.clone(),
            source: e,
        })?;
        tracing::debug!(path = %self.path.display(), "Saved config");
        Ok(())
    }

    /// Reload config from the file.
    ///
    /// On success, atomically replaces the current config.
    /// On failure, keeps the old config and returns the error.
    pub fn reload(&self) -> Result<(), ConfigError> {
        let config = Config::load_from(&self.path)?;
        *self.inner.write() = config;
        Ok(())
    }

    /// Get the config file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Replace `path` with `contents` so readers see either the old or the new file.
pub(crate) fn write_locked(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }

    let lock_file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path.with_extension("lock"))?;
    lock_file.lock_exclusive()?;
    let _unlock = scopeguard::guard(&lock_file, |f| {
        let _ = FileExt::unlock(f);
    });

    let tmp = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp)?;
        file.write_all(contents)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)
}
