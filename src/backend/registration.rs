//! Runtime repository registration, reconfiguration and removal.
//!
//! Registration touches two pieces of state, the persisted config and the
//! live registry. The config write happens first and is undone if the
//! searcher cannot be built, so the registry never holds a repository the
//! config file lacks, and the config file never keeps one the registry
//! rejected.

use std::sync::Arc;

use thiserror::Error;

use crate::backend::registry::BackendRegistry;
use crate::backend::searcher::{SearchError, Searcher, SearcherFactory};
use crate::config::{ConfigError, ConfigStore, RepoConfig};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("repository '{0}' already exists")]
    Duplicate(String),

    #[error("repository '{0}' not found")]
    Missing(String),

    #[error("failed to save config: {0}")]
    Storage(#[from] ConfigError),

    #[error(transparent)]
    Construction(#[from] SearchError),
}

impl BackendRegistry {
    /// Register a new repository: persist, build, install, then refresh.
    ///
    /// Concurrent registrations are serialized so the duplicate check and the
    /// install are atomic with respect to each other. The initial refresh is
    /// best-effort and only logged when rejected.
    pub fn register(
        &self,
        name: &str,
        repo: RepoConfig,
        config: &ConfigStore,
        factory: &dyn SearcherFactory,
    ) -> Result<Arc<dyn Searcher>, RegistryError> {
        let _serialized = self.registration.lock();

        if self.contains(name) {
            return Err(RegistryError::Duplicate(name.to_string()));
        }
        self.persist_and_install(name, repo, config, factory)
    }

    /// Replace an existing repository's configuration and rebuild its searcher.
    ///
    /// The entry must already be in the config file; it does not have to be
    /// live, so a repository that failed to build at startup can be repaired.
    /// On failure the old entry and the old searcher stay in place.
    pub fn reconfigure(
        &self,
        name: &str,
        repo: RepoConfig,
        config: &ConfigStore,
        factory: &dyn SearcherFactory,
    ) -> Result<Arc<dyn Searcher>, RegistryError> {
        let _serialized = self.registration.lock();

        if config.repo(name).is_none() {
            return Err(RegistryError::Missing(name.to_string()));
        }
        self.persist_and_install(name, repo, config, factory)
    }

    /// Drop a repository from the config file, then from the live registry.
    ///
    /// Searches already holding a snapshot finish against the old searcher.
    pub fn unregister(&self, name: &str, config: &ConfigStore) -> Result<RepoConfig, RegistryError> {
        let _serialized = self.registration.lock();

        let Some(previous) = config.remove_repo(name) else {
            return Err(RegistryError::Missing(name.to_string()));
        };
        if let Err(e) = config.save() {
            config.insert_repo(name, previous);
            return Err(e.into());
        }
        self.remove(name);
        Ok(previous)
    }

    fn persist_and_install(
        &self,
        name: &str,
        repo: RepoConfig,
        config: &ConfigStore,
        factory: &dyn SearcherFactory,
    ) -> Result<Arc<dyn Searcher>, RegistryError> {
        let previous = config.insert_repo(name, repo.clone());
        let rollback = scopeguard::guard(previous, |previous| {
            match previous {
                Some(old) => config.insert_repo(name, old),
                None => config.remove_repo(name),
            };
            if let Err(e) = config.save() {
                tracing::error!(repo = %name, error = %e, "Failed to roll back config after failed registration");
            }
        });

        config.save()?;
        let searcher = factory.build(name, &repo)?;
        scopeguard::ScopeGuard::into_inner(rollback);

        self.insert(name, Arc::clone(&searcher));

        if !searcher.update() {
            tracing::warn!(repo = %name, "Initial refresh rejected for new repository");
        }
        Ok(searcher)
    }
}
