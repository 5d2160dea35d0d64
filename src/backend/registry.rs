//! Backend registry with hot-swap support.
//!
//! The installed map is immutable: writers build a new map off to the side
//! and swap it in under the write lock, so a snapshot taken by a reader is
//! never affected by later insertions or replacements.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::backend::searcher::Searcher;

/// Immutable point-in-time view of the registry.
pub type RegistrySnapshot = Arc<HashMap<String, Arc<dyn Searcher>>>;

/// Thread-safe mapping from repository name to its searcher.
///
/// Many concurrent readers (searches) share the current snapshot,
/// while writes (registration, startup) are exclusive and brief.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    inner: Arc<RwLock<RegistryInner>>,
    /// Held for the whole of a runtime registration.
    pub(super) registration: Arc<Mutex<()>>,
}

#[derive(Default)]
struct RegistryInner {
    searchers: RegistrySnapshot,
    /// Bumped on every installed change.
    generation: u64,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry pre-populated with `searchers`.
    pub fn with_searchers(searchers: HashMap<String, Arc<dyn Searcher>>) -> Self {
        let registry = Self::new();
        registry.replace(searchers);
        registry
    }

    /// The current mapping. Cheap: clones one `Arc`.
    pub fn snapshot(&self) -> RegistrySnapshot {
        Arc::clone(&self.inner.read().searchers)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Searcher>> {
        self.inner.read().searchers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.read().searchers.contains_key(name)
    }

    /// Add or overwrite one entry.
    pub fn insert(&self, name: impl Into<String>, searcher: Arc<dyn Searcher>) {
        let name = name.into();
        let mut state = self.inner.write();
        let mut next = HashMap::clone(&state.searchers);
        let replaced = next.insert(name.clone(), searcher).is_some();
        state.searchers = Arc::new(next);
        state.generation += 1;

        tracing::info!(
            repo = %name,
            replaced,
            generation = state.generation,
            "Backend registered"
        );
    }

    /// Remove one entry. Returns the removed searcher, if any.
    pub fn remove(&self, name: &str) -> Option<Arc<dyn Searcher>> {
        let mut state = self.inner.write();
        if !state.searchers.contains_key(name) {
            return None;
        }
        let mut next = HashMap::clone(&state.searchers);
        let removed = next.remove(name);
        state.searchers = Arc::new(next);
        state.generation += 1;

        tracing::info!(repo = %name, generation = state.generation, "Backend removed");
        removed
    }

    /// Install an entirely new mapping.
    pub fn replace(&self, searchers: HashMap<String, Arc<dyn Searcher>>) {
        let count = searchers.len();
        let next = Arc::new(searchers);
        let mut state = self.inner.write();
        state.searchers = next;
        state.generation += 1;

        tracing::info!(
            backends = count,
            generation = state.generation,
            "Backend set replaced"
        );
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.read().searchers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.inner.read().searchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of changes installed so far.
    pub fn generation(&self) -> u64 {
        self.inner.read().generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::searcher::{SearchError, SearchOptions, SearchResponse};
    use crate::config::RepoConfig;

    struct Named(RepoConfig);

    impl Searcher for Named {
        fn search(&self, _: &str, _: &SearchOptions) -> Result<Option<SearchResponse>, SearchError> {
            Ok(None)
        }
        fn update(&self) -> bool {
            true
        }
        fn repo(&self) -> &RepoConfig {
            &self.0
        }
        fn excluded_files(&self) -> String {
            String::new()
        }
    }

    fn searcher(url: &str) -> Arc<dyn Searcher> {
        Arc::new(Named(RepoConfig::new(url)))
    }

    #[test]
    fn test_insert_visible_to_later_reads() {
        let registry = BackendRegistry::new();
        registry.insert("alpha", searcher("a"));

        assert!(registry.contains("alpha"));
        assert_eq!(registry.get("alpha").unwrap().repo().url, "a");
        assert_eq!(registry.names(), vec!["alpha".to_string()]);
    }

    #[test]
    fn test_snapshot_unaffected_by_later_insert() {
        let registry = BackendRegistry::new();
        registry.insert("alpha", searcher("a"));

        let before = registry.snapshot();
        registry.insert("beta", searcher("b"));

        assert_eq!(before.len(), 1);
        assert!(!before.contains_key("beta"));
        assert_eq!(registry.snapshot().len(), 2);
    }

    #[test]
    fn test_replace_installs_whole_map() {
        let registry = BackendRegistry::new();
        registry.insert("alpha", searcher("a"));

        let mut next = HashMap::new();
        next.insert("beta".to_string(), searcher("b"));
        next.insert("gamma".to_string(), searcher("c"));
        registry.replace(next);

        assert_eq!(registry.names(), vec!["beta".to_string(), "gamma".to_string()]);
        assert!(registry.get("alpha").is_none());
    }

    #[test]
    fn test_insert_overwrites_existing() {
        let registry = BackendRegistry::new();
        registry.insert("alpha", searcher("old"));
        registry.insert("alpha", searcher("new"));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("alpha").unwrap().repo().url, "new");
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let registry = BackendRegistry::new();
        registry.insert("alpha", searcher("a"));
        let generation = registry.generation();

        assert!(registry.remove("nonexistent").is_none());
        assert_eq!(registry.generation(), generation);
        assert!(registry.remove("alpha").is_some());
        assert!(registry.is_empty());
    }
}
