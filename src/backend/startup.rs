use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::backend::searcher::{Searcher, SearcherFactory};
use crate::config::RepoConfig;

/// Build a searcher for every configured repository in parallel.
///
/// Repositories whose searcher cannot be built are logged and left out; one
/// broken repository never keeps the others from serving.
pub async fn build_searchers(
    repos: &BTreeMap<String, RepoConfig>,
    factory: Arc<dyn SearcherFactory>,
) -> HashMap<String, Arc<dyn Searcher>> {
    let tasks: Vec<_> = repos
        .iter()
        .map(|(name, repo)| {
            let task_name = name.clone();
            let repo = repo.clone();
            let factory = Arc::clone(&factory);
            let task = tokio::task::spawn_blocking(move || factory.build(&task_name, &repo));
            (name.clone(), task)
        })
        .collect();

    let mut searchers = HashMap::with_capacity(tasks.len());
    for (name, task) in tasks {
        match task.await {
            Ok(Ok(searcher)) => {
                searchers.insert(name, searcher);
            }
            Ok(Err(e)) => {
                tracing::error!(repo = %name, error = %e, "Failed to build searcher, skipping");
            }
            Err(e) => {
                tracing::error!(repo = %name, error = %e, "Searcher build task failed, skipping");
            }
        }
    }

    tracing::info!(
        configured = repos.len(),
        ready = searchers.len(),
        "Initial searchers built"
    );
    searchers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::searcher::{SearchError, SearchOptions, SearchResponse};

    struct Plain(RepoConfig);

    impl Searcher for Plain {
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

    /// Fails for any repository whose url contains "broken".
    struct Picky;

    impl SearcherFactory for Picky {
        fn build(&self, name: &str, repo: &RepoConfig) -> Result<Arc<dyn Searcher>, SearchError> {
            if repo.url.contains("broken") {
                return Err(SearchError::construction(name, "unreachable url"));
            }
            Ok(Arc::new(Plain(repo.clone())))
        }
    }

    #[tokio::test]
    async fn test_failures_are_skipped() {
        let mut repos = BTreeMap::new();
        repos.insert("good".to_string(), RepoConfig::new("file:///good"));
        repos.insert("bad".to_string(), RepoConfig::new("file:///broken"));
        repos.insert("also-good".to_string(), RepoConfig::new("file:///other"));

        let searchers = build_searchers(&repos, Arc::new(Picky)).await;

        let mut names: Vec<_> = searchers.keys().cloned().collect();
        names.sort();
        assert_eq!(names, vec!["also-good", "good"]);
        assert_eq!(searchers["good"].repo().url, "file:///good");
    }
}
