//! Scatter-gather search across many repositories.

use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;

use crate::backend::{RegistrySnapshot, SearchError, SearchOptions, SearchResponse};

/// Aggregate result of a fan-out search.
#[derive(Debug, Default)]
pub struct SearchOutcome {
    /// Results keyed by repository; repositories without matches are absent.
    pub results: HashMap<String, SearchResponse>,
    /// Sum of `files_opened` over the repositories with matches.
    pub files_opened: usize,
    pub duration_ms: u64,
}

/// Search every named repository in parallel.
///
/// Names are de-duplicated and names missing from `snapshot` are dropped.
/// The first error reported by any repository is returned on its own and
/// voids every other result. Searches still running at that point finish in
/// the background; the channel holds one slot per search so their late
/// results are delivered into the void instead of blocking.
pub async fn dispatch(
    query: &str,
    opts: &SearchOptions,
    repos: &[String],
    snapshot: &RegistrySnapshot,
) -> Result<SearchOutcome, SearchError> {
    let started = Instant::now();

    let mut seen = HashSet::new();
    let targets: Vec<_> = repos
        .iter()
        .filter(|name| seen.insert(name.as_str()))
        .filter_map(|name| snapshot.get(name).map(|s| (name.clone(), Arc::clone(s))))
        .collect();

    let n = targets.len();
    if n == 0 {
        return Ok(SearchOutcome {
            duration_ms: elapsed_ms(started),
            ..Default::default()
        });
    }

    let (tx, mut rx) = mpsc::channel(n);
    let query: Arc<str> = Arc::from(query);
    let opts = Arc::new(opts.clone());

    for (name, searcher) in targets {
        let tx = tx.clone();
        let query = Arc::clone(&query);
        let opts = Arc::clone(&opts);
        tokio::task::spawn_blocking(move || {
            let result = std::panic::catch_unwind(AssertUnwindSafe(|| searcher.search(&query, &opts)))
                .unwrap_or_else(|_| {
                    Err(SearchError::TaskFailed {
                        repo: name.clone(),
                        reason: "search panicked".to_string(),
                    })
                });
            // Fails only when the receiver already returned.
            let _ = tx.try_send((name, result));
        });
    }
    drop(tx);

    let mut outcome = SearchOutcome::default();
    for _ in 0..n {
        let Some((name, result)) = rx.recv().await else {
            return Err(SearchError::TaskFailed {
                repo: "<unknown>".to_string(),
                reason: "search task exited without reporting".to_string(),
            });
        };

        match result {
            Ok(Some(response)) => {
                outcome.files_opened += response.files_opened;
                outcome.results.insert(name, response);
            }
            Ok(None) => {}
            Err(err) => {
                tracing::debug!(
                    repo = %name,
                    error = %err,
                    elapsed_ms = elapsed_ms(started),
                    "Fan-out search failed"
                );
                return Err(err);
            }
        }
    }

    outcome.duration_ms = elapsed_ms(started);
    tracing::debug!(
        repos = n,
        with_matches = outcome.results.len(),
        files_opened = outcome.files_opened,
        duration_ms = outcome.duration_ms,
        "Fan-out search complete"
    );
    Ok(outcome)
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
