//! The capability contract every per-repository search unit satisfies.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::RepoConfig;

/// Errors reported by a backend search unit.
#[derive(Debug, Clone, Error)]
pub enum SearchError {
    /// The query or a file filter is not a valid pattern.
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// The repository content could not be read.
    #[error("repository '{repo}' is unavailable: {reason}")]
    Unavailable { repo: String, reason: String },

    /// The backend could not be constructed.
    #[error("failed to create searcher for '{repo}': {reason}")]
    Construction { repo: String, reason: String },

    /// The backend task died before reporting.
    #[error("search task for '{repo}' failed: {reason}")]
    TaskFailed { repo: String, reason: String },
}

impl SearchError {
    pub fn invalid_pattern(pattern: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            reason: reason.to_string(),
        }
    }

    pub fn unavailable(repo: impl Into<String>, reason: impl ToString) -> Self {
        Self::Unavailable {
            repo: repo.into(),
            reason: reason.to_string(),
        }
    }

    pub fn construction(repo: impl Into<String>, reason: impl ToString) -> Self {
        Self::Construction {
            repo: repo.into(),
            reason: reason.to_string(),
        }
    }
}

/// Options for a single search, already clamped by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchOptions {
    pub ignore_case: bool,
    pub literal_search: bool,
    /// Only search files whose path matches this pattern.
    pub file_regexp: String,
    /// Skip files whose path matches this pattern.
    pub exclude_file_regexp: String,
    pub lines_of_context: u32,
    /// Offset into the matched-file list; `offset == limit == 0` means no slice.
    pub offset: usize,
    pub limit: usize,
    /// Cap on the total number of matching lines.
    pub max_results: i64,
}

/// One matching line with surrounding context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Match {
    pub line: String,
    pub line_number: usize,
    pub before: Vec<String>,
    pub after: Vec<String>,
}

/// All matching lines within one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FileMatch {
    pub filename: String,
    pub matches: Vec<Match>,
}

/// A backend's answer to a search with at least one match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SearchResponse {
    pub matches: Vec<FileMatch>,
    pub files_with_match: usize,
    pub files_opened: usize,
    pub revision: String,
}

/// A per-repository search unit.
///
/// Implementations must tolerate concurrent `search` and `update` calls.
pub trait Searcher: Send + Sync {
    /// Run a query. `Ok(None)` means the repository has no matches.
    fn search(&self, query: &str, opts: &SearchOptions)
        -> Result<Option<SearchResponse>, SearchError>;

    /// Request a content refresh. Returns whether the refresh was accepted.
    fn update(&self) -> bool;

    /// Configuration this searcher was built from.
    fn repo(&self) -> &RepoConfig;

    /// Exclusion report, returned to clients verbatim.
    fn excluded_files(&self) -> String;
}

/// Builds searchers for newly registered repositories.
pub trait SearcherFactory: Send + Sync {
    fn build(&self, name: &str, repo: &RepoConfig) -> Result<Arc<dyn Searcher>, SearchError>;
}
