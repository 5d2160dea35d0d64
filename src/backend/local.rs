//! Searcher over a local checkout directory.
//!
//! Files are listed on construction and on every accepted `update()`;
//! contents are read from disk at query time.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use walkdir::WalkDir;

use crate::backend::searcher::{
    FileMatch, Match, SearchError, SearchOptions, SearchResponse, Searcher, SearcherFactory,
};
use crate::config::RepoConfig;

/// Files larger than this are excluded from search.
const MAX_FILE_SIZE: u64 = 1 << 20;

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ExcludedFile {
    filename: String,
    reason: String,
}

#[derive(Default)]
struct FileIndex {
    files: Arc<Vec<String>>,
    excluded: String,
    revision: u64,
}

pub struct LocalSearcher {
    name: String,
    repo: RepoConfig,
    root: PathBuf,
    excludes: Vec<Regex>,
    index: RwLock<FileIndex>,
}

impl LocalSearcher {
    /// Create a searcher rooted at `root` and take the first file listing.
    pub fn new(
        name: impl Into<String>,
        repo: RepoConfig,
        root: impl Into<PathBuf>,
    ) -> Result<Self, SearchError> {
        let name = name.into();
        let excludes = repo
            .exclude
            .iter()
            .map(|rule| {
                Regex::new(rule).map_err(|e| {
                    SearchError::construction(&name, format!("bad exclusion rule '{}': {}", rule, e))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let searcher = Self {
            name,
            repo,
            root: root.into(),
            excludes,
            index: RwLock::new(FileIndex::default()),
        };
        searcher.refresh();
        Ok(searcher)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Re-list the checkout and rebuild the exclusion report.
    pub fn refresh(&self) {
        let mut files = Vec::new();
        let mut excluded = Vec::new();

        if self.root.is_dir() {
            let walker = WalkDir::new(&self.root)
                .follow_links(false)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()));

            for entry in walker.filter_map(Result::ok) {
                if !entry.file_type().is_file() {
                    continue;
                }
                let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                    continue;
                };
                let relative = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");

                if let Some(rule) = self.excludes.iter().find(|r| r.is_match(&relative)) {
                    excluded.push(ExcludedFile {
                        filename: relative,
                        reason: format!("matches exclusion rule `{}`", rule.as_str()),
                    });
                    continue;
                }
                if entry.metadata().map(|m| m.len() > MAX_FILE_SIZE).unwrap_or(false) {
                    excluded.push(ExcludedFile {
                        filename: relative,
                        reason: "file too large".to_string(),
                    });
                    continue;
                }
                files.push(relative);
            }
        } else {
            tracing::warn!(
                repo = %self.name,
                root = %self.root.display(),
                "Checkout directory missing; serving empty index"
            );
        }

        let excluded = serde_json::to_string(&excluded).unwrap_or_else(|_| "[]".to_string());
        let mut index = self.index.write();
        index.revision += 1;
        tracing::debug!(
            repo = %self.name,
            files = files.len(),
            revision = index.revision,
            "Refreshed file listing"
        );
        index.files = Arc::new(files);
        index.excluded = excluded;
    }

    fn revision(&self, counter: u64) -> String {
        format!(
            "{}@{}",
            self.repo.reference.as_deref().unwrap_or("HEAD"),
            counter
        )
    }
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().map(|s| s.starts_with('.')).unwrap_or(false)
}

fn compile_filter(pattern: &str) -> Result<Option<Regex>, SearchError> {
    if pattern.is_empty() {
        return Ok(None);
    }
    Regex::new(pattern)
        .map(Some)
        .map_err(|e| SearchError::invalid_pattern(pattern, e))
}

fn context(lines: &[&str], from: usize, to: usize) -> Vec<String> {
    lines[from..to].iter().map(|l| l.to_string()).collect()
}

impl Searcher for LocalSearcher {
    fn search(
        &self,
        query: &str,
        opts: &SearchOptions,
    ) -> Result<Option<SearchResponse>, SearchError> {
        if query.is_empty() {
            return Ok(None);
        }

        let pattern = if opts.literal_search {
            regex::escape(query)
        } else {
            query.to_string()
        };
        let matcher = RegexBuilder::new(&pattern)
            .case_insensitive(opts.ignore_case)
            .build()
            .map_err(|e| SearchError::invalid_pattern(query, e))?;
        let include = compile_filter(&opts.file_regexp)?;
        let exclude = compile_filter(&opts.exclude_file_regexp)?;

        let (files, revision) = {
            let index = self.index.read();
            (Arc::clone(&index.files), index.revision)
        };

        let ctx = opts.lines_of_context as usize;
        let cap = usize::try_from(opts.max_results).ok().filter(|&n| n > 0);
        let mut files_opened = 0;
        let mut total = 0;
        let mut file_matches = Vec::new();

        'files: for relative in files.iter() {
            if include.as_ref().is_some_and(|r| !r.is_match(relative)) {
                continue;
            }
            if exclude.as_ref().is_some_and(|r| r.is_match(relative)) {
                continue;
            }

            let bytes = match std::fs::read(self.root.join(relative)) {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(SearchError::unavailable(&self.name, e)),
            };
            files_opened += 1;
            // Binary content is not searchable.
            let Ok(text) = std::str::from_utf8(&bytes) else {
                continue;
            };

            let lines: Vec<&str> = text.lines().collect();
            let mut matches = Vec::new();
            for (i, line) in lines.iter().enumerate() {
                if !matcher.is_match(line) {
                    continue;
                }
                matches.push(Match {
                    line: line.to_string(),
                    line_number: i + 1,
                    before: context(&lines, i.saturating_sub(ctx), i),
                    after: context(&lines, i + 1, (i + 1 + ctx).min(lines.len())),
                });
                total += 1;
                if cap.is_some_and(|cap| total >= cap) {
                    file_matches.push(FileMatch {
                        filename: relative.clone(),
                        matches,
                    });
                    break 'files;
                }
            }
            if !matches.is_empty() {
                file_matches.push(FileMatch {
                    filename: relative.clone(),
                    matches,
                });
            }
        }

        if file_matches.is_empty() {
            return Ok(None);
        }

        let files_with_match = file_matches.len();
        if opts.offset > 0 || opts.limit > 0 {
            let start = opts.offset.min(files_with_match);
            let end = if opts.limit == 0 {
                files_with_match
            } else {
                start.saturating_add(opts.limit).min(files_with_match)
            };
            file_matches = file_matches.drain(start..end).collect();
        }

        Ok(Some(SearchResponse {
            matches: file_matches,
            files_with_match,
            files_opened,
            revision: self.revision(revision),
        }))
    }

    fn update(&self) -> bool {
        if !self.repo.enable_push_updates {
            return false;
        }
        self.refresh();
        true
    }

    fn repo(&self) -> &RepoConfig {
        &self.repo
    }

    fn excluded_files(&self) -> String {
        self.index.read().excluded.clone()
    }
}

/// Builds [`LocalSearcher`]s, placing non-local checkouts under `data_dir`.
pub struct LocalSearcherFactory {
    data_dir: PathBuf,
}

impl LocalSearcherFactory {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Directory a repository is served from.
    pub fn checkout_dir(&self, name: &str, repo: &RepoConfig) -> PathBuf {
        if let Some(path) = repo.url.strip_prefix("file://") {
            return PathBuf::from(path);
        }
        let path = Path::new(&repo.url);
        if path.is_absolute() {
            return path.to_path_buf();
        }
        self.data_dir.join(format!("vcs-{}", escape_dir_name(name)))
    }
}

/// Map a repository name onto one path component, one-to-one.
///
/// ASCII letters, digits and `-` pass through; every other byte, `_`
/// included, becomes `_XX` in upper-case hex.
fn escape_dir_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("_{:02X}", byte));
        }
    }
    out
}

impl SearcherFactory for LocalSearcherFactory {
    fn build(&self, name: &str, repo: &RepoConfig) -> Result<Arc<dyn Searcher>, SearchError> {
        std::fs::create_dir_all(&self.data_dir)
            .map_err(|e| SearchError::construction(name, e))?;
        let root = self.checkout_dir(name, repo);
        let searcher = LocalSearcher::new(name, repo.clone(), root)?;
        Ok(Arc::new(searcher))
    }
}
