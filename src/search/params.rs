//! Query-string parsing for the search and update endpoints.
//!
//! Parsing never fails: malformed values fall back to defaults or bounds so a
//! sloppy front end still gets an answer.

use std::collections::HashMap;
use std::str::FromStr;

use crate::backend::{RegistrySnapshot, SearchOptions};
use crate::config::SearchLimits;

/// Truthy flag values: `true`, `1` or `fosho`, case-insensitive.
pub fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "fosho"
    )
}

/// Parse `raw` and clamp into `[min, max]`; missing or unparsable gives `default`.
pub fn clamp_param<T>(raw: Option<&str>, min: T, max: T, default: T) -> T
where
    T: FromStr + PartialOrd + Copy,
{
    let Some(value) = raw.and_then(|s| s.trim().parse::<T>().ok()) else {
        return default;
    };
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}

/// Parse an `offset:limit` range. Anything malformed yields `(0, 0)`.
pub fn parse_range(value: &str) -> (usize, usize) {
    let Some((begin, end)) = value.split_once(':') else {
        return (0, 0);
    };
    let bound = |s: &str| s.trim().parse::<usize>().unwrap_or(0);
    (bound(begin), bound(end))
}

/// Which repositories a request targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoSelector {
    All,
    Named(Vec<String>),
}

impl RepoSelector {
    /// `*` or an empty value selects every repository; otherwise a
    /// comma-separated list of names.
    pub fn parse(value: &str) -> Self {
        if value.trim().is_empty() {
            return Self::All;
        }
        Self::parse_explicit(value)
    }

    /// Like [`RepoSelector::parse`], but only `*` selects every repository.
    /// An empty value names none, so an update request without a list is a
    /// no-op.
    pub fn parse_explicit(value: &str) -> Self {
        let value = value.trim();
        if value == "*" {
            return Self::All;
        }
        let mut names: Vec<String> = Vec::new();
        for name in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        Self::Named(names)
    }

    /// Expand against `snapshot`, silently dropping unknown names.
    pub fn resolve(&self, snapshot: &RegistrySnapshot) -> Vec<String> {
        match self {
            Self::All => {
                let mut names: Vec<String> = snapshot.keys().cloned().collect();
                names.sort();
                names
            }
            Self::Named(names) => names
                .iter()
                .filter(|name| snapshot.contains_key(name.as_str()))
                .cloned()
                .collect(),
        }
    }

    /// Expand against `snapshot`, failing with the first unknown name.
    pub fn resolve_strict(&self, snapshot: &RegistrySnapshot) -> Result<Vec<String>, String> {
        match self {
            Self::All => Ok(self.resolve(snapshot)),
            Self::Named(names) => match names.iter().find(|n| !snapshot.contains_key(n.as_str())) {
                Some(missing) => Err(missing.clone()),
                None => Ok(names.clone()),
            },
        }
    }
}

/// A fully parsed `/api/v1/search` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: String,
    pub repos: Vec<String>,
    pub options: SearchOptions,
    pub stats: bool,
}

impl SearchRequest {
    /// Build from raw query-string pairs, clamping numeric values to `limits`
    /// and expanding the repository selector against `snapshot`.
    pub fn from_params(
        params: &HashMap<String, String>,
        limits: &SearchLimits,
        snapshot: &RegistrySnapshot,
    ) -> Self {
        let get = |key: &str| params.get(key).map(String::as_str);
        let flag = |key: &str| get(key).map(parse_bool).unwrap_or(false);

        let (offset, limit) = parse_range(get("rng").unwrap_or(""));
        let options = SearchOptions {
            ignore_case: flag("i"),
            literal_search: flag("literal"),
            file_regexp: get("files").unwrap_or("").to_string(),
            exclude_file_regexp: get("excludeFiles").unwrap_or("").to_string(),
            lines_of_context: clamp_param(
                get("ctx"),
                0,
                limits.max_context,
                limits.default_context,
            ),
            offset,
            limit,
            max_results: clamp_param(
                get("limit"),
                limits.min_limit,
                limits.max_limit,
                limits.default_limit,
            ),
        };

        Self {
            query: get("q").unwrap_or("").to_string(),
            repos: RepoSelector::parse(get("repos").unwrap_or("")).resolve(snapshot),
            options,
            stats: flag("stats"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{SearchError, SearchResponse, Searcher};
    use crate::config::RepoConfig;
    use std::sync::Arc;

    struct Empty(RepoConfig);

    impl Searcher for Empty {
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

    fn snapshot(names: &[&str]) -> RegistrySnapshot {
        Arc::new(
            names
                .iter()
                .map(|n| {
                    let searcher: Arc<dyn Searcher> = Arc::new(Empty(RepoConfig::new("file:///x")));
                    (n.to_string(), searcher)
                })
                .collect(),
        )
    }

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_bool() {
        for yes in ["true", "TRUE", "1", "fosho", " True "] {
            assert!(parse_bool(yes), "{yes}");
        }
        for no in ["", "false", "0", "yes", "on"] {
            assert!(!parse_bool(no), "{no}");
        }
    }

    #[test]
    fn test_clamp_boundaries() {
        assert_eq!(clamp_param(Some("0"), 1i64, 100, 50), 1);
        assert_eq!(clamp_param(Some("1"), 1i64, 100, 50), 1);
        assert_eq!(clamp_param(Some("100"), 1i64, 100, 50), 100);
        assert_eq!(clamp_param(Some("101"), 1i64, 100, 50), 100);
        assert_eq!(clamp_param(Some("-5"), 1i64, 100, 50), 1);
        assert_eq!(clamp_param(Some("abc"), 1i64, 100, 50), 50);
        assert_eq!(clamp_param(None, 1i64, 100, 50), 50);
        assert_eq!(clamp_param(Some("-1"), 0u32, 20, 2), 2);
    }

    #[test]
    fn test_clamp_is_idempotent() {
        for raw in ["0", "7", "1000", "junk"] {
            let once = clamp_param(Some(raw), 1i64, 100, 50);
            let twice = clamp_param(Some(&once.to_string()), 1i64, 100, 50);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_parse_range() {
        assert_eq!(parse_range("10:20"), (10, 20));
        assert_eq!(parse_range(":20"), (0, 20));
        assert_eq!(parse_range("10:"), (10, 0));
        assert_eq!(parse_range("nope"), (0, 0));
        assert_eq!(parse_range(""), (0, 0));
        assert_eq!(parse_range("-3:x"), (0, 0));
    }

    #[test]
    fn test_selector_wildcard_expands_to_snapshot() {
        let snap = snapshot(&["b", "a"]);
        assert_eq!(RepoSelector::parse("*").resolve(&snap), vec!["a", "b"]);
        assert_eq!(RepoSelector::parse("").resolve(&snap), vec!["a", "b"]);
    }

    #[test]
    fn test_explicit_selector_empty_names_nothing() {
        let snap = snapshot(&["b", "a"]);
        assert_eq!(RepoSelector::parse_explicit(""), RepoSelector::Named(vec![]));
        assert_eq!(RepoSelector::parse_explicit("  ").resolve_strict(&snap), Ok(vec![]));
        assert_eq!(RepoSelector::parse_explicit("*").resolve(&snap), vec!["a", "b"]);
        assert_eq!(
            RepoSelector::parse_explicit("a,a"),
            RepoSelector::Named(vec!["a".to_string()])
        );
    }

    #[test]
    fn test_selector_drops_unknown_names() {
        let snap = snapshot(&["a", "b"]);
        let selector = RepoSelector::parse("b, missing,b,a");
        assert_eq!(selector.resolve(&snap), vec!["b", "a"]);
        assert_eq!(selector.resolve_strict(&snap), Err("missing".to_string()));
        assert_eq!(
            RepoSelector::parse("a,b").resolve_strict(&snap),
            Ok(vec!["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn test_search_request_from_params() {
        let snap = snapshot(&["a", "b"]);
        let limits = SearchLimits::default();
        let request = SearchRequest::from_params(
            &params(&[
                ("q", "needle"),
                ("repos", "*"),
                ("i", "fosho"),
                ("rng", "5:10"),
                ("ctx", "99"),
                ("limit", "0"),
                ("files", r"\.rs$"),
                ("stats", "1"),
            ]),
            &limits,
            &snap,
        );

        assert_eq!(request.query, "needle");
        assert_eq!(request.repos, vec!["a", "b"]);
        assert!(request.stats);
        assert!(request.options.ignore_case);
        assert!(!request.options.literal_search);
        assert_eq!((request.options.offset, request.options.limit), (5, 10));
        assert_eq!(request.options.lines_of_context, limits.max_context);
        assert_eq!(request.options.max_results, limits.min_limit);
        assert_eq!(request.options.file_regexp, r"\.rs$");
    }

    #[test]
    fn test_search_request_defaults() {
        let limits = SearchLimits::default();
        let request = SearchRequest::from_params(&params(&[]), &limits, &snapshot(&["a"]));

        assert_eq!(request.query, "");
        assert_eq!(request.repos, vec!["a"]);
        assert!(!request.stats);
        assert_eq!(request.options.max_results, limits.default_limit);
        assert_eq!(request.options.lines_of_context, limits.default_context);
        assert_eq!((request.options.offset, request.options.limit), (0, 0));
    }
}
