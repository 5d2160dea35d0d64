//! Shared test utilities and stub search backends.

#![allow(dead_code, unused_imports)]

use std::collections::{BTreeMap, HashMap};
use std::net::{SocketAddr, TcpListener};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use searchgate::auth::{hash_password, TokenService};
use searchgate::backend::{
    BackendRegistry, FileMatch, Match, SearchError, SearchOptions, SearchResponse, Searcher,
    SearcherFactory,
};
use searchgate::config::{Config, ConfigStore, RepoConfig};
use searchgate::server::{build_router, AppContext};
use searchgate::users::{JsonUserStore, NewUser, Role, User, UserStore};
use tempfile::TempDir;
use tower::ServiceExt;

pub const TEST_SECRET: &[u8] = b"searchgate-test-secret";

/// Find an available port for testing.
pub fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind to free port");
    listener.local_addr().unwrap().port()
}

/// Create a temporary config file listing the given `(name, url)` repositories.
pub fn temp_config(repos: &[(&str, &str)]) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = temp_dir.path().join("config.toml");

    let mut content = String::from(
        r#"[server]
bind_addr = "127.0.0.1:0"

"#,
    );
    for (name, url) in repos {
        content.push_str(&format!("[repos.{}]\nurl = \"{}\"\n\n", name, url));
    }

    std::fs::write(&config_path, content).expect("Failed to write config");
    (temp_dir, config_path)
}

/// Wait for a server to become available.
pub async fn wait_for_server(addr: SocketAddr, timeout: Duration) -> bool {
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if tokio::net::TcpStream::connect(addr).await.is_ok() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

// -- Stub backends ------------------------------------------------------------

/// In-memory searcher over a fixed set of `(filename, lines)`.
pub struct StubSearcher {
    pub repo: RepoConfig,
    pub files: Vec<(String, Vec<String>)>,
    pub delay: Duration,
    pub updates: AtomicUsize,
}

impl StubSearcher {
    pub fn new(url: &str, files: &[(&str, &[&str])]) -> Self {
        Self {
            repo: RepoConfig::new(url),
            files: files
                .iter()
                .map(|(name, lines)| {
                    (
                        name.to_string(),
                        lines.iter().map(|l| l.to_string()).collect(),
                    )
                })
                .collect(),
            delay: Duration::ZERO,
            updates: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_push_updates(mut self, enabled: bool) -> Self {
        self.repo.enable_push_updates = enabled;
        self
    }

    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }
}

impl Searcher for StubSearcher {
    fn search(
        &self,
        query: &str,
        _opts: &SearchOptions,
    ) -> Result<Option<SearchResponse>, SearchError> {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if query.is_empty() {
            return Ok(None);
        }

        let matches: Vec<FileMatch> = self
            .files
            .iter()
            .filter_map(|(filename, lines)| {
                let hits: Vec<Match> = lines
                    .iter()
                    .enumerate()
                    .filter(|(_, line)| line.contains(query))
                    .map(|(i, line)| Match {
                        line: line.clone(),
                        line_number: i + 1,
                        before: vec![],
                        after: vec![],
                    })
                    .collect();
                (!hits.is_empty()).then(|| FileMatch {
                    filename: filename.clone(),
                    matches: hits,
                })
            })
            .collect();

        if matches.is_empty() {
            return Ok(None);
        }
        Ok(Some(SearchResponse {
            files_with_match: matches.len(),
            files_opened: self.files.len(),
            matches,
            revision: "stub".to_string(),
        }))
    }

    fn update(&self) -> bool {
        if !self.repo.enable_push_updates {
            return false;
        }
        self.updates.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn repo(&self) -> &RepoConfig {
        &self.repo
    }

    fn excluded_files(&self) -> String {
        r#"[{"Filename":"vendor/big.bin","Reason":"too large"}]"#.to_string()
    }
}

/// Searcher whose every query fails.
pub struct FailingSearcher {
    pub repo: RepoConfig,
}

impl FailingSearcher {
    pub fn new(url: &str) -> Self {
        Self {
            repo: RepoConfig::new(url),
        }
    }
}

impl Searcher for FailingSearcher {
    fn search(&self, _: &str, _: &SearchOptions) -> Result<Option<SearchResponse>, SearchError> {
        Err(SearchError::invalid_pattern("(", "unclosed group"))
    }

    fn update(&self) -> bool {
        true
    }

    fn repo(&self) -> &RepoConfig {
        &self.repo
    }

    fn excluded_files(&self) -> String {
        "[]".to_string()
    }
}

/// Builds a [`StubSearcher`] holding `README.md: hello from <name>`.
///
/// Urls containing "broken" fail to build.
pub struct StubFactory;

impl SearcherFactory for StubFactory {
    fn build(&self, name: &str, repo: &RepoConfig) -> Result<Arc<dyn Searcher>, SearchError> {
        if repo.url.contains("broken") {
            return Err(SearchError::construction(name, "clone failed"));
        }
        let line = format!("hello from {}", name);
        let mut searcher = StubSearcher::new(&repo.url, &[("README.md", &[line.as_str()])]);
        searcher.repo = repo.clone();
        Ok(Arc::new(searcher))
    }
}

// -- App helpers --------------------------------------------------------------

/// A fully wired gateway context over stub backends.
pub struct TestApp {
    pub ctx: AppContext,
    pub router: Router,
    pub config_path: PathBuf,
    _dir: TempDir,
}

impl TestApp {
    pub fn new(searchers: Vec<(&str, Arc<dyn Searcher>)>) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.server.data_dir = dir.path().join("data");
        config.repos = searchers
            .iter()
            .map(|(name, s)| (name.to_string(), s.repo().clone()))
            .collect::<BTreeMap<_, _>>();

        let registry = BackendRegistry::with_searchers(
            searchers
                .into_iter()
                .map(|(name, s)| (name.to_string(), s))
                .collect::<HashMap<_, _>>(),
        );
        let ctx = AppContext::new(
            ConfigStore::new(config, config_path.clone()),
            registry,
            Arc::new(JsonUserStore::in_memory()),
            TokenService::new(TEST_SECRET, chrono::Duration::hours(1)),
            Arc::new(StubFactory),
        );
        let router = build_router(ctx.clone());

        Self {
            ctx,
            router,
            config_path,
            _dir: dir,
        }
    }

    /// Create a user directly in the store and return it with a token.
    pub fn user_with_token(&self, username: &str, role: Role) -> (User, String) {
        let user = self
            .ctx
            .users
            .create(NewUser {
                username: username.to_string(),
                password_hash: hash_password("password123").unwrap(),
                role: Some(role),
            })
            .unwrap();
        let token = self.ctx.tokens.issue(&user).unwrap();
        (user, token)
    }

    pub fn admin_token(&self) -> String {
        self.user_with_token("admin", Role::Admin).1
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        (status, body_json(response.into_body()).await)
    }
}

/// Build a request with an optional bearer token and JSON body.
pub fn request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Collect a body as JSON; an empty body becomes `Null`.
pub async fn body_json(body: Body) -> serde_json::Value {
    let bytes = body.collect().await.unwrap().to_bytes();
    if bytes.is_empty() {
        return serde_json::Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap_or_else(|_| {
        serde_json::Value::String(String::from_utf8_lossy(&bytes).into_owned())
    })
}
