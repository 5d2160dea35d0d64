//! End-to-end: a bound gateway over real sockets, from startup to shutdown.

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use common::{wait_for_server, StubFactory, TEST_SECRET};
use reqwest::Client;
use searchgate::auth::TokenService;
use searchgate::backend::{build_searchers, BackendRegistry, SearcherFactory};
use searchgate::config::{Config, ConfigStore, RepoConfig};
use searchgate::server::{build_router, AppContext, GatewayServer, ServingState, REQUEST_ID_HEADER};
use searchgate::users::JsonUserStore;
use serde_json::{json, Value};
use tempfile::TempDir;

#[tokio::test]
async fn test_full_lifecycle_startup_search_register_shutdown() {
    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.server.data_dir = dir.path().join("data");
    config.repos = BTreeMap::from([
        ("alpha".to_string(), RepoConfig::new("https://example.com/alpha.git")),
        ("ghost".to_string(), RepoConfig::new("https://example.com/broken.git")),
    ]);
    let config_path = dir.path().join("config.toml");

    let state = ServingState::new("/healthz");
    let server = GatewayServer::bind("127.0.0.1:0", state.clone()).await.unwrap();
    let addr = server.local_addr();
    let handle = server.handle();
    let server_task = tokio::spawn(server.run());
    assert!(wait_for_server(addr, Duration::from_secs(2)).await);

    let client = Client::new();
    let base = format!("http://{}", addr);

    // Before the route table is installed only the health check answers.
    let resp = client.get(format!("{}/healthz", base)).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    assert!(resp.headers().contains_key(REQUEST_ID_HEADER));
    let resp = client.get(format!("{}/api/v1/repos", base)).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 503);

    let factory: Arc<dyn SearcherFactory> = Arc::new(StubFactory);
    let registry = BackendRegistry::new();
    registry.replace(build_searchers(&config.repos, Arc::clone(&factory)).await);
    assert_eq!(registry.names(), vec!["alpha".to_string()]);

    let ctx = AppContext::new(
        ConfigStore::new(config, config_path.clone()),
        registry,
        Arc::new(JsonUserStore::open(dir.path().join("users.json")).unwrap()),
        TokenService::new(TEST_SECRET, chrono::Duration::hours(1)),
        factory,
    );
    state.install(build_router(ctx));

    let resp = client
        .get(format!("{}/api/v1/search?q=hello&repos=*", base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await.unwrap();
    assert!(body["Results"]["alpha"].is_object());

    // First registration is the admin.
    let resp = client
        .post(format!("{}/api/v1/auth/register", base))
        .json(&json!({"username": "root", "password": "correct-horse"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["user"]["role"], "admin");
    let token = body["token"].as_str().unwrap().to_string();

    let resp = client
        .post(format!("{}/api/v1/repos/add", base))
        .bearer_auth(&token)
        .json(&json!({"name": "beta", "url": "https://example.com/beta.git"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let resp = client
        .get(format!("{}/api/v1/search?q=hello&repos=beta", base))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert!(body["Results"]["beta"].is_object());

    let saved = Config::load_from(&config_path).unwrap();
    assert!(saved.repos.contains_key("beta"));
    assert!(dir.path().join("users.json").exists());

    handle.shutdown();
    let result = tokio::time::timeout(Duration::from_secs(5), server_task)
        .await
        .expect("gateway did not stop")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_bind_rejects_invalid_address() {
    let result = GatewayServer::bind("not-an-address", ServingState::new("/healthz")).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_bind_conflict_reports_error() {
    let port = common::free_port();
    let first = GatewayServer::bind(&format!("127.0.0.1:{}", port), ServingState::new("/healthz"))
        .await
        .unwrap();
    let second =
        GatewayServer::bind(&format!("127.0.0.1:{}", port), ServingState::new("/healthz")).await;
    assert!(second.is_err());
    drop(first);
}
