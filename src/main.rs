use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use searchgate::auth::TokenService;
use searchgate::backend::{build_searchers, BackendRegistry, LocalSearcherFactory, SearcherFactory};
use searchgate::cli::Cli;
use searchgate::config::ConfigStore;
use searchgate::logging::init_tracing;
use searchgate::server::{build_router, AppContext, GatewayServer, ServingState};
use searchgate::users::JsonUserStore;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let loaded = cli
        .load_config()
        .with_context(|| format!("Failed to load config from {}", cli.config_path().display()))?;
    tracing::info!(path = %loaded.path.display(), repos = loaded.runtime.repos.len(), "Config loaded");
    let config = loaded.runtime;

    let data_dir = config.server.data_dir.clone();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data dir {}", data_dir.display()))?;

    let users = Arc::new(
        JsonUserStore::open(data_dir.join("users.json")).context("Failed to open user store")?,
    );
    let tokens = TokenService::from_config(&config.auth).context("Failed to initialise tokens")?;
    let factory: Arc<dyn SearcherFactory> = Arc::new(LocalSearcherFactory::new(&data_dir));
    let registry = BackendRegistry::new();
    let ctx = AppContext::new(
        ConfigStore::new(loaded.file, loaded.path),
        registry.clone(),
        users,
        tokens,
        Arc::clone(&factory),
    );

    // Listen first: the health check answers while backends are still loading.
    let state = ServingState::new(config.server.health_check_uri.clone());
    let server = GatewayServer::bind(&config.server.bind_addr, state.clone())
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_addr))?;
    let addr = server.local_addr();
    let server_task = tokio::spawn(server.run());

    let searchers = build_searchers(&config.repos, factory).await;
    registry.replace(searchers);
    state.install(build_router(ctx));
    tracing::info!(addr = %addr, backends = registry.len(), "searchgate ready");

    server_task.await.context("Gateway task failed")??;
    Ok(())
}
