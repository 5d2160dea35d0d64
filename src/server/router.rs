use axum::middleware;
use axum::routing::{get, post, put};
use axum::Router;

use super::handlers::{assets, auth, repo_config, repos, search, users};
use super::health::health;
use super::AppContext;
use crate::auth::{authenticate, require_admin};

/// Build the complete route table for a ready gateway.
///
/// The authorization gate wraps every route; admin routes additionally
/// require the admin role. Repository configs are readable by any signed-in
/// user and writable by admins only.
pub fn build_router(ctx: AppContext) -> Router {
    let admin = Router::new()
        .route("/api/v1/repos/add", post(repos::add))
        .route("/api/v1/users", get(users::list).post(users::create))
        .route(
            "/api/v1/users/{id}",
            get(users::get).put(users::update).delete(users::delete),
        )
        .route_layer(middleware::from_fn(require_admin));

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/repos", get(repos::list))
        .route("/api/v1/search", get(search::search))
        .route("/api/v1/excludes", get(repos::excludes))
        .route("/api/v1/update", post(repos::update))
        .route("/api/v1/github-webhook", post(repos::webhook))
        .route("/api/v1/auth/register", post(auth::register))
        .route("/api/v1/auth/login", post(auth::login))
        .route("/api/v1/auth/me", get(auth::me))
        .route("/api/v1/auth/logout", post(auth::logout))
        .route(
            "/api/v1/repos/config",
            post(repo_config::create)
                .route_layer(middleware::from_fn(require_admin))
                .get(repo_config::list),
        )
        .route(
            "/api/v1/repos/config/{id}",
            put(repo_config::update)
                .delete(repo_config::delete)
                .route_layer(middleware::from_fn(require_admin))
                .get(repo_config::get),
        )
        .merge(admin)
        .fallback(assets::serve)
        .layer(middleware::from_fn_with_state(ctx.gate(), authenticate))
        .with_state(ctx)
}
