//! Repository listing, exclusions, updates and runtime registration.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::backend::{RegistrySnapshot, Searcher};
use crate::config::RepoConfig;
use crate::search::RepoSelector;
use crate::server::{ApiError, AppContext};

/// `GET /api/v1/repos`
pub async fn list(State(ctx): State<AppContext>) -> Json<BTreeMap<String, RepoConfig>> {
    let snapshot = ctx.registry.snapshot();
    Json(
        snapshot
            .iter()
            .map(|(name, searcher)| (name.clone(), searcher.repo().clone()))
            .collect(),
    )
}

#[derive(Debug, Deserialize)]
pub struct ExcludesQuery {
    #[serde(default)]
    pub repo: String,
}

/// `GET /api/v1/excludes?repo=`
///
/// The body is the backend's exclusion report, passed through verbatim.
pub async fn excludes(
    State(ctx): State<AppContext>,
    Query(query): Query<ExcludesQuery>,
) -> Result<Response, ApiError> {
    let searcher = ctx
        .registry
        .get(&query.repo)
        .ok_or_else(|| no_such_repo(&query.repo))?;

    Ok((
        [(header::CONTENT_TYPE, "application/json;charset=utf-8")],
        searcher.excluded_files(),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuery {
    #[serde(default)]
    pub repos: String,
}

/// `POST /api/v1/update?repos=`
///
/// Every named repository must exist and `*` names them all; an empty list
/// updates nothing. Updates run in order and stop at the first repository
/// with push updates disabled; earlier ones stay updated.
pub async fn update(
    State(ctx): State<AppContext>,
    Query(query): Query<UpdateQuery>,
) -> Result<Json<&'static str>, ApiError> {
    let snapshot = ctx.registry.snapshot();
    let names = RepoSelector::parse_explicit(&query.repos)
        .resolve_strict(&snapshot)
        .map_err(|missing| no_such_repo(&missing))?;

    update_all(snapshot, names).await?;
    Ok(Json("ok"))
}

#[derive(Debug, Deserialize)]
pub struct WebhookRepository {
    #[serde(default)]
    pub full_name: String,
}

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub repository: WebhookRepository,
}

/// `POST /api/v1/github-webhook`
pub async fn webhook(
    State(ctx): State<AppContext>,
    payload: Result<Json<WebhookPayload>, JsonRejection>,
) -> Result<Json<&'static str>, ApiError> {
    let Json(payload) = payload.map_err(|_| ApiError::BadRequest("Bad Request".to_string()))?;
    let name = payload.repository.full_name;

    let snapshot = ctx.registry.snapshot();
    if !snapshot.contains_key(&name) {
        return Err(no_such_repo(&name));
    }
    update_all(snapshot, vec![name]).await?;
    Ok(Json("ok"))
}

#[derive(Debug, Deserialize)]
pub struct AddRepoRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub branch: Option<String>,
}

/// `POST /api/v1/repos/add`
pub async fn add(
    State(ctx): State<AppContext>,
    body: Result<Json<AddRepoRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(req) = body.map_err(|e| ApiError::BadRequest(format!("Invalid request: {}", e.body_text())))?;
    let name = req.name.trim().to_string();
    let url = req.url.trim().to_string();
    if name.is_empty() || url.is_empty() {
        return Err(ApiError::BadRequest("name and url are required".to_string()));
    }

    let mut repo = RepoConfig::new(url);
    if let Some(branch) = req.branch.map(|b| b.trim().to_string()).filter(|b| !b.is_empty()) {
        repo = repo.with_reference(branch);
    }

    let registered = name.clone();
    tokio::task::spawn_blocking(move || {
        ctx.registry
            .register(&registered, repo, &ctx.config, ctx.factory.as_ref())
    })
    .await??;

    tracing::info!(repo = %name, "Repository added");
    Ok(Json(serde_json::json!({
        "status": "ok",
        "message": format!("Repository {} added successfully", name),
    })))
}

async fn update_all(snapshot: RegistrySnapshot, names: Vec<String>) -> Result<(), ApiError> {
    tokio::task::spawn_blocking(move || {
        for name in names {
            let Some(searcher) = snapshot.get(&name).map(Arc::clone) else {
                return Err(no_such_repo(&name));
            };
            if !refresh(&name, searcher.as_ref()) {
                return Err(ApiError::Forbidden(format!(
                    "Push updates are not enabled for repository {}",
                    name
                )));
            }
        }
        Ok(())
    })
    .await?
}

fn refresh(name: &str, searcher: &dyn Searcher) -> bool {
    let accepted = searcher.update();
    tracing::debug!(repo = %name, accepted, "Update requested");
    accepted
}

fn no_such_repo(name: &str) -> ApiError {
    ApiError::NotFound(format!("No such repository: {}", name))
}
