//! Repository configuration CRUD, keyed by repository name.
//!
//! Writes go through the registry so the config file and the live
//! searchers never disagree.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::auth::json_body;
use crate::config::RepoConfig;
use crate::server::{ApiError, AppContext};

/// One repository entry as the settings page sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoConfigView {
    pub id: String,
    pub name: String,
    pub url: String,
    pub branch: Option<String>,
    pub vcs_type: String,
    pub exclude: Vec<String>,
    pub enable_push_updates: bool,
    /// Whether a searcher is currently serving this entry.
    pub enabled: bool,
}

impl RepoConfigView {
    fn new(name: &str, repo: RepoConfig, enabled: bool) -> Self {
        Self {
            id: name.to_string(),
            name: name.to_string(),
            url: repo.url,
            branch: repo.reference,
            vcs_type: repo.vcs,
            exclude: repo.exclude,
            enable_push_updates: repo.enable_push_updates,
            enabled,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoConfigList {
    pub repo_configs: Vec<RepoConfigView>,
    pub total_count: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub q: String,
}

/// Create and update body. On update, omitted fields keep their value and an
/// empty `branch` clears it.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoConfigRequest {
    pub name: Option<String>,
    pub url: Option<String>,
    pub branch: Option<String>,
    pub vcs_type: Option<String>,
    pub exclude: Option<Vec<String>>,
    pub enable_push_updates: Option<bool>,
}

impl RepoConfigRequest {
    /// Overlay the request onto `repo`.
    fn apply(self, mut repo: RepoConfig) -> Result<RepoConfig, ApiError> {
        if let Some(url) = self.url.map(|u| u.trim().to_string()) {
            if url.is_empty() {
                return Err(ApiError::BadRequest("url must not be empty".to_string()));
            }
            repo.url = url;
        }
        if let Some(branch) = self.branch {
            let branch = branch.trim();
            repo.reference = (!branch.is_empty()).then(|| branch.to_string());
        }
        if let Some(vcs) = self.vcs_type.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
            repo.vcs = vcs;
        }
        if let Some(exclude) = self.exclude {
            check_exclusions(&exclude)?;
            repo.exclude = exclude;
        }
        if let Some(enabled) = self.enable_push_updates {
            repo.enable_push_updates = enabled;
        }
        Ok(repo)
    }
}

fn check_exclusions(rules: &[String]) -> Result<(), ApiError> {
    for rule in rules {
        regex::Regex::new(rule)
            .map_err(|e| ApiError::BadRequest(format!("invalid exclude pattern '{}': {}", rule, e)))?;
    }
    Ok(())
}

fn view(ctx: &AppContext, name: &str, repo: RepoConfig) -> RepoConfigView {
    RepoConfigView::new(name, repo, ctx.registry.contains(name))
}

/// `GET /api/v1/repos/config?q=`
///
/// `q` filters case-insensitively on name and url.
pub async fn list(
    State(ctx): State<AppContext>,
    Query(query): Query<ListQuery>,
) -> Json<RepoConfigList> {
    let needle = query.q.trim().to_lowercase();
    let repo_configs: Vec<RepoConfigView> = ctx
        .config
        .repos()
        .into_iter()
        .filter(|(name, repo)| {
            needle.is_empty()
                || name.to_lowercase().contains(&needle)
                || repo.url.to_lowercase().contains(&needle)
        })
        .map(|(name, repo)| view(&ctx, &name, repo))
        .collect();
    Json(RepoConfigList {
        total_count: repo_configs.len(),
        repo_configs,
    })
}

/// `GET /api/v1/repos/config/{id}`
pub async fn get(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<RepoConfigView>, ApiError> {
    let repo = ctx.config.repo(&id).ok_or_else(|| no_such_repo(&id))?;
    Ok(Json(view(&ctx, &id, repo)))
}

/// `POST /api/v1/repos/config`
pub async fn create(
    State(ctx): State<AppContext>,
    body: Result<Json<RepoConfigRequest>, JsonRejection>,
) -> Result<Json<RepoConfigView>, ApiError> {
    let mut req = json_body(body)?;
    let name = req.name.take().map(|n| n.trim().to_string()).unwrap_or_default();
    let url = req.url.clone().unwrap_or_default();
    if name.is_empty() || url.trim().is_empty() {
        return Err(ApiError::BadRequest("name and url are required".to_string()));
    }
    let repo = req.apply(RepoConfig::new(url.trim()))?;
    let created = RepoConfigView::new(&name, repo.clone(), true);

    let registered = name.clone();
    tokio::task::spawn_blocking(move || {
        ctx.registry
            .register(&registered, repo, &ctx.config, ctx.factory.as_ref())
    })
    .await??;

    tracing::info!(repo = %name, "Repository config created");
    Ok(Json(created))
}

/// `PUT /api/v1/repos/config/{id}`
///
/// The name is the key and cannot be changed.
pub async fn update(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    body: Result<Json<RepoConfigRequest>, JsonRejection>,
) -> Result<Json<RepoConfigView>, ApiError> {
    let mut req = json_body(body)?;
    if let Some(name) = req.name.take().map(|n| n.trim().to_string()) {
        if !name.is_empty() && name != id {
            return Err(ApiError::BadRequest(
                "repository name cannot be changed".to_string(),
            ));
        }
    }
    let current = ctx.config.repo(&id).ok_or_else(|| no_such_repo(&id))?;
    let repo = req.apply(current)?;
    let updated = RepoConfigView::new(&id, repo.clone(), true);

    let name = id.clone();
    tokio::task::spawn_blocking(move || {
        ctx.registry
            .reconfigure(&name, repo, &ctx.config, ctx.factory.as_ref())
    })
    .await??;

    tracing::info!(repo = %id, "Repository config updated");
    Ok(Json(updated))
}

/// `DELETE /api/v1/repos/config/{id}`
pub async fn delete(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let name = id.clone();
    tokio::task::spawn_blocking(move || ctx.registry.unregister(&name, &ctx.config)).await??;

    tracing::info!(repo = %id, "Repository config deleted");
    Ok(Json(
        serde_json::json!({ "message": "repository deleted successfully" }),
    ))
}

fn no_such_repo(name: &str) -> ApiError {
    ApiError::NotFound(format!("No such repository: {}", name))
}
