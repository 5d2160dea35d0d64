use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::backend::SearchResponse;
use crate::search::{dispatch, SearchRequest};
use crate::server::AppContext;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SearchStats {
    pub files_opened: usize,
    /// Milliseconds.
    pub duration: u64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SearchResults {
    pub results: HashMap<String, SearchResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<SearchStats>,
}

/// `GET /api/v1/search`
///
/// Backend failures are reported with status 200 and an `Error` field; the
/// web UI does not branch on status for searches.
pub async fn search(
    State(ctx): State<AppContext>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let limits = ctx.config.search_limits();
    let snapshot = ctx.registry.snapshot();
    let request = SearchRequest::from_params(&params, &limits, &snapshot);

    match dispatch(&request.query, &request.options, &request.repos, &snapshot).await {
        Ok(outcome) => {
            let stats = request.stats.then_some(SearchStats {
                files_opened: outcome.files_opened,
                duration: outcome.duration_ms,
            });
            Json(SearchResults {
                results: outcome.results,
                stats,
            })
            .into_response()
        }
        Err(err) => {
            tracing::info!(query = %request.query, error = %err, "Search failed");
            (
                StatusCode::OK,
                Json(serde_json::json!({ "Error": err.to_string() })),
            )
                .into_response()
        }
    }
}
