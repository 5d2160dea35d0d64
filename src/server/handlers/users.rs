//! Admin-only user management.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::auth::{check_password, hash_blocking, json_body, require_username};
use crate::server::{ApiError, AppContext};
use crate::users::{NewUser, Role, UserChanges, UserView};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserList {
    pub users: Vec<UserView>,
    pub total_count: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub role: Option<String>,
}

/// Omitted or empty fields keep their current value.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

fn parse_id(raw: &str) -> Result<u64, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest("invalid user ID".to_string()))
}

fn parse_role(raw: Option<&str>) -> Result<Option<Role>, ApiError> {
    match raw.map(str::trim).filter(|r| !r.is_empty()) {
        None => Ok(None),
        Some(role) => role
            .parse::<Role>()
            .map(Some)
            .map_err(|_| ApiError::BadRequest("invalid role".to_string())),
    }
}

fn user_not_found() -> ApiError {
    ApiError::NotFound("user not found".to_string())
}

/// `GET /api/v1/users`
pub async fn list(State(ctx): State<AppContext>) -> Json<UserList> {
    let users: Vec<UserView> = ctx.users.list().iter().map(UserView::from).collect();
    Json(UserList {
        total_count: users.len(),
        users,
    })
}

/// `GET /api/v1/users/{id}`
pub async fn get(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<UserView>, ApiError> {
    let id = parse_id(&id)?;
    let user = ctx.users.get(id).ok_or_else(user_not_found)?;
    Ok(Json(UserView::from(&user)))
}

/// `POST /api/v1/users`
pub async fn create(
    State(ctx): State<AppContext>,
    body: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<Json<UserView>, ApiError> {
    let req = json_body(body)?;
    let username = require_username(&req.username)?;
    check_password(&req.password, ctx.config.min_password_len())?;
    let role = parse_role(req.role.as_deref())?.unwrap_or(Role::User);
    if ctx.users.get_by_username(&username).is_some() {
        return Err(ApiError::Conflict("username already exists".to_string()));
    }

    let password_hash = hash_blocking(req.password).await?;
    let user = ctx.users.create(NewUser {
        username,
        password_hash,
        role: Some(role),
    })?;
    Ok(Json(UserView::from(&user)))
}

/// `PUT /api/v1/users/{id}`
pub async fn update(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    body: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<UserView>, ApiError> {
    let id = parse_id(&id)?;
    let req = json_body(body)?;
    if ctx.users.get(id).is_none() {
        return Err(user_not_found());
    }

    let username = match req.username.as_deref() {
        Some(raw) => Some(require_username(raw)?),
        None => None,
    };
    let role = parse_role(req.role.as_deref())?;
    let password_hash = match req.password.filter(|p| !p.is_empty()) {
        Some(password) => {
            check_password(&password, ctx.config.min_password_len())?;
            Some(hash_blocking(password).await?)
        }
        None => None,
    };

    let user = ctx
        .users
        .update(
            id,
            UserChanges {
                username,
                password_hash,
                role,
            },
        )?
        .ok_or_else(user_not_found)?;
    Ok(Json(UserView::from(&user)))
}

/// `DELETE /api/v1/users/{id}`
///
/// Tokens held by the deleted user stop working on their next request.
pub async fn delete(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = parse_id(&id)?;
    if !ctx.users.delete(id)? {
        return Err(user_not_found());
    }
    Ok(Json(serde_json::json!({ "message": "user deleted successfully" })))
}
