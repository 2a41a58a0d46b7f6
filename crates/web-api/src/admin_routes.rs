use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use application::UserDto;
use domain::UserId;

use crate::{error::ApiError, extract::CurrentSession, state::AppState};

/// 管理员账号管理路由，权限检查在应用层完成
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/{id}/approve", post(approve_user))
        .route("/users/{id}/reject", post(reject_user))
        .route("/users/{id}/ban", post(ban_user))
        .route("/users/{id}/unban", post(unban_user))
}

#[derive(Debug, Default, Deserialize)]
struct BanPayload {
    #[serde(default)]
    reason: Option<String>,
}

async fn list_users(
    State(state): State<AppState>,
    CurrentSession(ctx): CurrentSession,
) -> Result<Json<Vec<UserDto>>, ApiError> {
    let users = state.identity.list_users(&ctx).await?;
    Ok(Json(users.iter().map(UserDto::from).collect()))
}

async fn approve_user(
    State(state): State<AppState>,
    CurrentSession(ctx): CurrentSession,
    Path(id): Path<Uuid>,
) -> Result<Json<UserDto>, ApiError> {
    let user = state
        .identity
        .set_approval(&ctx, UserId::from(id), true)
        .await?;
    Ok(Json(UserDto::from(&user)))
}

async fn reject_user(
    State(state): State<AppState>,
    CurrentSession(ctx): CurrentSession,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.identity.reject(&ctx, UserId::from(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// 请求体可选，缺省原因由应用层补上
async fn ban_user(
    State(state): State<AppState>,
    CurrentSession(ctx): CurrentSession,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<UserDto>, ApiError> {
    let payload: BanPayload = if body.iter().all(u8::is_ascii_whitespace) {
        BanPayload::default()
    } else {
        serde_json::from_slice(&body).map_err(|err| ApiError::bad_request(err.to_string()))?
    };
    let user = state
        .identity
        .ban(&ctx, UserId::from(id), payload.reason)
        .await?;
    Ok(Json(UserDto::from(&user)))
}

async fn unban_user(
    State(state): State<AppState>,
    CurrentSession(ctx): CurrentSession,
    Path(id): Path<Uuid>,
) -> Result<Json<UserDto>, ApiError> {
    let user = state.identity.unban(&ctx, UserId::from(id)).await?;
    Ok(Json(UserDto::from(&user)))
}
