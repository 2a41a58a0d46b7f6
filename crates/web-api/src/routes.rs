use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use application::{
    services::{
        CreateRoomRequest, LoginRequest, PostMessageRequest, RegisterUserRequest, ResetTarget,
        Upload,
    },
    MessageView, OnlineUserDto, RoomDto, SessionContext, SettingsDto, UserDto,
};
use domain::{MessageId, MessageKind, Role, UniqueId};

use crate::{
    admin_routes::admin_routes, error::ApiError, extract::CurrentSession, state::AppState,
};

#[derive(Debug, Deserialize)]
struct RegisterPayload {
    username: String,
    password: String,
    confirm_password: Option<String>,
    email: Option<String>,
    role: Role,
}

#[derive(Debug, Deserialize)]
struct LoginPayload {
    username: String,
    password: String,
    #[serde(default)]
    remember_me: bool,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    user: UserDto,
}

#[derive(Debug, Deserialize)]
struct ForgotPasswordPayload {
    unique_id: String,
}

#[derive(Debug, Serialize)]
struct ForgotPasswordResponse {
    username: String,
}

#[derive(Debug, Deserialize)]
struct ResetPasswordPayload {
    unique_id: Option<String>,
    new_password: String,
    confirm_password: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChangePasswordPayload {
    current_password: String,
    new_password: String,
    confirm_password: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateRoomPayload {
    name: String,
    #[serde(default)]
    description: String,
    allowed_roles: Vec<Role>,
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    limit: Option<u32>,
    offset: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    q: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EditMessagePayload {
    message: String,
}

pub fn router(state: AppState) -> Router {
    let body_limit = state.body_limit();
    Router::new()
        .route("/health", get(health))
        .route("/uploads/{name}", get(serve_upload))
        .nest("/api", api_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
        .route("/auth/change-password", post(change_password))
        .route("/me", get(me))
        .route("/rooms", get(list_rooms).post(create_room))
        .route("/rooms/{room}/messages", get(list_messages).post(post_message))
        .route("/rooms/{room}/search", get(search_messages))
        .route("/messages/{id}", patch(edit_message).delete(delete_message))
        .route("/users/online", get(online_users))
        .route("/settings", get(get_settings).put(update_settings))
        .nest("/admin", admin_routes())
}

async fn health() -> StatusCode {
    StatusCode::OK
}

fn confirm_matches(password: &str, confirm: Option<&str>) -> Result<(), ApiError> {
    match confirm {
        Some(confirm) if confirm != password => {
            Err(ApiError::bad_request("password: passwords do not match"))
        }
        _ => Ok(()),
    }
}

async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterPayload>,
) -> Result<(StatusCode, Json<UserDto>), ApiError> {
    let user = state
        .identity
        .register(RegisterUserRequest {
            username: payload.username,
            password: payload.password,
            confirm_password: payload.confirm_password,
            email: payload.email,
            role: payload.role,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(UserDto::from(&user))))
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state
        .gate
        .login(LoginRequest {
            username: payload.username,
            password: payload.password,
            remember_me: payload.remember_me,
        })
        .await?;

    let cookie = state
        .cookies
        .set_cookie(&outcome.session.token, outcome.session.remember_me);
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(LoginResponse {
            user: UserDto::from(&outcome.user),
        }),
    ))
}

/// 没有有效会话时同样成功，总是清掉 cookie
async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(token) = state.cookies.token_from_headers(&headers) {
        state.gate.logout(token).await?;
    }
    Ok((
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, state.cookies.clear_cookie())],
    ))
}

async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordPayload>,
) -> Result<Json<ForgotPasswordResponse>, ApiError> {
    let unique_id = UniqueId::parse(payload.unique_id.trim())?;
    let user = state.identity.lookup_by_unique_id(unique_id).await?;
    Ok(Json(ForgotPasswordResponse {
        username: user.username.as_str().to_owned(),
    }))
}

/// 未登录只能凭 7 位编号重置；不带编号时重置当前会话用户自己的密码。
/// 请求体里的用户名一律不作为定位依据。
async fn reset_password(
    State(state): State<AppState>,
    session: Option<CurrentSession>,
    Json(payload): Json<ResetPasswordPayload>,
) -> Result<StatusCode, ApiError> {
    confirm_matches(&payload.new_password, payload.confirm_password.as_deref())?;
    let target = match (payload.unique_id, session) {
        (Some(unique_id), _) => ResetTarget::UniqueId(UniqueId::parse(unique_id.trim())?),
        (None, Some(CurrentSession(ctx))) => ResetTarget::SignedIn(ctx),
        (None, None) => {
            return Err(ApiError::bad_request(
                "unique_id: is required unless signed in",
            ))
        }
    };
    state
        .identity
        .reset_password(target, &payload.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn change_password(
    State(state): State<AppState>,
    CurrentSession(ctx): CurrentSession,
    Json(payload): Json<ChangePasswordPayload>,
) -> Result<StatusCode, ApiError> {
    confirm_matches(&payload.new_password, payload.confirm_password.as_deref())?;
    state
        .identity
        .change_password(&ctx, &payload.current_password, &payload.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn me(CurrentSession(ctx): CurrentSession) -> Json<SessionContext> {
    Json(ctx)
}

async fn list_rooms(
    State(state): State<AppState>,
    CurrentSession(ctx): CurrentSession,
) -> Result<Json<Vec<RoomDto>>, ApiError> {
    let rooms = state.rooms.list_accessible(ctx.role()).await?;
    Ok(Json(rooms.iter().map(RoomDto::from).collect()))
}

async fn create_room(
    State(state): State<AppState>,
    CurrentSession(ctx): CurrentSession,
    Json(payload): Json<CreateRoomPayload>,
) -> Result<(StatusCode, Json<RoomDto>), ApiError> {
    let room = state
        .rooms
        .create_room(
            &ctx,
            CreateRoomRequest {
                name: payload.name,
                description: payload.description,
                allowed_roles: payload.allowed_roles,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(RoomDto::from(&room))))
}

async fn list_messages(
    State(state): State<AppState>,
    CurrentSession(ctx): CurrentSession,
    Path(room): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<MessageView>>, ApiError> {
    let messages = state
        .messages
        .list(&ctx, &room, query.limit, query.offset)
        .await?;
    Ok(Json(messages))
}

/// multipart 字段：`message`、`message_type`、`reply_to`、`file`
async fn post_message(
    State(state): State<AppState>,
    CurrentSession(ctx): CurrentSession,
    Path(room): Path<String>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<MessageView>), ApiError> {
    let mut request = PostMessageRequest {
        room,
        ..PostMessageRequest::default()
    };

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_owned();
        match name.as_str() {
            "message" => request.body = Some(field.text().await?),
            "message_type" => {
                let raw = field.text().await?;
                let raw = raw.trim();
                if !raw.is_empty() {
                    request.kind = Some(raw.parse::<MessageKind>()?);
                }
            }
            "reply_to" => {
                let raw = field.text().await?;
                let raw = raw.trim();
                if !raw.is_empty() {
                    let id = raw
                        .parse::<i64>()
                        .map_err(|_| ApiError::bad_request("reply_to: must be a message id"))?;
                    request.reply_to = Some(MessageId::from(id));
                }
            }
            "file" => {
                let filename = field.file_name().unwrap_or_default().to_owned();
                let bytes = field.bytes().await?;
                // 浏览器在未选文件时也会提交一个空的 file 字段
                if !filename.is_empty() {
                    request.upload = Some(Upload {
                        filename,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            other => tracing::debug!(field = other, "ignoring unknown form field"),
        }
    }

    let message = state.messages.post(&ctx, request).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

async fn search_messages(
    State(state): State<AppState>,
    CurrentSession(ctx): CurrentSession,
    Path(room): Path<String>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<MessageView>>, ApiError> {
    let hits = state
        .messages
        .search(&ctx, &room, query.q.as_deref().unwrap_or_default())
        .await?;
    Ok(Json(hits))
}

async fn edit_message(
    State(state): State<AppState>,
    CurrentSession(ctx): CurrentSession,
    Path(id): Path<i64>,
    Json(payload): Json<EditMessagePayload>,
) -> Result<Json<MessageView>, ApiError> {
    let message = state
        .messages
        .edit(&ctx, MessageId::from(id), payload.message)
        .await?;
    Ok(Json(message))
}

async fn delete_message(
    State(state): State<AppState>,
    CurrentSession(ctx): CurrentSession,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.messages.delete(&ctx, MessageId::from(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn online_users(
    State(state): State<AppState>,
    CurrentSession(ctx): CurrentSession,
) -> Result<Json<Vec<OnlineUserDto>>, ApiError> {
    let users = state.identity.list_online(&ctx).await?;
    Ok(Json(users.iter().map(OnlineUserDto::from).collect()))
}

async fn get_settings(
    State(state): State<AppState>,
    CurrentSession(ctx): CurrentSession,
) -> Result<Json<SettingsDto>, ApiError> {
    let settings = state.identity.ensure_settings(ctx.user_id()).await?;
    Ok(Json(settings.into()))
}

async fn update_settings(
    State(state): State<AppState>,
    CurrentSession(ctx): CurrentSession,
    Json(payload): Json<SettingsDto>,
) -> Result<Json<SettingsDto>, ApiError> {
    let settings = state
        .identity
        .update_settings(&ctx, payload.into())
        .await?;
    Ok(Json(settings.into()))
}

/// 附件下载：要求登录，且能进入附件所在的房间
async fn serve_upload(
    State(state): State<AppState>,
    CurrentSession(ctx): CurrentSession,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let bytes = state.messages.open_attachment(&ctx, &name).await?;

    Ok(([(header::CONTENT_TYPE, content_type_for(&name))], bytes))
}

fn content_type_for(name: &str) -> &'static str {
    let extension = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "wav" => "audio/wav",
        "mp3" => "audio/mpeg",
        "ogg" => "audio/ogg",
        "pdf" => "application/pdf",
        "txt" => "text/plain; charset=utf-8",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
}
