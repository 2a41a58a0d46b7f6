use application::{ApplicationError, SessionContext};
use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::request::Parts,
};

use crate::{error::ApiError, state::AppState};

/// 通过会话闸门的请求上下文
#[derive(Debug, Clone)]
pub struct CurrentSession(pub SessionContext);

impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = state.cookies.token_from_headers(&parts.headers);
        match state.gate.resolve(token).await {
            Ok(ctx) => Ok(Self(ctx)),
            Err(
                err @ (ApplicationError::Unauthenticated
                | ApplicationError::PendingApproval
                | ApplicationError::Banned { .. }),
            ) => Err(ApiError::from(err).with_cleared_cookie(state.cookies.clear_cookie())),
            Err(err) => Err(err.into()),
        }
    }
}

/// 可选会话：没有有效会话时为 `None`。
/// 待审批或已封禁账号的会话仍然返回错误并清除 cookie。
impl OptionalFromRequestParts<AppState> for CurrentSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Option<Self>, Self::Rejection> {
        match <Self as FromRequestParts<AppState>>::from_request_parts(parts, state).await {
            Ok(session) => Ok(Some(session)),
            Err(err) if err.code() == "UNAUTHENTICATED" => Ok(None),
            Err(err) => Err(err),
        }
    }
}
