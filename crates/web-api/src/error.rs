use application::{ApplicationError, AttachmentError};
use axum::{
    extract::multipart::MultipartError,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use domain::{DomainError, RepositoryError};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
    /// 会话闸门拒绝时顺带清掉浏览器里的 cookie
    clear_cookie: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code,
                message: message.into(),
                reason: None,
            },
            clear_cookie: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "INVALID_ARGUMENT", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }

    pub fn with_cleared_cookie(mut self, cookie: String) -> Self {
        self.clear_cookie = Some(cookie);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.body.code
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        use ApplicationError as AppErr;

        if error.is_internal() {
            tracing::error!(error = %error, "request failed");
        }

        match error {
            AppErr::Domain(err) => ApiError::from(err),
            AppErr::DuplicateIdentity => ApiError::new(
                StatusCode::CONFLICT,
                "DUPLICATE_IDENTITY",
                "username or email already exists",
            ),
            AppErr::InvalidCredentials => ApiError::new(
                StatusCode::UNAUTHORIZED,
                "INVALID_CREDENTIALS",
                "invalid username or password",
            ),
            AppErr::Unauthenticated => {
                ApiError::new(StatusCode::UNAUTHORIZED, "UNAUTHENTICATED", "please log in")
            }
            AppErr::PendingApproval => ApiError::new(
                StatusCode::FORBIDDEN,
                "PENDING_APPROVAL",
                "your account is waiting for admin approval",
            ),
            AppErr::Banned { reason } => {
                let mut err = ApiError::new(
                    StatusCode::FORBIDDEN,
                    "BANNED",
                    format!("your account has been banned: {reason}"),
                );
                err.body.reason = Some(reason);
                err
            }
            AppErr::RoomNotFound => {
                ApiError::new(StatusCode::NOT_FOUND, "ROOM_NOT_FOUND", "room not found")
            }
            AppErr::MessageNotFound => ApiError::new(
                StatusCode::NOT_FOUND,
                "MESSAGE_NOT_FOUND",
                "message not found",
            ),
            AppErr::UserNotFound => {
                ApiError::new(StatusCode::NOT_FOUND, "USER_NOT_FOUND", "user not found")
            }
            AppErr::AttachmentNotFound => ApiError::not_found("file not found"),
            AppErr::AccessDenied => ApiError::new(
                StatusCode::FORBIDDEN,
                "ACCESS_DENIED",
                "you do not have access to this room",
            ),
            AppErr::EmptyContent => ApiError::new(
                StatusCode::BAD_REQUEST,
                "EMPTY_CONTENT",
                "message must contain text or a file",
            ),
            AppErr::NotAuthor => ApiError::new(
                StatusCode::FORBIDDEN,
                "NOT_AUTHOR",
                "you can only edit your own messages",
            ),
            AppErr::NotAuthorized => {
                ApiError::new(StatusCode::FORBIDDEN, "NOT_AUTHORIZED", "not authorized")
            }
            AppErr::NotEditableKind => ApiError::new(
                StatusCode::BAD_REQUEST,
                "NOT_EDITABLE_KIND",
                "only text messages can be edited",
            ),
            AppErr::Attachment(AttachmentError::ExtensionNotAllowed { extension }) => {
                ApiError::new(
                    StatusCode::BAD_REQUEST,
                    "EXTENSION_NOT_ALLOWED",
                    format!("file type '{extension}' is not allowed"),
                )
            }
            AppErr::Attachment(AttachmentError::TooLarge { limit }) => ApiError::new(
                StatusCode::PAYLOAD_TOO_LARGE,
                "FILE_TOO_LARGE",
                format!("file exceeds the {limit} byte limit"),
            ),
            AppErr::Storage(RepositoryError::NotFound) => {
                ApiError::not_found("requested resource not found")
            }
            AppErr::Storage(_) => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "STORAGE_FAILURE",
                "storage is temporarily unavailable",
            ),
            AppErr::Password(_) | AppErr::Attachment(AttachmentError::Io(_)) => {
                ApiError::internal_server_error("internal server error")
            }
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(error: DomainError) -> Self {
        match error {
            DomainError::InvalidArgument { field, reason } => {
                ApiError::bad_request(format!("{field}: {reason}"))
            }
            DomainError::NotEditableKind => ApiError::new(
                StatusCode::BAD_REQUEST,
                "NOT_EDITABLE_KIND",
                "only text messages can be edited",
            ),
            other @ (DomainError::UnknownRole(_) | DomainError::UnknownMessageKind(_)) => {
                ApiError::bad_request(other.to_string())
            }
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(error: MultipartError) -> Self {
        let status = error.status();
        let code = if status == StatusCode::PAYLOAD_TOO_LARGE {
            "FILE_TOO_LARGE"
        } else {
            "INVALID_ARGUMENT"
        };
        ApiError::new(status, code, error.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.clear_cookie {
            Some(cookie) => {
                (self.status, [(header::SET_COOKIE, cookie)], Json(self.body)).into_response()
            }
            None => (self.status, Json(self.body)).into_response(),
        }
    }
}
