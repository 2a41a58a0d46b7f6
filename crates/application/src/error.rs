use domain::{DomainError, RepositoryError};
use thiserror::Error;

use crate::password::PasswordHasherError;

/// 附件处理失败原因
#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("file type '{extension}' is not allowed")]
    ExtensionNotAllowed { extension: String },
    #[error("file exceeds the {limit} byte limit")]
    TooLarge { limit: u64 },
    #[error("attachment io error: {0}")]
    Io(String),
}

impl AttachmentError {
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io(message.into())
    }
}

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
    #[error("storage failure: {0}")]
    Storage(RepositoryError),
    #[error("password error: {0}")]
    Password(#[from] PasswordHasherError),
    #[error("attachment error: {0}")]
    Attachment(#[from] AttachmentError),

    #[error("username, email, or id already exists")]
    DuplicateIdentity,
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("please log in")]
    Unauthenticated,
    #[error("account is pending admin approval")]
    PendingApproval,
    #[error("account has been banned: {reason}")]
    Banned { reason: String },

    #[error("room not found")]
    RoomNotFound,
    #[error("access denied to this room")]
    AccessDenied,
    #[error("message must contain text or a file")]
    EmptyContent,
    #[error("message not found")]
    MessageNotFound,
    #[error("user not found")]
    UserNotFound,
    #[error("file not found")]
    AttachmentNotFound,
    #[error("only the author can edit this message")]
    NotAuthor,
    #[error("not authorized")]
    NotAuthorized,
    #[error("only text messages can be edited")]
    NotEditableKind,
}

impl ApplicationError {
    pub fn banned(reason: impl Into<String>) -> Self {
        Self::Banned {
            reason: reason.into(),
        }
    }

    /// 是否属于需要记录详细日志、对外只暴露模糊信息的内部故障
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::Storage(_) | Self::Password(_) | Self::Attachment(AttachmentError::Io(_))
        )
    }
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Conflict { .. } => ApplicationError::DuplicateIdentity,
            other => ApplicationError::Storage(other),
        }
    }
}

impl From<domain::Denial> for ApplicationError {
    fn from(value: domain::Denial) -> Self {
        match value {
            domain::Denial::AccessDenied => ApplicationError::AccessDenied,
            domain::Denial::NotEditableKind => ApplicationError::NotEditableKind,
            domain::Denial::NotAuthor => ApplicationError::NotAuthor,
            domain::Denial::NotAuthorized => ApplicationError::NotAuthorized,
        }
    }
}
