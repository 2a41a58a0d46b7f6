//! 领域模型错误定义

use thiserror::Error;

/// 领域模型错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// 输入不满足值对象约束
    #[error("invalid {field}: {reason}")]
    InvalidArgument { field: String, reason: String },

    /// 非文本消息不可编辑
    #[error("only text messages can be edited")]
    NotEditableKind,

    #[error("unknown role: {0}")]
    UnknownRole(String),

    #[error("unknown message kind: {0}")]
    UnknownMessageKind(String),
}

impl DomainError {
    /// 创建参数校验错误
    pub fn invalid_argument(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// 领域模型结果类型
pub type DomainResult<T> = Result<T, DomainError>;

/// 仓储层错误。
///
/// `Conflict` 携带触发冲突的唯一约束名（例如 `users_unique_id_key`），
/// 调用方据此区分用户名重复与编号碰撞。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,
    #[error("unique constraint violated: {constraint}")]
    Conflict { constraint: String },
    #[error("storage failure: {message}")]
    Storage { message: String },
}

impl RepositoryError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn conflict(constraint: impl Into<String>) -> Self {
        Self::Conflict {
            constraint: constraint.into(),
        }
    }

    /// 冲突是否来自 7 位编号的唯一约束
    pub fn is_unique_id_conflict(&self) -> bool {
        matches!(self, Self::Conflict { constraint } if constraint.contains("unique_id"))
    }
}
