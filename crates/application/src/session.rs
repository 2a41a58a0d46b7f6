//! 服务端会话与请求上下文。

use domain::{Actor, Role, Timestamp, UniqueId, UserId, Username};
use rand::{distr::Alphanumeric, Rng};
use serde::Serialize;

use crate::error::ApplicationError;

const TOKEN_LEN: usize = 48;

/// 持久化的会话记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub token: String,
    pub user_id: UserId,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
    pub remember_me: bool,
}

impl SessionRecord {
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at <= now
    }
}

pub fn generate_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// 每个请求经过会话闸门后得到的上下文，显式传入所有核心操作。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionContext {
    #[serde(skip)]
    pub session_id: String,
    pub actor: Actor,
    pub unique_id: UniqueId,
    pub approved: bool,
    pub banned: bool,
}

impl SessionContext {
    pub fn user_id(&self) -> UserId {
        self.actor.user_id
    }

    pub fn username(&self) -> &Username {
        &self.actor.username
    }

    pub fn role(&self) -> Role {
        self.actor.role
    }

    pub fn require_admin(&self) -> Result<(), ApplicationError> {
        if self.actor.is_admin() {
            Ok(())
        } else {
            Err(ApplicationError::NotAuthorized)
        }
    }
}
