use std::sync::Arc;

use domain::{Actor, RepositoryError, User};
use time::Duration;

use crate::{
    clock::Clock,
    error::ApplicationError,
    repository::{SessionRepository, UserRepository},
    services::IdentityService,
    session::{generate_token, SessionContext, SessionRecord},
};

#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    pub remember_me: bool,
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub session: SessionRecord,
    pub user: User,
}

pub struct SessionGateDependencies {
    pub identity: Arc<IdentityService>,
    pub user_repository: Arc<dyn UserRepository>,
    pub session_repository: Arc<dyn SessionRepository>,
    pub clock: Arc<dyn Clock>,
    pub session_ttl: Duration,
}

/// 登录、审批、封禁三道关卡。
pub struct SessionGate {
    deps: SessionGateDependencies,
}

impl SessionGate {
    pub fn new(deps: SessionGateDependencies) -> Self {
        Self { deps }
    }

    pub fn session_ttl(&self) -> Duration {
        self.deps.session_ttl
    }

    /// 待审批或已封禁的账号不会拿到会话，但会得知具体原因。
    pub async fn login(&self, request: LoginRequest) -> Result<LoginOutcome, ApplicationError> {
        let user = self
            .deps
            .identity
            .authenticate(&request.username, &request.password)
            .await?;

        if !user.approved {
            return Err(ApplicationError::PendingApproval);
        }
        if let Some(reason) = user.ban_reason() {
            return Err(ApplicationError::banned(reason));
        }

        let now = self.deps.clock.now();
        let session = SessionRecord {
            token: generate_token(),
            user_id: user.id,
            created_at: now,
            expires_at: now + self.deps.session_ttl,
            remember_me: request.remember_me,
        };
        self.deps.session_repository.create(session.clone()).await?;

        // 上线写入返回的是最新一行；校验之后若被封禁或撤销审批，收回刚发出的会话
        let user = self.deps.user_repository.mark_online(user.id, now).await?;
        if !user.approved {
            self.evict(&session.token, &user).await?;
            return Err(ApplicationError::PendingApproval);
        }
        if let Some(reason) = user.ban_reason().map(str::to_owned) {
            self.evict(&session.token, &user).await?;
            return Err(ApplicationError::banned(reason));
        }
        self.deps.identity.ensure_settings(user.id).await?;

        tracing::info!(user_id = %user.id, username = %user.username, remember_me = request.remember_me, "login succeeded");
        Ok(LoginOutcome { session, user })
    }

    /// 将会话令牌解析为请求上下文。
    ///
    /// 审批或封禁检查失败时，先删除会话并把用户标记为离线，再返回错误，
    /// 之后同一令牌只会得到 `Unauthenticated`。
    pub async fn resolve(&self, token: Option<&str>) -> Result<SessionContext, ApplicationError> {
        let token = token.ok_or(ApplicationError::Unauthenticated)?;
        let session = self
            .deps
            .session_repository
            .find(token)
            .await?
            .ok_or(ApplicationError::Unauthenticated)?;

        if session.is_expired(self.deps.clock.now()) {
            self.deps.session_repository.delete(token).await?;
            return Err(ApplicationError::Unauthenticated);
        }

        let Some(user) = self.deps.user_repository.find_by_id(session.user_id).await? else {
            self.deps.session_repository.delete(token).await?;
            return Err(ApplicationError::Unauthenticated);
        };

        if !user.approved {
            self.evict(token, &user).await?;
            return Err(ApplicationError::PendingApproval);
        }
        if let Some(reason) = user.ban_reason().map(str::to_owned) {
            self.evict(token, &user).await?;
            return Err(ApplicationError::banned(reason));
        }

        Ok(SessionContext {
            session_id: session.token,
            actor: Actor {
                user_id: user.id,
                username: user.username,
                role: user.role,
            },
            unique_id: user.unique_id,
            approved: user.approved,
            banned: false,
        })
    }

    /// 只删除会话并写离线标记，不回写用户的其它字段
    async fn evict(&self, token: &str, user: &User) -> Result<(), ApplicationError> {
        self.deps.session_repository.delete(token).await?;
        match self.deps.user_repository.mark_offline(user.id).await {
            Ok(()) | Err(RepositoryError::NotFound) => {}
            Err(err) => return Err(err.into()),
        }
        tracing::info!(user_id = %user.id, approved = user.approved, banned = user.is_banned(), "session rejected by gate");
        Ok(())
    }

    pub async fn logout(&self, token: &str) -> Result<(), ApplicationError> {
        let Some(session) = self.deps.session_repository.find(token).await? else {
            return Ok(());
        };
        self.deps.session_repository.delete(token).await?;
        match self.deps.user_repository.mark_offline(session.user_id).await {
            Ok(()) | Err(RepositoryError::NotFound) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// 清理过期会话，返回删除条数
    pub async fn purge_expired(&self) -> Result<u64, ApplicationError> {
        let removed = self
            .deps
            .session_repository
            .delete_expired(self.deps.clock.now())
            .await?;
        if removed > 0 {
            tracing::debug!(removed, "expired sessions purged");
        }
        Ok(removed)
    }
}
