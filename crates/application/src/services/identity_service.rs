use std::sync::Arc;

use domain::{
    BanRecord, DomainError, RepositoryError, Role, UniqueId, User, UserEmail, UserId,
    UserSettings, Username,
};
use uuid::Uuid;

use crate::{
    clock::Clock,
    error::ApplicationError,
    password::{check_password_policy, PasswordHasher},
    repository::UserRepository,
    session::SessionContext,
    unique_id::UniqueIdGenerator,
};

/// 7 位编号碰撞时的最大重试次数
pub const MAX_UNIQUE_ID_ATTEMPTS: usize = 32;

pub const DEFAULT_BAN_REASON: &str = "No reason provided";

#[derive(Debug, Clone)]
pub struct RegisterUserRequest {
    pub username: String,
    pub password: String,
    pub confirm_password: Option<String>,
    pub email: Option<String>,
    pub role: Role,
}

/// 启动时预置的管理员账号
#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub username: String,
    pub email: Option<String>,
    pub password: String,
}

/// 重置密码时定位账号的方式。
///
/// 未登录时只能凭 7 位编号找回；按用户名重置只针对当前会话的用户本人。
#[derive(Debug, Clone)]
pub enum ResetTarget {
    UniqueId(UniqueId),
    SignedIn(SessionContext),
}

pub struct IdentityServiceDependencies {
    pub user_repository: Arc<dyn UserRepository>,
    pub password_hasher: Arc<dyn PasswordHasher>,
    pub clock: Arc<dyn Clock>,
    pub unique_ids: Arc<dyn UniqueIdGenerator>,
}

pub struct IdentityService {
    deps: IdentityServiceDependencies,
}

impl IdentityService {
    pub fn new(deps: IdentityServiceDependencies) -> Self {
        Self { deps }
    }

    pub async fn register(&self, request: RegisterUserRequest) -> Result<User, ApplicationError> {
        let username = Username::parse(request.username)?;
        check_password_policy(&request.password)?;
        if let Some(confirm) = &request.confirm_password {
            if confirm != &request.password {
                return Err(DomainError::invalid_argument("password", "passwords do not match").into());
            }
        }
        let email = UserEmail::parse_optional(request.email)?;

        if self
            .deps
            .user_repository
            .find_by_username(&username)
            .await?
            .is_some()
        {
            return Err(ApplicationError::DuplicateIdentity);
        }

        let password_hash = self.deps.password_hasher.hash(&request.password).await?;
        let now = self.deps.clock.now();
        let id = UserId::from(Uuid::new_v4());

        let user = self
            .insert_with_fresh_unique_id(|unique_id| {
                User::register(
                    id,
                    username.clone(),
                    password_hash.clone(),
                    email.clone(),
                    request.role,
                    unique_id,
                    now,
                )
            })
            .await?;

        tracing::info!(user_id = %user.id, username = %user.username, role = %user.role, "user registered");
        Ok(user)
    }

    /// 抽号、预检、写入；写入撞上编号唯一约束时重新抽号。
    async fn insert_with_fresh_unique_id(
        &self,
        build: impl Fn(UniqueId) -> User,
    ) -> Result<User, ApplicationError> {
        for attempt in 1..=MAX_UNIQUE_ID_ATTEMPTS {
            let candidate = self.deps.unique_ids.next_candidate();
            if self
                .deps
                .user_repository
                .unique_id_exists(candidate)
                .await?
            {
                continue;
            }

            match self
                .deps
                .user_repository
                .create(build(candidate), UserSettings::default())
                .await
            {
                Ok(user) => return Ok(user),
                Err(err) if err.is_unique_id_conflict() => {
                    tracing::warn!(attempt, unique_id = %candidate, "unique id collided on insert, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(ApplicationError::Storage(RepositoryError::storage(
            "exhausted attempts to allocate a unique account id",
        )))
    }

    /// 只校验用户名与密码，不关心审批与封禁状态。
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User, ApplicationError> {
        let username = Username::parse(username).map_err(|_| ApplicationError::InvalidCredentials)?;
        let user = self
            .deps
            .user_repository
            .find_by_username(&username)
            .await?
            .ok_or(ApplicationError::InvalidCredentials)?;

        let hash = user
            .password
            .as_ref()
            .ok_or(ApplicationError::InvalidCredentials)?;
        if !self.deps.password_hasher.verify(password, hash).await? {
            return Err(ApplicationError::InvalidCredentials);
        }
        Ok(user)
    }

    async fn load(&self, user_id: UserId) -> Result<User, ApplicationError> {
        self.deps
            .user_repository
            .find_by_id(user_id)
            .await?
            .ok_or(ApplicationError::UserNotFound)
    }

    pub async fn set_approval(
        &self,
        ctx: &SessionContext,
        user_id: UserId,
        approved: bool,
    ) -> Result<User, ApplicationError> {
        ctx.require_admin()?;
        let user = self
            .deps
            .user_repository
            .set_approval(user_id, approved)
            .await
            .map_err(not_found_as_user)?;
        tracing::info!(admin = %ctx.username(), user_id = %user.id, approved, "approval changed");
        Ok(user)
    }

    /// 拒绝注册：删除用户及其设置
    pub async fn reject(&self, ctx: &SessionContext, user_id: UserId) -> Result<(), ApplicationError> {
        ctx.require_admin()?;
        let user = self.load(user_id).await?;
        self.deps.user_repository.delete(user.id).await?;
        tracing::info!(admin = %ctx.username(), username = %user.username, "registration rejected");
        Ok(())
    }

    /// 封禁不会主动吊销会话；用户的下一次请求会在会话闸门处被拦下。
    pub async fn ban(
        &self,
        ctx: &SessionContext,
        user_id: UserId,
        reason: Option<String>,
    ) -> Result<User, ApplicationError> {
        ctx.require_admin()?;
        let reason = reason
            .map(|reason| reason.trim().to_owned())
            .filter(|reason| !reason.is_empty())
            .unwrap_or_else(|| DEFAULT_BAN_REASON.to_owned());
        let record = BanRecord {
            reason,
            banned_at: self.deps.clock.now(),
            banned_by: Some(ctx.user_id()),
        };
        let user = self
            .deps
            .user_repository
            .set_ban(user_id, record)
            .await
            .map_err(not_found_as_user)?;
        tracing::info!(admin = %ctx.username(), username = %user.username, "user banned");
        Ok(user)
    }

    pub async fn unban(&self, ctx: &SessionContext, user_id: UserId) -> Result<User, ApplicationError> {
        ctx.require_admin()?;
        let user = self
            .deps
            .user_repository
            .clear_ban(user_id)
            .await
            .map_err(not_found_as_user)?;
        tracing::info!(admin = %ctx.username(), username = %user.username, "user unbanned");
        Ok(user)
    }

    pub async fn set_online(&self, user_id: UserId, online: bool) -> Result<(), ApplicationError> {
        let repository = &self.deps.user_repository;
        let written = if online {
            repository
                .mark_online(user_id, self.deps.clock.now())
                .await
                .map(|_| ())
        } else {
            repository.mark_offline(user_id).await
        };
        written.map_err(not_found_as_user)
    }

    pub async fn lookup_by_unique_id(&self, unique_id: UniqueId) -> Result<User, ApplicationError> {
        self.deps
            .user_repository
            .find_by_unique_id(unique_id)
            .await?
            .ok_or(ApplicationError::UserNotFound)
    }

    /// 重置密码，不校验旧密码。
    pub async fn reset_password(
        &self,
        target: ResetTarget,
        new_password: &str,
    ) -> Result<(), ApplicationError> {
        check_password_policy(new_password)?;
        let user = match target {
            ResetTarget::UniqueId(unique_id) => self.lookup_by_unique_id(unique_id).await?,
            ResetTarget::SignedIn(ctx) => self.load(ctx.user_id()).await?,
        };
        let hash = self.deps.password_hasher.hash(new_password).await?;
        self.deps
            .user_repository
            .set_password(user.id, hash)
            .await
            .map_err(not_found_as_user)?;
        tracing::info!(user_id = %user.id, "password reset");
        Ok(())
    }

    /// 已登录用户修改密码，需要先验证当前密码
    pub async fn change_password(
        &self,
        ctx: &SessionContext,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), ApplicationError> {
        check_password_policy(new_password)?;
        let user = self
            .authenticate(ctx.username().as_str(), current_password)
            .await?;
        let hash = self.deps.password_hasher.hash(new_password).await?;
        self.deps
            .user_repository
            .set_password(user.id, hash)
            .await
            .map_err(not_found_as_user)?;
        tracing::info!(user_id = %ctx.user_id(), "password changed");
        Ok(())
    }

    pub async fn list_users(&self, ctx: &SessionContext) -> Result<Vec<User>, ApplicationError> {
        ctx.require_admin()?;
        Ok(self.deps.user_repository.list_all().await?)
    }

    /// 在线用户，不包含请求者本人
    pub async fn list_online(&self, ctx: &SessionContext) -> Result<Vec<User>, ApplicationError> {
        let users = self.deps.user_repository.list_online().await?;
        Ok(users
            .into_iter()
            .filter(|user| user.id != ctx.user_id())
            .collect())
    }

    /// 读取设置；缺失时写入默认值
    pub async fn ensure_settings(&self, user_id: UserId) -> Result<UserSettings, ApplicationError> {
        if let Some(settings) = self.deps.user_repository.settings(user_id).await? {
            return Ok(settings);
        }
        Ok(self
            .deps
            .user_repository
            .save_settings(user_id, UserSettings::default())
            .await?)
    }

    pub async fn update_settings(
        &self,
        ctx: &SessionContext,
        settings: UserSettings,
    ) -> Result<UserSettings, ApplicationError> {
        settings.validate()?;
        Ok(self
            .deps
            .user_repository
            .save_settings(ctx.user_id(), settings)
            .await?)
    }

    /// 按配置预置管理员。已存在的用户名保持原样，重复执行无副作用。
    pub async fn bootstrap_admins(&self, seeds: &[AdminSeed]) -> Result<usize, ApplicationError> {
        let mut created = 0;
        for seed in seeds {
            let username = Username::parse(seed.username.clone())?;
            if let Some(existing) = self
                .deps
                .user_repository
                .find_by_username(&username)
                .await?
            {
                if !existing.is_admin() {
                    tracing::warn!(username = %username, "bootstrap admin name is taken by a non-admin account");
                }
                continue;
            }

            check_password_policy(&seed.password)?;
            let email = UserEmail::parse_optional(seed.email.clone())?;
            let password_hash = self.deps.password_hasher.hash(&seed.password).await?;
            let now = self.deps.clock.now();
            let id = UserId::from(Uuid::new_v4());

            let user = self
                .insert_with_fresh_unique_id(|unique_id| {
                    User::bootstrap_admin(
                        id,
                        username.clone(),
                        password_hash.clone(),
                        email.clone(),
                        unique_id,
                        now,
                    )
                })
                .await?;
            tracing::info!(username = %user.username, "bootstrap admin provisioned");
            created += 1;
        }
        Ok(created)
    }
}

fn not_found_as_user(err: RepositoryError) -> ApplicationError {
    match err {
        RepositoryError::NotFound => ApplicationError::UserNotFound,
        other => other.into(),
    }
}
