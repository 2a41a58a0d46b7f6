//! 测试环境管理
//!
//! 每个环境拥有独立的内存仓储、临时上传目录和手动时钟，
//! 启动时写入默认房间与一名管理员。

use std::sync::Arc;

use anyhow::{anyhow, Result};
use application::{
    services::{AdminSeed, LoginRequest, RegisterUserRequest},
    ManualClock, RandomUniqueIds, SessionContext, UserDto,
};
use axum::Router;
use domain::{Role, User};
use infrastructure::{BcryptPasswordHasher, DiskAttachmentStorage, InMemoryStorage, Infrastructure};
use tempfile::TempDir;
use time::{macros::datetime, Duration};
use web_api::{AppState, WebSettings};

pub const ADMIN_USERNAME: &str = "principal";
pub const ADMIN_PASSWORD: &str = "principal-pass";
pub const DEFAULT_PASSWORD: &str = "classroom-pass";
pub const SESSION_SECRET: &str = "integration-secret-integration-secret";
pub const COOKIE_NAME: &str = "kgchat_session";

/// 隔离的测试环境
pub struct TestEnvironment {
    pub state: AppState,
    pub storage: InMemoryStorage,
    pub clock: Arc<ManualClock>,
    uploads: TempDir,
}

impl TestEnvironment {
    pub async fn new() -> Result<Self> {
        Self::with_upload_limit(16 * 1024 * 1024).await
    }

    pub async fn with_upload_limit(max_upload_bytes: u64) -> Result<Self> {
        let uploads = tempfile::tempdir()?;
        let storage = InMemoryStorage::new();
        let infra = Infrastructure {
            user_repository: storage.user_repository.clone(),
            room_repository: storage.room_repository.clone(),
            message_repository: storage.message_repository.clone(),
            session_repository: storage.session_repository.clone(),
            password_hasher: Arc::new(BcryptPasswordHasher::new(Some(4))),
            attachment_storage: Arc::new(DiskAttachmentStorage::new(uploads.path())),
        };
        let clock = Arc::new(ManualClock::new(datetime!(2024-09-02 08:00 UTC)));
        let settings = WebSettings {
            session_secret: SESSION_SECRET.as_bytes().to_vec(),
            cookie_name: COOKIE_NAME.into(),
            secure_cookie: false,
            session_ttl: Duration::hours(24),
            max_upload_bytes,
        };
        let state = AppState::new(&infra, clock.clone(), Arc::new(RandomUniqueIds), &settings);

        state.rooms.seed_defaults().await?;
        state
            .identity
            .bootstrap_admins(&[AdminSeed {
                username: ADMIN_USERNAME.into(),
                email: None,
                password: ADMIN_PASSWORD.into(),
            }])
            .await?;

        Ok(Self {
            state,
            storage,
            clock,
            uploads,
        })
    }

    pub fn router(&self) -> Router {
        web_api::router(self.state.clone())
    }

    pub fn upload_dir(&self) -> &std::path::Path {
        self.uploads.path()
    }

    /// 登录并经过会话闸门，返回请求上下文
    pub async fn sign_in(&self, username: &str, password: &str) -> Result<SessionContext> {
        let outcome = self
            .state
            .gate
            .login(LoginRequest {
                username: username.into(),
                password: password.into(),
                remember_me: false,
            })
            .await?;
        Ok(self.state.gate.resolve(Some(&outcome.session.token)).await?)
    }

    pub async fn admin(&self) -> Result<SessionContext> {
        self.sign_in(ADMIN_USERNAME, ADMIN_PASSWORD).await
    }

    /// 注册但不审批
    pub async fn register(&self, username: &str, role: Role) -> Result<User> {
        Ok(self
            .state
            .identity
            .register(RegisterUserRequest {
                username: username.into(),
                password: DEFAULT_PASSWORD.into(),
                confirm_password: Some(DEFAULT_PASSWORD.into()),
                email: None,
                role,
            })
            .await?)
    }

    /// 注册并由管理员审批
    pub async fn approved_user(&self, username: &str, role: Role) -> Result<User> {
        let user = self.register(username, role).await?;
        let admin = self.admin().await?;
        Ok(self.state.identity.set_approval(&admin, user.id, true).await?)
    }

    /// 注册、审批并登录
    pub async fn member(&self, username: &str, role: Role) -> Result<SessionContext> {
        self.approved_user(username, role).await?;
        self.sign_in(username, DEFAULT_PASSWORD).await
    }

    pub async fn find_user(&self, username: &str) -> Result<UserDto> {
        let admin = self.admin().await?;
        let users = self.state.identity.list_users(&admin).await?;
        users
            .iter()
            .find(|user| user.username.as_str() == username)
            .map(UserDto::from)
            .ok_or_else(|| anyhow!("user {username} not found"))
    }
}
