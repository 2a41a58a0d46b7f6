//! 账号生命周期：注册、审批、登录、封禁、拒绝、找回密码

use std::collections::HashSet;
use std::sync::Arc;

use application::{
    services::{LoginRequest, RegisterUserRequest, ResetTarget},
    ApplicationError, IdentityService, IdentityServiceDependencies, ManualClock, RandomUniqueIds,
    SessionGate, SessionGateDependencies, UserRepository,
};
use async_trait::async_trait;
use domain::{
    BanRecord, PasswordHash, RepositoryError, Role, Timestamp, UniqueId, User, UserId,
    UserSettings, Username,
};
use infrastructure::{BcryptPasswordHasher, InMemorySessionRepository, InMemoryUserRepository};
use tests::{TestEnvironment, ADMIN_PASSWORD, ADMIN_USERNAME, DEFAULT_PASSWORD};
use time::{macros::datetime, Duration};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_registrations_get_distinct_seven_digit_ids() {
    let env = TestEnvironment::new().await.unwrap();

    let handles: Vec<_> = (0..40)
        .map(|i| {
            let identity = env.state.identity.clone();
            tokio::spawn(async move {
                identity
                    .register(RegisterUserRequest {
                        username: format!("pupil{i:02}"),
                        password: DEFAULT_PASSWORD.into(),
                        confirm_password: None,
                        email: None,
                        role: Role::Student,
                    })
                    .await
            })
        })
        .collect();

    let mut ids = HashSet::new();
    for result in futures::future::join_all(handles).await {
        let user = result.unwrap().unwrap();
        let id = user.unique_id.value();
        assert!((UniqueId::MIN..=UniqueId::MAX).contains(&id));
        assert_eq!(id.to_string().len(), 7);
        assert!(ids.insert(id), "duplicate unique id {id}");
    }
    assert_eq!(ids.len(), 40);
}

#[tokio::test]
async fn same_username_registered_concurrently_only_once() {
    let env = TestEnvironment::new().await.unwrap();
    let (first, second) = tokio::join!(
        env.register("twin", Role::Parent),
        env.register("twin", Role::Parent)
    );
    assert_eq!([first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count(), 1);
}

#[tokio::test]
async fn pending_user_is_told_to_wait_until_approved() {
    let env = TestEnvironment::new().await.unwrap();
    let user = env.register("newbie", Role::Teacher).await.unwrap();
    assert!(!user.approved);

    let err = env.sign_in("newbie", DEFAULT_PASSWORD).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ApplicationError>(),
        Some(ApplicationError::PendingApproval)
    ));

    let admin = env.admin().await.unwrap();
    env.state.identity.set_approval(&admin, user.id, true).await.unwrap();
    let ctx = env.sign_in("newbie", DEFAULT_PASSWORD).await.unwrap();
    assert_eq!(ctx.role(), Role::Teacher);
}

#[tokio::test]
async fn banned_user_is_evicted_on_next_request() {
    let env = TestEnvironment::new().await.unwrap();
    let student = env.member("mallory", Role::Student).await.unwrap();
    let admin = env.admin().await.unwrap();

    env.state
        .identity
        .ban(&admin, student.user_id(), Some("spamming".into()))
        .await
        .unwrap();

    let err = env
        .state
        .gate
        .resolve(Some(&student.session_id))
        .await
        .unwrap_err();
    assert!(matches!(err, ApplicationError::Banned { ref reason } if reason == "spamming"));

    let err = env
        .state
        .gate
        .resolve(Some(&student.session_id))
        .await
        .unwrap_err();
    assert!(matches!(err, ApplicationError::Unauthenticated));

    let record = env.find_user("mallory").await.unwrap();
    assert!(record.banned);
    assert!(!record.is_online);

    let err = env
        .state
        .gate
        .login(LoginRequest {
            username: "mallory".into(),
            password: DEFAULT_PASSWORD.into(),
            remember_me: false,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ApplicationError::Banned { .. }));

    env.state.identity.unban(&admin, student.user_id()).await.unwrap();
    assert!(env.sign_in("mallory", DEFAULT_PASSWORD).await.is_ok());
}

#[tokio::test]
async fn rejected_user_disappears_with_settings() {
    let env = TestEnvironment::new().await.unwrap();
    let user = env.register("unwanted", Role::Parent).await.unwrap();
    assert!(env.storage.user_repository.settings(user.id).await.unwrap().is_some());

    let admin = env.admin().await.unwrap();
    env.state.identity.reject(&admin, user.id).await.unwrap();

    assert!(env.storage.user_repository.settings(user.id).await.unwrap().is_none());
    assert!(env.storage.user_repository.find_by_id(user.id).await.unwrap().is_none());
    let err = env.sign_in("unwanted", DEFAULT_PASSWORD).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ApplicationError>(),
        Some(ApplicationError::InvalidCredentials)
    ));
}

#[tokio::test]
async fn admin_bootstrap_runs_once() {
    let env = TestEnvironment::new().await.unwrap();
    let seeds = [application::services::AdminSeed {
        username: ADMIN_USERNAME.into(),
        email: None,
        password: "a-different-password".into(),
    }];
    assert_eq!(env.state.identity.bootstrap_admins(&seeds).await.unwrap(), 0);

    // 原密码仍然有效
    let admin = env.sign_in(ADMIN_USERNAME, ADMIN_PASSWORD).await.unwrap();
    assert_eq!(admin.role(), Role::Admin);
    let admins = env
        .state
        .identity
        .list_users(&admin)
        .await
        .unwrap()
        .into_iter()
        .filter(|user| user.is_admin())
        .count();
    assert_eq!(admins, 1);
}

#[tokio::test]
async fn forgotten_password_is_reset_through_unique_id() {
    let env = TestEnvironment::new().await.unwrap();
    let user = env.approved_user("forgetful", Role::Parent).await.unwrap();

    let found = env
        .state
        .identity
        .lookup_by_unique_id(user.unique_id)
        .await
        .unwrap();
    assert_eq!(found.username.as_str(), "forgetful");

    env.state
        .identity
        .reset_password(ResetTarget::UniqueId(user.unique_id), "brand-new-pass")
        .await
        .unwrap();
    assert!(env.sign_in("forgetful", DEFAULT_PASSWORD).await.is_err());
    assert!(env.sign_in("forgetful", "brand-new-pass").await.is_ok());
}

#[tokio::test]
async fn sessions_expire_after_ttl() {
    let env = TestEnvironment::new().await.unwrap();
    let ctx = env.member("sleepy", Role::Student).await.unwrap();
    assert!(env.state.gate.resolve(Some(&ctx.session_id)).await.is_ok());

    env.clock.advance(Duration::hours(25));
    assert!(matches!(
        env.state.gate.resolve(Some(&ctx.session_id)).await,
        Err(ApplicationError::Unauthenticated)
    ));
    // 审批时管理员留下的会话也已过期
    assert_eq!(env.state.gate.purge_expired().await.unwrap(), 1);
    assert_eq!(env.storage.session_repository.count().await, 0);
}

/// 按用户名读出账号之后，立刻在存储里写入一次管理员封禁，
/// 调用方拿到的仍是封禁之前的那份数据。
struct BanAfterLookup {
    inner: InMemoryUserRepository,
    target: &'static str,
}

#[async_trait]
impl UserRepository for BanAfterLookup {
    async fn create(&self, user: User, settings: UserSettings) -> Result<User, RepositoryError> {
        self.inner.create(user, settings).await
    }

    async fn set_approval(&self, id: UserId, approved: bool) -> Result<User, RepositoryError> {
        self.inner.set_approval(id, approved).await
    }

    async fn set_ban(&self, id: UserId, ban: BanRecord) -> Result<User, RepositoryError> {
        self.inner.set_ban(id, ban).await
    }

    async fn clear_ban(&self, id: UserId) -> Result<User, RepositoryError> {
        self.inner.clear_ban(id).await
    }

    async fn mark_online(&self, id: UserId, at: Timestamp) -> Result<User, RepositoryError> {
        self.inner.mark_online(id, at).await
    }

    async fn mark_offline(&self, id: UserId) -> Result<(), RepositoryError> {
        self.inner.mark_offline(id).await
    }

    async fn set_password(&self, id: UserId, password: PasswordHash) -> Result<(), RepositoryError> {
        self.inner.set_password(id, password).await
    }

    async fn delete(&self, id: UserId) -> Result<(), RepositoryError> {
        self.inner.delete(id).await
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_username(&self, username: &Username) -> Result<Option<User>, RepositoryError> {
        let found = self.inner.find_by_username(username).await?;
        if let Some(user) = found.as_ref().filter(|user| user.username.as_str() == self.target) {
            let ban = BanRecord {
                reason: "banned while logging in".into(),
                banned_at: datetime!(2024-09-02 08:00 UTC),
                banned_by: None,
            };
            self.inner.set_ban(user.id, ban).await?;
        }
        Ok(found)
    }

    async fn find_by_unique_id(&self, unique_id: UniqueId) -> Result<Option<User>, RepositoryError> {
        self.inner.find_by_unique_id(unique_id).await
    }

    async fn unique_id_exists(&self, unique_id: UniqueId) -> Result<bool, RepositoryError> {
        self.inner.unique_id_exists(unique_id).await
    }

    async fn list_all(&self) -> Result<Vec<User>, RepositoryError> {
        self.inner.list_all().await
    }

    async fn list_online(&self) -> Result<Vec<User>, RepositoryError> {
        self.inner.list_online().await
    }

    async fn settings(&self, id: UserId) -> Result<Option<UserSettings>, RepositoryError> {
        self.inner.settings(id).await
    }

    async fn save_settings(
        &self,
        id: UserId,
        settings: UserSettings,
    ) -> Result<UserSettings, RepositoryError> {
        self.inner.save_settings(id, settings).await
    }
}

#[tokio::test]
async fn ban_landing_mid_login_is_kept_and_enforced() {
    let inner = InMemoryUserRepository::new();
    let users: Arc<dyn UserRepository> = Arc::new(BanAfterLookup {
        inner: inner.clone(),
        target: "victim",
    });
    let sessions = Arc::new(InMemorySessionRepository::new());
    let clock = Arc::new(ManualClock::new(datetime!(2024-09-02 08:00 UTC)));
    let identity = Arc::new(IdentityService::new(IdentityServiceDependencies {
        user_repository: users.clone(),
        password_hasher: Arc::new(BcryptPasswordHasher::new(Some(4))),
        clock: clock.clone(),
        unique_ids: Arc::new(RandomUniqueIds),
    }));
    let gate = SessionGate::new(SessionGateDependencies {
        identity: identity.clone(),
        user_repository: users,
        session_repository: sessions.clone(),
        clock,
        session_ttl: Duration::hours(24),
    });

    let victim = identity
        .register(RegisterUserRequest {
            username: "victim".into(),
            password: DEFAULT_PASSWORD.into(),
            confirm_password: None,
            email: None,
            role: Role::Student,
        })
        .await
        .unwrap();
    inner.set_approval(victim.id, true).await.unwrap();

    let err = gate
        .login(LoginRequest {
            username: "victim".into(),
            password: DEFAULT_PASSWORD.into(),
            remember_me: false,
        })
        .await
        .unwrap_err();
    match err {
        ApplicationError::Banned { reason } => assert_eq!(reason, "banned while logging in"),
        other => panic!("unexpected error: {other:?}"),
    }

    // 封禁没有被登录写回覆盖，刚发出的会话也已收回
    let stored = inner.find_by_id(victim.id).await.unwrap().unwrap();
    assert_eq!(stored.ban_reason(), Some("banned while logging in"));
    assert!(stored.approved);
    assert!(!stored.is_online);
    assert_eq!(sessions.count().await, 0);
}

#[tokio::test]
async fn eviction_does_not_undo_a_concurrent_unban() {
    let env = TestEnvironment::new().await.unwrap();
    let ctx = env.member("restless", Role::Student).await.unwrap();
    let admin = env.admin().await.unwrap();

    env.state
        .identity
        .ban(&admin, ctx.user_id(), Some("cooling off".into()))
        .await
        .unwrap();
    assert!(matches!(
        env.state.gate.resolve(Some(&ctx.session_id)).await,
        Err(ApplicationError::Banned { .. })
    ));
    env.state.identity.unban(&admin, ctx.user_id()).await.unwrap();

    // 闸门的离线写入只动在线标记，解封之后可以直接重新登录
    let again = env.sign_in("restless", DEFAULT_PASSWORD).await.unwrap();
    assert_eq!(again.user_id(), ctx.user_id());
    let stored = env
        .storage
        .user_repository
        .find_by_id(ctx.user_id())
        .await
        .unwrap()
        .unwrap();
    assert!(!stored.is_banned());
    assert!(stored.is_online);
}
