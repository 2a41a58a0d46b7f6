use std::sync::Arc;

use application::{
    AttachmentHandler, Clock, IdentityService, IdentityServiceDependencies, MessageService,
    MessageServiceDependencies, RoomService, RoomServiceDependencies, SessionGate,
    SessionGateDependencies, UniqueIdGenerator,
};
use config::AppConfig;
use infrastructure::Infrastructure;
use time::Duration;

use crate::cookie::SessionCookies;

/// multipart 边界与其他表单字段的额外余量
const MULTIPART_OVERHEAD_BYTES: u64 = 64 * 1024;

/// HTTP 层关心的配置子集
#[derive(Clone)]
pub struct WebSettings {
    pub session_secret: Vec<u8>,
    pub cookie_name: String,
    pub secure_cookie: bool,
    pub session_ttl: Duration,
    pub max_upload_bytes: u64,
}

impl WebSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        let ttl_hours = i64::try_from(config.session.ttl_hours).unwrap_or(i64::MAX / 3600);
        Self {
            session_secret: config.session.secret.as_bytes().to_vec(),
            cookie_name: config.session.cookie_name.clone(),
            secure_cookie: config.session.secure_cookie,
            session_ttl: Duration::hours(ttl_hours),
            max_upload_bytes: config.uploads.max_bytes,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub identity: Arc<IdentityService>,
    pub gate: Arc<SessionGate>,
    pub rooms: Arc<RoomService>,
    pub messages: Arc<MessageService>,
    pub attachments: Arc<AttachmentHandler>,
    pub cookies: Arc<SessionCookies>,
}

impl AppState {
    /// 用基础设施适配器装配全部用例服务
    pub fn new(
        infra: &Infrastructure,
        clock: Arc<dyn Clock>,
        unique_ids: Arc<dyn UniqueIdGenerator>,
        settings: &WebSettings,
    ) -> Self {
        let identity = Arc::new(IdentityService::new(IdentityServiceDependencies {
            user_repository: infra.user_repository.clone(),
            password_hasher: infra.password_hasher.clone(),
            clock: clock.clone(),
            unique_ids,
        }));
        let gate = Arc::new(SessionGate::new(SessionGateDependencies {
            identity: identity.clone(),
            user_repository: infra.user_repository.clone(),
            session_repository: infra.session_repository.clone(),
            clock: clock.clone(),
            session_ttl: settings.session_ttl,
        }));
        let rooms = Arc::new(RoomService::new(RoomServiceDependencies {
            room_repository: infra.room_repository.clone(),
            clock: clock.clone(),
        }));
        let attachments = Arc::new(AttachmentHandler::new(
            infra.attachment_storage.clone(),
            clock.clone(),
            settings.max_upload_bytes,
        ));
        let messages = Arc::new(MessageService::new(MessageServiceDependencies {
            room_repository: infra.room_repository.clone(),
            message_repository: infra.message_repository.clone(),
            attachments: attachments.clone(),
            clock,
        }));
        let cookies = Arc::new(SessionCookies::new(
            &settings.session_secret,
            settings.cookie_name.clone(),
            settings.secure_cookie,
            settings.session_ttl,
        ));

        Self {
            identity,
            gate,
            rooms,
            messages,
            attachments,
            cookies,
        }
    }

    /// 请求体上限：附件上限加上表单余量
    pub fn body_limit(&self) -> usize {
        let limit = self
            .attachments
            .max_bytes()
            .saturating_add(MULTIPART_OVERHEAD_BYTES);
        usize::try_from(limit).unwrap_or(usize::MAX)
    }
}
