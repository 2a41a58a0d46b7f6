//! 应用层实现。
//!
//! 围绕领域模型提供用例服务：身份管理、会话闸门、房间与消息，
//! 并定义存储、密码哈希、附件存储等外部适配器的端口。

pub mod attachments;
pub mod clock;
pub mod dto;
pub mod error;
pub mod password;
pub mod repository;
pub mod services;
pub mod session;
pub mod unique_id;

pub use attachments::{AttachmentHandler, AttachmentStorage, DEFAULT_MAX_ATTACHMENT_BYTES};
pub use clock::{Clock, ManualClock, SystemClock};
pub use dto::{MessageView, OnlineUserDto, RoomDto, SettingsDto, UserDto};
pub use error::{ApplicationError, AttachmentError};
pub use password::{PasswordHasher, PasswordHasherError};
pub use repository::{MessageRepository, RoomRepository, SessionRepository, UserRepository};
pub use services::{
    IdentityService, IdentityServiceDependencies, MessageService, MessageServiceDependencies,
    RoomService, RoomServiceDependencies, SessionGate, SessionGateDependencies,
};
pub use session::{SessionContext, SessionRecord};
pub use unique_id::{RandomUniqueIds, UniqueIdGenerator};
