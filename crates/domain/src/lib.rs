//! 课堂聊天系统核心领域模型
//!
//! 包含用户、房间、消息等实体，以及决定谁可以进入哪个房间、
//! 谁可以编辑或删除哪条消息的访问策略。本 crate 不做任何 I/O。

pub mod errors;
pub mod message;
pub mod policy;
pub mod room;
pub mod user;
pub mod value_objects;

// 重新导出常用类型
pub use errors::{DomainError, DomainResult, RepositoryError};
pub use message::{Message, MessageDraft, MessageKind, ReplyPreview};
pub use policy::{Actor, Denial};
pub use room::Room;
pub use user::{BanRecord, Role, Theme, User, UserSettings};
pub use value_objects::{
    AttachmentRef, MessageId, PasswordHash, RoomName, Timestamp, UniqueId, UserEmail, UserId,
    Username,
};
