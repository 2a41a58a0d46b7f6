//! 存储端口。基础设施层提供 PostgreSQL 与内存两套实现。

use async_trait::async_trait;
use domain::{
    AttachmentRef, BanRecord, Message, MessageDraft, MessageId, PasswordHash, RepositoryError, Room, RoomName,
    Timestamp, UniqueId, User, UserId, UserSettings, Username,
};

use crate::session::SessionRecord;

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// 在同一事务中写入用户与其默认设置。
    /// 唯一约束冲突返回 `RepositoryError::Conflict`，并带上约束名。
    async fn create(&self, user: User, settings: UserSettings) -> Result<User, RepositoryError>;
    // 以下写操作各自只改动相关的列，并返回写入后的整行；
    // 用户不存在时返回 `RepositoryError::NotFound`。
    async fn set_approval(&self, id: UserId, approved: bool) -> Result<User, RepositoryError>;
    /// 写入封禁记录，同时置为离线
    async fn set_ban(&self, id: UserId, ban: BanRecord) -> Result<User, RepositoryError>;
    async fn clear_ban(&self, id: UserId) -> Result<User, RepositoryError>;
    async fn mark_online(&self, id: UserId, at: Timestamp) -> Result<User, RepositoryError>;
    async fn mark_offline(&self, id: UserId) -> Result<(), RepositoryError>;
    async fn set_password(&self, id: UserId, password: PasswordHash)
        -> Result<(), RepositoryError>;
    /// 删除用户及其设置（仅用于拒绝注册）
    async fn delete(&self, id: UserId) -> Result<(), RepositoryError>;
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;
    async fn find_by_username(&self, username: &Username)
        -> Result<Option<User>, RepositoryError>;
    async fn find_by_unique_id(&self, unique_id: UniqueId)
        -> Result<Option<User>, RepositoryError>;
    async fn unique_id_exists(&self, unique_id: UniqueId) -> Result<bool, RepositoryError>;
    /// 按注册时间倒序
    async fn list_all(&self) -> Result<Vec<User>, RepositoryError>;
    async fn list_online(&self) -> Result<Vec<User>, RepositoryError>;
    async fn settings(&self, id: UserId) -> Result<Option<UserSettings>, RepositoryError>;
    async fn save_settings(
        &self,
        id: UserId,
        settings: UserSettings,
    ) -> Result<UserSettings, RepositoryError>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait RoomRepository: Send + Sync {
    /// 名称已存在时不做修改，返回是否真正写入
    async fn insert_if_absent(&self, room: Room) -> Result<bool, RepositoryError>;
    async fn create(&self, room: Room) -> Result<Room, RepositoryError>;
    async fn find_by_name(&self, name: &RoomName) -> Result<Option<Room>, RepositoryError>;
    /// 按创建顺序
    async fn list_active(&self) -> Result<Vec<Room>, RepositoryError>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn insert(&self, draft: MessageDraft) -> Result<Message, RepositoryError>;
    async fn find_by_id(&self, id: MessageId) -> Result<Option<Message>, RepositoryError>;
    async fn find_by_ids(&self, ids: Vec<MessageId>) -> Result<Vec<Message>, RepositoryError>;
    /// 引用该附件的消息
    async fn find_by_attachment(
        &self,
        attachment: &AttachmentRef,
    ) -> Result<Option<Message>, RepositoryError>;
    async fn update(&self, message: Message) -> Result<Message, RepositoryError>;
    async fn delete(&self, id: MessageId) -> Result<(), RepositoryError>;
    /// 最新的在前
    async fn list_page(
        &self,
        room: &RoomName,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Message>, RepositoryError>;
    /// 正文包含 `needle` 的消息，最新的在前
    async fn search(&self, room: &RoomName, needle: &str)
        -> Result<Vec<Message>, RepositoryError>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, session: SessionRecord) -> Result<(), RepositoryError>;
    async fn find(&self, token: &str) -> Result<Option<SessionRecord>, RepositoryError>;
    async fn delete(&self, token: &str) -> Result<(), RepositoryError>;
    async fn delete_expired(&self, now: Timestamp) -> Result<u64, RepositoryError>;
}
