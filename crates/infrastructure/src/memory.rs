//! 进程内存储实现，用于测试与无数据库的本地运行。
//!
//! 唯一性检查都在写锁内完成，并发注册的表现与数据库约束一致；
//! 冲突时返回与 PostgreSQL 相同的约束名。

use std::collections::HashMap;
use std::sync::Arc;

use application::{
    repository::{MessageRepository, RoomRepository, SessionRepository, UserRepository},
    SessionRecord,
};
use async_trait::async_trait;
use domain::{
    AttachmentRef, BanRecord, Message, MessageDraft, MessageId, PasswordHash, RepositoryError, Room, RoomName,
    Timestamp, UniqueId, User, UserId, UserSettings, Username,
};
use tokio::sync::RwLock;

#[derive(Default)]
struct UserTable {
    users: HashMap<UserId, User>,
    settings: HashMap<UserId, UserSettings>,
}

impl UserTable {
    fn check_unique(&self, candidate: &User) -> Result<(), RepositoryError> {
        for existing in self.users.values().filter(|u| u.id != candidate.id) {
            if existing.username == candidate.username {
                return Err(RepositoryError::conflict("users_username_key"));
            }
            if candidate.email.is_some() && existing.email == candidate.email {
                return Err(RepositoryError::conflict("users_email_key"));
            }
            if existing.unique_id == candidate.unique_id {
                return Err(RepositoryError::conflict("users_unique_id_key"));
            }
        }
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryUserRepository {
    inner: Arc<RwLock<UserTable>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 在写锁内就地修改一行，对应数据库里的单条 UPDATE
    async fn modify(
        &self,
        id: UserId,
        change: impl FnOnce(&mut User),
    ) -> Result<User, RepositoryError> {
        let mut table = self.inner.write().await;
        let user = table.users.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        change(user);
        Ok(user.clone())
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: User, settings: UserSettings) -> Result<User, RepositoryError> {
        let mut table = self.inner.write().await;
        if table.users.contains_key(&user.id) {
            return Err(RepositoryError::conflict("users_pkey"));
        }
        table.check_unique(&user)?;
        table.settings.insert(user.id, settings);
        table.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn set_approval(&self, id: UserId, approved: bool) -> Result<User, RepositoryError> {
        self.modify(id, |user| user.set_approval(approved)).await
    }

    async fn set_ban(&self, id: UserId, ban: BanRecord) -> Result<User, RepositoryError> {
        self.modify(id, |user| user.ban(ban.reason, ban.banned_by, ban.banned_at))
            .await
    }

    async fn clear_ban(&self, id: UserId) -> Result<User, RepositoryError> {
        self.modify(id, User::unban).await
    }

    async fn mark_online(&self, id: UserId, at: Timestamp) -> Result<User, RepositoryError> {
        self.modify(id, |user| user.mark_online(at)).await
    }

    async fn mark_offline(&self, id: UserId) -> Result<(), RepositoryError> {
        self.modify(id, User::mark_offline).await.map(|_| ())
    }

    async fn set_password(&self, id: UserId, password: PasswordHash) -> Result<(), RepositoryError> {
        self.modify(id, |user| user.set_password(password)).await.map(|_| ())
    }

    async fn delete(&self, id: UserId) -> Result<(), RepositoryError> {
        let mut table = self.inner.write().await;
        if table.users.remove(&id).is_none() {
            return Err(RepositoryError::NotFound);
        }
        table.settings.remove(&id);
        Ok(())
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &Username) -> Result<Option<User>, RepositoryError> {
        let table = self.inner.read().await;
        Ok(table
            .users
            .values()
            .find(|user| &user.username == username)
            .cloned())
    }

    async fn find_by_unique_id(&self, unique_id: UniqueId) -> Result<Option<User>, RepositoryError> {
        let table = self.inner.read().await;
        Ok(table
            .users
            .values()
            .find(|user| user.unique_id == unique_id)
            .cloned())
    }

    async fn unique_id_exists(&self, unique_id: UniqueId) -> Result<bool, RepositoryError> {
        let table = self.inner.read().await;
        Ok(table.users.values().any(|user| user.unique_id == unique_id))
    }

    async fn list_all(&self) -> Result<Vec<User>, RepositoryError> {
        let table = self.inner.read().await;
        let mut users: Vec<User> = table.users.values().cloned().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    async fn list_online(&self) -> Result<Vec<User>, RepositoryError> {
        let table = self.inner.read().await;
        let mut users: Vec<User> = table
            .users
            .values()
            .filter(|user| user.is_online)
            .cloned()
            .collect();
        users.sort_by(|a, b| a.username.as_str().cmp(b.username.as_str()));
        Ok(users)
    }

    async fn settings(&self, id: UserId) -> Result<Option<UserSettings>, RepositoryError> {
        Ok(self.inner.read().await.settings.get(&id).cloned())
    }

    async fn save_settings(
        &self,
        id: UserId,
        settings: UserSettings,
    ) -> Result<UserSettings, RepositoryError> {
        let mut table = self.inner.write().await;
        if !table.users.contains_key(&id) {
            return Err(RepositoryError::NotFound);
        }
        table.settings.insert(id, settings.clone());
        Ok(settings)
    }
}

/// 房间按写入顺序保存
#[derive(Default, Clone)]
pub struct InMemoryRoomRepository {
    rooms: Arc<RwLock<Vec<Room>>>,
}

impl InMemoryRoomRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 直接替换一个房间，测试中用来停用房间
    pub async fn replace(&self, room: Room) {
        let mut rooms = self.rooms.write().await;
        if let Some(slot) = rooms.iter_mut().find(|existing| existing.name == room.name) {
            *slot = room;
        } else {
            rooms.push(room);
        }
    }
}

#[async_trait]
impl RoomRepository for InMemoryRoomRepository {
    async fn insert_if_absent(&self, room: Room) -> Result<bool, RepositoryError> {
        let mut rooms = self.rooms.write().await;
        if rooms.iter().any(|existing| existing.name == room.name) {
            return Ok(false);
        }
        rooms.push(room);
        Ok(true)
    }

    async fn create(&self, room: Room) -> Result<Room, RepositoryError> {
        let mut rooms = self.rooms.write().await;
        if rooms.iter().any(|existing| existing.name == room.name) {
            return Err(RepositoryError::conflict("rooms_name_key"));
        }
        rooms.push(room.clone());
        Ok(room)
    }

    async fn find_by_name(&self, name: &RoomName) -> Result<Option<Room>, RepositoryError> {
        let rooms = self.rooms.read().await;
        Ok(rooms.iter().find(|room| &room.name == name).cloned())
    }

    async fn list_active(&self) -> Result<Vec<Room>, RepositoryError> {
        let rooms = self.rooms.read().await;
        Ok(rooms.iter().filter(|room| room.is_active).cloned().collect())
    }
}

#[derive(Default)]
struct MessageTable {
    next_id: i64,
    // 按 id 递增保存
    rows: Vec<Message>,
}

#[derive(Default, Clone)]
pub struct InMemoryMessageRepository {
    inner: Arc<RwLock<MessageTable>>,
}

impl InMemoryMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn insert(&self, draft: MessageDraft) -> Result<Message, RepositoryError> {
        let mut table = self.inner.write().await;
        table.next_id += 1;
        let message = Message::from_draft(MessageId(table.next_id), draft);
        table.rows.push(message.clone());
        Ok(message)
    }

    async fn find_by_id(&self, id: MessageId) -> Result<Option<Message>, RepositoryError> {
        let table = self.inner.read().await;
        Ok(table.rows.iter().find(|message| message.id == id).cloned())
    }

    async fn find_by_ids(&self, ids: Vec<MessageId>) -> Result<Vec<Message>, RepositoryError> {
        let table = self.inner.read().await;
        Ok(table
            .rows
            .iter()
            .filter(|message| ids.contains(&message.id))
            .cloned()
            .collect())
    }

    async fn find_by_attachment(
        &self,
        attachment: &AttachmentRef,
    ) -> Result<Option<Message>, RepositoryError> {
        let table = self.inner.read().await;
        Ok(table
            .rows
            .iter()
            .find(|message| message.attachment.as_ref() == Some(attachment))
            .cloned())
    }

    async fn update(&self, message: Message) -> Result<Message, RepositoryError> {
        let mut table = self.inner.write().await;
        let slot = table
            .rows
            .iter_mut()
            .find(|existing| existing.id == message.id)
            .ok_or(RepositoryError::NotFound)?;
        slot.body = message.body;
        slot.edited_at = message.edited_at;
        Ok(slot.clone())
    }

    async fn delete(&self, id: MessageId) -> Result<(), RepositoryError> {
        let mut table = self.inner.write().await;
        let before = table.rows.len();
        table.rows.retain(|message| message.id != id);
        if table.rows.len() == before {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn list_page(
        &self,
        room: &RoomName,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Message>, RepositoryError> {
        let table = self.inner.read().await;
        Ok(table
            .rows
            .iter()
            .rev()
            .filter(|message| &message.room == room)
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn search(&self, room: &RoomName, needle: &str) -> Result<Vec<Message>, RepositoryError> {
        let table = self.inner.read().await;
        Ok(table
            .rows
            .iter()
            .rev()
            .filter(|message| &message.room == room)
            .filter(|message| message.body.as_deref().is_some_and(|body| body.contains(needle)))
            .cloned()
            .collect())
    }
}

#[derive(Default, Clone)]
pub struct InMemorySessionRepository {
    sessions: Arc<RwLock<HashMap<String, SessionRecord>>>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn create(&self, session: SessionRecord) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.token) {
            return Err(RepositoryError::conflict("sessions_pkey"));
        }
        sessions.insert(session.token.clone(), session);
        Ok(())
    }

    async fn find(&self, token: &str) -> Result<Option<SessionRecord>, RepositoryError> {
        Ok(self.sessions.read().await.get(token).cloned())
    }

    async fn delete(&self, token: &str) -> Result<(), RepositoryError> {
        self.sessions.write().await.remove(token);
        Ok(())
    }

    async fn delete_expired(&self, now: Timestamp) -> Result<u64, RepositoryError> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(now));
        Ok((before - sessions.len()) as u64)
    }
}

/// 一组共享状态的内存仓储
#[derive(Default, Clone)]
pub struct InMemoryStorage {
    pub user_repository: Arc<InMemoryUserRepository>,
    pub room_repository: Arc<InMemoryRoomRepository>,
    pub message_repository: Arc<InMemoryMessageRepository>,
    pub session_repository: Arc<InMemorySessionRepository>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}
