use std::sync::Arc;

use application::{
    repository::{MessageRepository, RoomRepository, SessionRepository, UserRepository},
    SessionRecord,
};
use async_trait::async_trait;
use domain::{
    AttachmentRef, BanRecord, Message, MessageDraft, MessageId, MessageKind, PasswordHash,
    RepositoryError, Role, Room, RoomName, Timestamp, UniqueId, User, UserEmail, UserId,
    UserSettings, Username,
};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// PostgreSQL 唯一约束冲突
const UNIQUE_VIOLATION: &str = "23505";

fn map_sqlx_err(err: sqlx::Error) -> RepositoryError {
    match err {
        sqlx::Error::RowNotFound => RepositoryError::NotFound,
        sqlx::Error::Database(ref db_err)
            if db_err.code().is_some_and(|code| code == UNIQUE_VIOLATION) =>
        {
            RepositoryError::conflict(db_err.constraint().unwrap_or("unknown"))
        }
        other => RepositoryError::storage(other.to_string()),
    }
}

fn invalid_data(message: impl Into<String>) -> RepositoryError {
    RepositoryError::storage(message)
}

const USER_COLUMNS: &str = "id, username, password_hash, email, role, unique_id, approved, \
     is_banned, ban_reason, banned_at, banned_by, is_online, last_login, created_at";

#[derive(Debug, FromRow)]
struct UserRecord {
    id: Uuid,
    username: String,
    password_hash: String,
    email: Option<String>,
    role: String,
    unique_id: i32,
    approved: bool,
    is_banned: bool,
    ban_reason: Option<String>,
    banned_at: Option<OffsetDateTime>,
    banned_by: Option<Uuid>,
    is_online: bool,
    last_login: Option<OffsetDateTime>,
    created_at: OffsetDateTime,
}

impl TryFrom<UserRecord> for User {
    type Error = RepositoryError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        let username = Username::parse(value.username).map_err(|err| invalid_data(err.to_string()))?;
        let password =
            PasswordHash::new(value.password_hash).map_err(|err| invalid_data(err.to_string()))?;
        let email = value
            .email
            .map(UserEmail::parse)
            .transpose()
            .map_err(|err| invalid_data(err.to_string()))?;
        let role: Role = value
            .role
            .parse()
            .map_err(|err: domain::DomainError| invalid_data(err.to_string()))?;
        let unique_id = u32::try_from(value.unique_id)
            .map_err(|err| invalid_data(err.to_string()))
            .and_then(|raw| UniqueId::new(raw).map_err(|err| invalid_data(err.to_string())))?;

        let ban = value.is_banned.then(|| BanRecord {
            reason: value.ban_reason.unwrap_or_default(),
            banned_at: value.banned_at.unwrap_or(value.created_at),
            banned_by: value.banned_by.map(UserId::from),
        });

        Ok(User {
            id: UserId::from(value.id),
            username,
            password: Some(password),
            email,
            role,
            unique_id,
            approved: value.approved,
            ban,
            is_online: value.is_online,
            last_login: value.last_login,
            created_at: value.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct SettingsRecord {
    theme: String,
    notifications: bool,
    sound_effects: bool,
    font_size: i16,
    auto_login: bool,
}

impl TryFrom<SettingsRecord> for UserSettings {
    type Error = RepositoryError;

    fn try_from(value: SettingsRecord) -> Result<Self, Self::Error> {
        Ok(UserSettings {
            theme: value
                .theme
                .parse()
                .map_err(|err: domain::DomainError| invalid_data(err.to_string()))?,
            notifications: value.notifications,
            sound_effects: value.sound_effects,
            font_size: u8::try_from(value.font_size).map_err(|err| invalid_data(err.to_string()))?,
            auto_login: value.auto_login,
        })
    }
}

#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: User, settings: UserSettings) -> Result<User, RepositoryError> {
        let password = user
            .password
            .as_ref()
            .ok_or_else(|| invalid_data("user has no password hash"))?;

        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;
        let sql = format!(
            "INSERT INTO users (id, username, password_hash, email, role, unique_id, approved, \
             is_banned, ban_reason, banned_at, banned_by, is_online, last_login, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             RETURNING {USER_COLUMNS}"
        );
        let record = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(Uuid::from(user.id))
            .bind(user.username.as_str())
            .bind(password.as_str())
            .bind(user.email.as_ref().map(|email| email.as_str()))
            .bind(user.role.as_str())
            .bind(user.unique_id.value() as i32)
            .bind(user.approved)
            .bind(user.ban.is_some())
            .bind(user.ban.as_ref().map(|ban| ban.reason.as_str()))
            .bind(user.ban.as_ref().map(|ban| ban.banned_at))
            .bind(user.ban.as_ref().and_then(|ban| ban.banned_by).map(Uuid::from))
            .bind(user.is_online)
            .bind(user.last_login)
            .bind(user.created_at)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx_err)?;

        sqlx::query(
            r#"INSERT INTO user_settings (user_id, theme, notifications, sound_effects, font_size, auto_login)
               VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(Uuid::from(user.id))
        .bind(settings.theme.as_str())
        .bind(settings.notifications)
        .bind(settings.sound_effects)
        .bind(i16::from(settings.font_size))
        .bind(settings.auto_login)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;

        tx.commit().await.map_err(map_sqlx_err)?;
        User::try_from(record)
    }

    async fn set_approval(&self, id: UserId, approved: bool) -> Result<User, RepositoryError> {
        let sql = format!("UPDATE users SET approved = $2 WHERE id = $1 RETURNING {USER_COLUMNS}");
        let record = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(Uuid::from(id))
            .bind(approved)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)?
            .ok_or(RepositoryError::NotFound)?;
        User::try_from(record)
    }

    async fn set_ban(&self, id: UserId, ban: BanRecord) -> Result<User, RepositoryError> {
        let sql = format!(
            "UPDATE users SET is_banned = TRUE, ban_reason = $2, banned_at = $3, banned_by = $4, \
             is_online = FALSE WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let record = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(Uuid::from(id))
            .bind(ban.reason.as_str())
            .bind(ban.banned_at)
            .bind(ban.banned_by.map(Uuid::from))
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)?
            .ok_or(RepositoryError::NotFound)?;
        User::try_from(record)
    }

    async fn clear_ban(&self, id: UserId) -> Result<User, RepositoryError> {
        let sql = format!(
            "UPDATE users SET is_banned = FALSE, ban_reason = NULL, banned_at = NULL, \
             banned_by = NULL WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let record = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(Uuid::from(id))
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)?
            .ok_or(RepositoryError::NotFound)?;
        User::try_from(record)
    }

    async fn mark_online(&self, id: UserId, at: Timestamp) -> Result<User, RepositoryError> {
        let sql = format!(
            "UPDATE users SET is_online = TRUE, last_login = $2 WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let record = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(Uuid::from(id))
            .bind(at)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)?
            .ok_or(RepositoryError::NotFound)?;
        User::try_from(record)
    }

    async fn mark_offline(&self, id: UserId) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE users SET is_online = FALSE WHERE id = $1")
            .bind(Uuid::from(id))
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn set_password(&self, id: UserId, password: PasswordHash) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(Uuid::from(id))
            .bind(password.as_str())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, id: UserId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;
        sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(Uuid::from(id))
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_err)?;
        sqlx::query("DELETE FROM user_settings WHERE user_id = $1")
            .bind(Uuid::from(id))
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_err)?;
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(Uuid::from(id))
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_err)?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        tx.commit().await.map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let record = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(Uuid::from(id))
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        record.map(User::try_from).transpose()
    }

    async fn find_by_username(&self, username: &Username) -> Result<Option<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        let record = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(username.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        record.map(User::try_from).transpose()
    }

    async fn find_by_unique_id(&self, unique_id: UniqueId) -> Result<Option<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE unique_id = $1");
        let record = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(unique_id.value() as i32)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        record.map(User::try_from).transpose()
    }

    async fn unique_id_exists(&self, unique_id: UniqueId) -> Result<bool, RepositoryError> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM users WHERE unique_id = $1)")
            .bind(unique_id.value() as i32)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_err)
    }

    async fn list_all(&self) -> Result<Vec<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC");
        let records = sqlx::query_as::<_, UserRecord>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        records.into_iter().map(User::try_from).collect()
    }

    async fn list_online(&self) -> Result<Vec<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE is_online ORDER BY username");
        let records = sqlx::query_as::<_, UserRecord>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        records.into_iter().map(User::try_from).collect()
    }

    async fn settings(&self, id: UserId) -> Result<Option<UserSettings>, RepositoryError> {
        let record = sqlx::query_as::<_, SettingsRecord>(
            r#"SELECT theme, notifications, sound_effects, font_size, auto_login
               FROM user_settings WHERE user_id = $1"#,
        )
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        record.map(UserSettings::try_from).transpose()
    }

    async fn save_settings(
        &self,
        id: UserId,
        settings: UserSettings,
    ) -> Result<UserSettings, RepositoryError> {
        let record = sqlx::query_as::<_, SettingsRecord>(
            r#"
            INSERT INTO user_settings (user_id, theme, notifications, sound_effects, font_size, auto_login)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id) DO UPDATE SET
                theme = EXCLUDED.theme,
                notifications = EXCLUDED.notifications,
                sound_effects = EXCLUDED.sound_effects,
                font_size = EXCLUDED.font_size,
                auto_login = EXCLUDED.auto_login
            RETURNING theme, notifications, sound_effects, font_size, auto_login
            "#,
        )
        .bind(Uuid::from(id))
        .bind(settings.theme.as_str())
        .bind(settings.notifications)
        .bind(settings.sound_effects)
        .bind(i16::from(settings.font_size))
        .bind(settings.auto_login)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        UserSettings::try_from(record)
    }
}

#[derive(Debug, FromRow)]
struct RoomRecord {
    name: String,
    description: String,
    allowed_roles: Vec<String>,
    is_active: bool,
    created_by: String,
    created_at: OffsetDateTime,
}

impl TryFrom<RoomRecord> for Room {
    type Error = RepositoryError;

    fn try_from(value: RoomRecord) -> Result<Self, Self::Error> {
        let name = RoomName::parse(value.name).map_err(|err| invalid_data(err.to_string()))?;
        let roles = value
            .allowed_roles
            .iter()
            .map(|role| role.parse::<Role>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| invalid_data(err.to_string()))?;

        let mut room = Room::new(name, value.description, roles, value.created_by, value.created_at);
        room.is_active = value.is_active;
        Ok(room)
    }
}

fn role_names(room: &Room) -> Vec<String> {
    room.allowed_roles
        .iter()
        .map(|role| role.as_str().to_owned())
        .collect()
}

#[derive(Clone)]
pub struct PgRoomRepository {
    pool: PgPool,
}

impl PgRoomRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoomRepository for PgRoomRepository {
    async fn insert_if_absent(&self, room: Room) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            INSERT INTO rooms (name, description, allowed_roles, is_active, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(room.name.as_str())
        .bind(&room.description)
        .bind(role_names(&room))
        .bind(room.is_active)
        .bind(&room.created_by)
        .bind(room.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn create(&self, room: Room) -> Result<Room, RepositoryError> {
        let record = sqlx::query_as::<_, RoomRecord>(
            r#"
            INSERT INTO rooms (name, description, allowed_roles, is_active, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING name, description, allowed_roles, is_active, created_by, created_at
            "#,
        )
        .bind(room.name.as_str())
        .bind(&room.description)
        .bind(role_names(&room))
        .bind(room.is_active)
        .bind(&room.created_by)
        .bind(room.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Room::try_from(record)
    }

    async fn find_by_name(&self, name: &RoomName) -> Result<Option<Room>, RepositoryError> {
        let record = sqlx::query_as::<_, RoomRecord>(
            r#"SELECT name, description, allowed_roles, is_active, created_by, created_at
               FROM rooms WHERE name = $1"#,
        )
        .bind(name.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        record.map(Room::try_from).transpose()
    }

    async fn list_active(&self) -> Result<Vec<Room>, RepositoryError> {
        let records = sqlx::query_as::<_, RoomRecord>(
            r#"SELECT name, description, allowed_roles, is_active, created_by, created_at
               FROM rooms WHERE is_active ORDER BY seq"#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        records.into_iter().map(Room::try_from).collect()
    }
}

const MESSAGE_COLUMNS: &str =
    "id, room, author, body, kind, attachment, created_at, edited_at, reply_to";

#[derive(Debug, FromRow)]
struct MessageRecord {
    id: i64,
    room: String,
    author: String,
    body: Option<String>,
    kind: String,
    attachment: Option<String>,
    created_at: OffsetDateTime,
    edited_at: Option<OffsetDateTime>,
    reply_to: Option<i64>,
}

impl TryFrom<MessageRecord> for Message {
    type Error = RepositoryError;

    fn try_from(value: MessageRecord) -> Result<Self, Self::Error> {
        let kind: MessageKind = value
            .kind
            .parse()
            .map_err(|err: domain::DomainError| invalid_data(err.to_string()))?;
        Ok(Message {
            id: MessageId(value.id),
            room: RoomName::parse(value.room).map_err(|err| invalid_data(err.to_string()))?,
            author: Username::parse(value.author).map_err(|err| invalid_data(err.to_string()))?,
            body: value.body,
            kind,
            attachment: value
                .attachment
                .map(AttachmentRef::parse)
                .transpose()
                .map_err(|err| invalid_data(err.to_string()))?,
            created_at: value.created_at,
            edited_at: value.edited_at,
            reply_to: value.reply_to.map(MessageId),
        })
    }
}

fn collect_messages(records: Vec<MessageRecord>) -> Result<Vec<Message>, RepositoryError> {
    records.into_iter().map(Message::try_from).collect()
}

#[derive(Clone)]
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn insert(&self, draft: MessageDraft) -> Result<Message, RepositoryError> {
        let sql = format!(
            "INSERT INTO messages (room, author, body, kind, attachment, created_at, reply_to) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {MESSAGE_COLUMNS}"
        );
        let record = sqlx::query_as::<_, MessageRecord>(&sql)
            .bind(draft.room.as_str())
            .bind(draft.author.as_str())
            .bind(draft.body.as_deref())
            .bind(draft.kind.as_str())
            .bind(draft.attachment.as_ref().map(|reference| reference.as_str()))
            .bind(draft.created_at)
            .bind(draft.reply_to.map(i64::from))
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Message::try_from(record)
    }

    async fn find_by_id(&self, id: MessageId) -> Result<Option<Message>, RepositoryError> {
        let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = $1");
        let record = sqlx::query_as::<_, MessageRecord>(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        record.map(Message::try_from).transpose()
    }

    async fn find_by_ids(&self, ids: Vec<MessageId>) -> Result<Vec<Message>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let raw: Vec<i64> = ids.into_iter().map(i64::from).collect();
        let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ANY($1)");
        let records = sqlx::query_as::<_, MessageRecord>(&sql)
            .bind(raw)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        collect_messages(records)
    }

    async fn find_by_attachment(
        &self,
        attachment: &AttachmentRef,
    ) -> Result<Option<Message>, RepositoryError> {
        let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE attachment = $1 LIMIT 1");
        let record = sqlx::query_as::<_, MessageRecord>(&sql)
            .bind(attachment.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        record.map(Message::try_from).transpose()
    }

    async fn update(&self, message: Message) -> Result<Message, RepositoryError> {
        let sql = format!(
            "UPDATE messages SET body = $2, edited_at = $3 WHERE id = $1 RETURNING {MESSAGE_COLUMNS}"
        );
        let record = sqlx::query_as::<_, MessageRecord>(&sql)
            .bind(message.id.0)
            .bind(message.body.as_deref())
            .bind(message.edited_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)?
            .ok_or(RepositoryError::NotFound)?;
        Message::try_from(record)
    }

    async fn delete(&self, id: MessageId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM messages WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        if result.rows_affected() == 0 {
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
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE room = $1 \
             ORDER BY id DESC LIMIT $2 OFFSET $3"
        );
        let records = sqlx::query_as::<_, MessageRecord>(&sql)
            .bind(room.as_str())
            .bind(i64::from(limit))
            .bind(i64::from(offset))
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        collect_messages(records)
    }

    async fn search(&self, room: &RoomName, needle: &str) -> Result<Vec<Message>, RepositoryError> {
        // strpos 区分大小写，且不需要转义 LIKE 通配符
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages \
             WHERE room = $1 AND body IS NOT NULL AND strpos(body, $2) > 0 \
             ORDER BY id DESC"
        );
        let records = sqlx::query_as::<_, MessageRecord>(&sql)
            .bind(room.as_str())
            .bind(needle)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        collect_messages(records)
    }
}

#[derive(Debug, FromRow)]
struct SessionRow {
    token: String,
    user_id: Uuid,
    created_at: OffsetDateTime,
    expires_at: OffsetDateTime,
    remember_me: bool,
}

impl From<SessionRow> for SessionRecord {
    fn from(value: SessionRow) -> Self {
        SessionRecord {
            token: value.token,
            user_id: UserId::from(value.user_id),
            created_at: value.created_at,
            expires_at: value.expires_at,
            remember_me: value.remember_me,
        }
    }
}

#[derive(Clone)]
pub struct PgSessionRepository {
    pool: PgPool,
}

impl PgSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for PgSessionRepository {
    async fn create(&self, session: SessionRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO sessions (token, user_id, created_at, expires_at, remember_me)
               VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(&session.token)
        .bind(Uuid::from(session.user_id))
        .bind(session.created_at)
        .bind(session.expires_at)
        .bind(session.remember_me)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn find(&self, token: &str) -> Result<Option<SessionRecord>, RepositoryError> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"SELECT token, user_id, created_at, expires_at, remember_me FROM sessions WHERE token = $1"#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(row.map(SessionRecord::from))
    }

    async fn delete(&self, token: &str) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn delete_expired(&self, now: Timestamp) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(result.rows_affected())
    }
}

#[derive(Clone)]
pub struct PgStorage {
    pub pool: PgPool,
    pub user_repository: Arc<PgUserRepository>,
    pub room_repository: Arc<PgRoomRepository>,
    pub message_repository: Arc<PgMessageRepository>,
    pub session_repository: Arc<PgSessionRepository>,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self {
            user_repository: Arc::new(PgUserRepository::new(pool.clone())),
            room_repository: Arc::new(PgRoomRepository::new(pool.clone())),
            message_repository: Arc::new(PgMessageRepository::new(pool.clone())),
            session_repository: Arc::new(PgSessionRepository::new(pool.clone())),
            pool,
        }
    }
}

pub async fn create_pg_pool(
    database_url: &str,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}
