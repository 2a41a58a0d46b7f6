use domain::{Message, MessageKind, ReplyPreview, Role, Room, Timestamp, User, UserSettings};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDto {
    pub id: Uuid,
    pub username: String,
    pub email: Option<String>,
    pub role: Role,
    pub unique_id: u32,
    pub approved: bool,
    pub banned: bool,
    pub ban_reason: Option<String>,
    pub is_online: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_login: Option<Timestamp>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: Timestamp,
}

impl From<&User> for UserDto {
    fn from(user: &User) -> Self {
        Self {
            id: Uuid::from(user.id),
            username: user.username.as_str().to_owned(),
            email: user.email.as_ref().map(|email| email.as_str().to_owned()),
            role: user.role,
            unique_id: user.unique_id.value(),
            approved: user.approved,
            banned: user.is_banned(),
            ban_reason: user.ban_reason().map(str::to_owned),
            is_online: user.is_online,
            last_login: user.last_login,
            created_at: user.created_at,
        }
    }
}

/// 在线用户列表只暴露最少信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnlineUserDto {
    pub username: String,
    pub role: Role,
}

impl From<&User> for OnlineUserDto {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.as_str().to_owned(),
            role: user.role,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomDto {
    pub name: String,
    pub description: String,
    pub allowed_roles: Vec<Role>,
    pub is_active: bool,
    pub created_by: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: Timestamp,
}

impl From<&Room> for RoomDto {
    fn from(room: &Room) -> Self {
        Self {
            name: room.name.as_str().to_owned(),
            description: room.description.clone(),
            allowed_roles: room.allowed_roles.iter().copied().collect(),
            is_active: room.is_active,
            created_by: room.created_by.clone(),
            created_at: room.created_at,
        }
    }
}

/// 对外返回的消息，附带读取时解析出的回复预览。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageView {
    pub id: i64,
    pub room: String,
    pub author: String,
    pub body: Option<String>,
    pub kind: MessageKind,
    pub attachment: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: Timestamp,
    pub is_edited: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub edited_at: Option<Timestamp>,
    pub reply_to: Option<i64>,
    pub reply_author: Option<String>,
    pub reply_preview: Option<String>,
}

impl MessageView {
    pub fn new(message: &Message, reply: Option<&ReplyPreview>) -> Self {
        Self {
            id: message.id.0,
            room: message.room.as_str().to_owned(),
            author: message.author.as_str().to_owned(),
            body: message.body.clone(),
            kind: message.kind,
            attachment: message
                .attachment
                .as_ref()
                .map(|reference| reference.as_str().to_owned()),
            created_at: message.created_at,
            is_edited: message.is_edited(),
            edited_at: message.edited_at,
            reply_to: message.reply_to.map(|id| id.0),
            reply_author: reply.map(|preview| preview.author.as_str().to_owned()),
            reply_preview: reply.map(|preview| preview.snippet.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsDto {
    pub theme: domain::Theme,
    pub notifications: bool,
    pub sound_effects: bool,
    pub font_size: u8,
    pub auto_login: bool,
}

impl From<UserSettings> for SettingsDto {
    fn from(value: UserSettings) -> Self {
        Self {
            theme: value.theme,
            notifications: value.notifications,
            sound_effects: value.sound_effects,
            font_size: value.font_size,
            auto_login: value.auto_login,
        }
    }
}

impl From<SettingsDto> for UserSettings {
    fn from(value: SettingsDto) -> Self {
        Self {
            theme: value.theme,
            notifications: value.notifications,
            sound_effects: value.sound_effects,
            font_size: value.font_size,
            auto_login: value.auto_login,
        }
    }
}
