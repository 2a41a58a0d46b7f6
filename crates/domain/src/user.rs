use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::value_objects::{PasswordHash, Timestamp, UniqueId, UserEmail, UserId, Username};

/// 用户角色。角色之间没有继承关系，只有管理员拥有全局放行权。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
    Parent,
    Admin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Student, Role::Teacher, Role::Parent, Role::Admin];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::Parent => "parent",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "teacher" => Ok(Role::Teacher),
            "parent" => Ok(Role::Parent),
            "admin" => Ok(Role::Admin),
            other => Err(DomainError::UnknownRole(other.to_owned())),
        }
    }
}

/// 封禁记录：原因、时间与执行封禁的管理员。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanRecord {
    pub reason: String,
    #[serde(with = "time::serde::rfc3339")]
    pub banned_at: Timestamp,
    pub banned_by: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: Username,
    #[serde(skip)] // 密码哈希不暴露给客户端
    pub password: Option<PasswordHash>,
    pub email: Option<UserEmail>,
    pub role: Role,
    pub unique_id: UniqueId,
    pub approved: bool,
    pub ban: Option<BanRecord>,
    pub is_online: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_login: Option<Timestamp>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: Timestamp,
}

impl User {
    /// 自助注册：默认未审批
    pub fn register(
        id: UserId,
        username: Username,
        password: PasswordHash,
        email: Option<UserEmail>,
        role: Role,
        unique_id: UniqueId,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            username,
            password: Some(password),
            email,
            role,
            unique_id,
            approved: false,
            ban: None,
            is_online: false,
            last_login: None,
            created_at: now,
        }
    }

    /// 启动时由配置预置的管理员账号，直接视为已审批
    pub fn bootstrap_admin(
        id: UserId,
        username: Username,
        password: PasswordHash,
        email: Option<UserEmail>,
        unique_id: UniqueId,
        now: Timestamp,
    ) -> Self {
        let mut user = Self::register(id, username, password, email, Role::Admin, unique_id, now);
        user.approved = true;
        user
    }

    pub fn set_approval(&mut self, approved: bool) {
        self.approved = approved;
    }

    pub fn ban(&mut self, reason: impl Into<String>, banned_by: Option<UserId>, now: Timestamp) {
        self.ban = Some(BanRecord {
            reason: reason.into(),
            banned_at: now,
            banned_by,
        });
        self.is_online = false;
    }

    pub fn unban(&mut self) {
        self.ban = None;
    }

    pub fn is_banned(&self) -> bool {
        self.ban.is_some()
    }

    pub fn ban_reason(&self) -> Option<&str> {
        self.ban.as_ref().map(|record| record.reason.as_str())
    }

    /// 已审批且未被封禁
    pub fn is_active(&self) -> bool {
        self.approved && !self.is_banned()
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn mark_online(&mut self, now: Timestamp) {
        self.is_online = true;
        self.last_login = Some(now);
    }

    pub fn mark_offline(&mut self) {
        self.is_online = false;
    }

    pub fn set_password(&mut self, password: PasswordHash) {
        self.password = Some(password);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Auto,
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Auto => "auto",
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

impl FromStr for Theme {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "auto" => Ok(Theme::Auto),
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            _ => Err(DomainError::invalid_argument("theme", "expected auto, light or dark")),
        }
    }
}

/// 用户界面偏好，与用户一对一。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    pub theme: Theme,
    pub notifications: bool,
    pub sound_effects: bool,
    pub font_size: u8,
    pub auto_login: bool,
}

impl UserSettings {
    pub const MIN_FONT_SIZE: u8 = 10;
    pub const MAX_FONT_SIZE: u8 = 32;

    pub fn validate(&self) -> Result<(), DomainError> {
        if !(Self::MIN_FONT_SIZE..=Self::MAX_FONT_SIZE).contains(&self.font_size) {
            return Err(DomainError::invalid_argument(
                "font_size",
                format!(
                    "must be between {} and {}",
                    Self::MIN_FONT_SIZE,
                    Self::MAX_FONT_SIZE
                ),
            ));
        }
        Ok(())
    }
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            theme: Theme::Auto,
            notifications: true,
            sound_effects: true,
            font_size: 14,
            auto_login: false,
        }
    }
}
