use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::user::Role;
use crate::value_objects::{RoomName, Timestamp};

/// 系统预置房间的创建者标记
pub const SYSTEM_CREATOR: &str = "system";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub name: RoomName,
    pub description: String,
    pub allowed_roles: BTreeSet<Role>,
    pub is_active: bool,
    pub created_by: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: Timestamp,
}

impl Room {
    pub fn new(
        name: RoomName,
        description: impl Into<String>,
        allowed_roles: impl IntoIterator<Item = Role>,
        created_by: impl Into<String>,
        now: Timestamp,
    ) -> Self {
        Self {
            name,
            description: description.into(),
            allowed_roles: allowed_roles.into_iter().collect(),
            is_active: true,
            created_by: created_by.into(),
            created_at: now,
        }
    }

    /// 角色是否在白名单内。管理员的全局放行在 [`crate::policy`] 中处理。
    pub fn lists(&self, role: Role) -> bool {
        self.allowed_roles.contains(&role)
    }

    /// 系统初始化时写入的四个默认房间
    pub fn default_rooms(now: Timestamp) -> Vec<Room> {
        let defaults: [(&str, &str, &[Role]); 4] = [
            (
                "general",
                "General discussion room",
                &[Role::Student, Role::Teacher, Role::Parent, Role::Admin],
            ),
            (
                "teachers_students",
                "Teacher-Student discussions",
                &[Role::Teacher, Role::Student],
            ),
            (
                "parents_teachers",
                "Parent-Teacher discussions",
                &[Role::Parent, Role::Teacher],
            ),
            ("admin", "Administrative discussions", &[Role::Admin]),
        ];

        defaults
            .into_iter()
            .filter_map(|(name, description, roles)| {
                RoomName::parse(name).ok().map(|name| {
                    Room::new(name, description, roles.iter().copied(), SYSTEM_CREATOR, now)
                })
            })
            .collect()
    }
}
