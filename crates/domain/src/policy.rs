//! 访问策略：纯函数，无副作用。
//!
//! 布尔形式（`can_*`）用于展示层判断按钮是否可用，
//! `authorize_*` 形式返回具体的拒绝原因，供用例服务转换为错误。

use serde::{Deserialize, Serialize};

use crate::message::{Message, MessageKind};
use crate::room::Room;
use crate::user::Role;
use crate::value_objects::{UserId, Username};

/// 发起操作的用户
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub username: Username,
    pub role: Role,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_author_of(&self, message: &Message) -> bool {
        message.author == self.username
    }
}

/// 策略拒绝原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    AccessDenied,
    NotEditableKind,
    NotAuthor,
    NotAuthorized,
}

/// 房间必须处于启用状态；管理员无视白名单。
pub fn can_enter_room(role: Role, room: &Room) -> bool {
    room.is_active && (role == Role::Admin || room.lists(role))
}

pub fn can_edit_message(actor: &Actor, message: &Message, room: &Room) -> bool {
    authorize_edit(actor, message, room).is_ok()
}

pub fn can_delete_message(actor: &Actor, message: &Message, room: &Room) -> bool {
    authorize_delete(actor, message, room).is_ok()
}

pub fn authorize_enter(role: Role, room: &Room) -> Result<(), Denial> {
    if can_enter_room(role, room) {
        Ok(())
    } else {
        Err(Denial::AccessDenied)
    }
}

/// 编辑检查顺序：类型、作者、房间权限。非文本消息对任何人都不可编辑。
pub fn authorize_edit(actor: &Actor, message: &Message, room: &Room) -> Result<(), Denial> {
    if message.kind != MessageKind::Text {
        return Err(Denial::NotEditableKind);
    }
    if !actor.is_author_of(message) {
        return Err(Denial::NotAuthor);
    }
    authorize_enter(actor.role, room)
}

/// 删除检查顺序：作者或管理员、房间权限。
pub fn authorize_delete(actor: &Actor, message: &Message, room: &Room) -> Result<(), Denial> {
    if !actor.is_author_of(message) && !actor.is_admin() {
        return Err(Denial::NotAuthorized);
    }
    authorize_enter(actor.role, room)
}
