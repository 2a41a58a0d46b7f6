//! 服务单元测试共用的构造函数

use std::sync::Arc;

use domain::{
    Actor, Message, MessageDraft, MessageId, MessageKind, PasswordHash, Role, Room, RoomName,
    UniqueId, User, UserId, Username,
};
use time::macros::datetime;
use uuid::Uuid;

use crate::{clock::ManualClock, password::MockPasswordHasher, session::SessionContext};

pub(crate) fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(datetime!(2024-05-06 09:30 UTC)))
}

pub(crate) fn user(name: &str, role: Role, approved: bool) -> User {
    let mut user = User::register(
        UserId::from(Uuid::new_v4()),
        Username::parse(name).unwrap(),
        PasswordHash::new(format!("hashed:{name}-pass")).unwrap(),
        None,
        role,
        UniqueId::new(1_234_567).unwrap(),
        datetime!(2024-05-01 00:00 UTC),
    );
    user.set_approval(approved);
    user
}

pub(crate) fn ctx(user: &User) -> SessionContext {
    SessionContext {
        session_id: "token".into(),
        actor: Actor {
            user_id: user.id,
            username: user.username.clone(),
            role: user.role,
        },
        unique_id: user.unique_id,
        approved: user.approved,
        banned: user.is_banned(),
    }
}

pub(crate) fn room(name: &str, roles: &[Role]) -> Room {
    Room::new(
        RoomName::parse(name).unwrap(),
        "test room",
        roles.iter().copied(),
        "system",
        datetime!(2024-01-01 00:00 UTC),
    )
}

pub(crate) fn message(id: i64, room: &str, author: &str, kind: MessageKind, body: Option<&str>) -> Message {
    Message::from_draft(
        MessageId(id),
        MessageDraft {
            room: RoomName::parse(room).unwrap(),
            author: Username::parse(author).unwrap(),
            body: body.map(str::to_owned),
            kind,
            attachment: None,
            reply_to: None,
            created_at: datetime!(2024-05-06 09:00 UTC),
        },
    )
}

/// `hashed:<明文>` 形式的假哈希器
pub(crate) fn fake_hasher() -> MockPasswordHasher {
    let mut hasher = MockPasswordHasher::new();
    hasher
        .expect_hash()
        .returning(|plain| Ok(PasswordHash::new(format!("hashed:{plain}")).unwrap()));
    hasher
        .expect_verify()
        .returning(|plain, hashed| Ok(hashed.as_str() == format!("hashed:{plain}")));
    hasher
}
