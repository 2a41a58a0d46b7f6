use std::sync::Arc;

use domain::{policy, DomainError, Role, Room, RoomName};

use crate::{
    clock::Clock, error::ApplicationError, repository::RoomRepository, session::SessionContext,
};

#[derive(Debug, Clone)]
pub struct CreateRoomRequest {
    pub name: String,
    pub description: String,
    pub allowed_roles: Vec<Role>,
}

pub struct RoomServiceDependencies {
    pub room_repository: Arc<dyn RoomRepository>,
    pub clock: Arc<dyn Clock>,
}

pub struct RoomService {
    deps: RoomServiceDependencies,
}

impl RoomService {
    pub fn new(deps: RoomServiceDependencies) -> Self {
        Self { deps }
    }

    pub async fn list_active(&self) -> Result<Vec<Room>, ApplicationError> {
        Ok(self.deps.room_repository.list_active().await?)
    }

    /// 当前角色可进入的房间，保持注册顺序
    pub async fn list_accessible(&self, role: Role) -> Result<Vec<Room>, ApplicationError> {
        let rooms = self.deps.room_repository.list_active().await?;
        Ok(rooms
            .into_iter()
            .filter(|room| policy::can_enter_room(role, room))
            .collect())
    }

    pub async fn get(&self, name: &str) -> Result<Room, ApplicationError> {
        let name = RoomName::parse(name).map_err(|_| ApplicationError::RoomNotFound)?;
        self.deps
            .room_repository
            .find_by_name(&name)
            .await?
            .ok_or(ApplicationError::RoomNotFound)
    }

    /// 写入默认房间，已存在的保持不变
    pub async fn seed_defaults(&self) -> Result<usize, ApplicationError> {
        let mut inserted = 0;
        for room in Room::default_rooms(self.deps.clock.now()) {
            let name = room.name.clone();
            if self.deps.room_repository.insert_if_absent(room).await? {
                tracing::info!(room = %name, "default room created");
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    pub async fn create_room(
        &self,
        ctx: &SessionContext,
        request: CreateRoomRequest,
    ) -> Result<Room, ApplicationError> {
        ctx.require_admin()?;
        let name = RoomName::parse(request.name)?;
        if request.allowed_roles.is_empty() {
            return Err(DomainError::invalid_argument("allowed_roles", "cannot be empty").into());
        }

        let room = Room::new(
            name,
            request.description.trim(),
            request.allowed_roles,
            ctx.username().as_str(),
            self.deps.clock.now(),
        );
        let room = self.deps.room_repository.create(room).await?;
        tracing::info!(room = %room.name, admin = %ctx.username(), "room created");
        Ok(room)
    }
}
