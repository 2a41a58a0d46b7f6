mod identity_service;
mod message_service;
mod room_service;
mod session_gate;

#[cfg(test)]
mod test_support;

pub use identity_service::{
    AdminSeed, IdentityService, IdentityServiceDependencies, RegisterUserRequest, ResetTarget,
    DEFAULT_BAN_REASON, MAX_UNIQUE_ID_ATTEMPTS,
};
pub use message_service::{
    MessageService, MessageServiceDependencies, PostMessageRequest, Upload, DEFAULT_PAGE_LIMIT,
};
pub use room_service::{CreateRoomRequest, RoomService, RoomServiceDependencies};
pub use session_gate::{
    LoginOutcome, LoginRequest, SessionGate, SessionGateDependencies,
};
