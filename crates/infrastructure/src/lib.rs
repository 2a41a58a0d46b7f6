//! 基础设施层实现。
//!
//! 提供 PostgreSQL 与内存两套仓储、bcrypt 密码哈希、磁盘附件存储，
//! 实现应用层定义的端口。

pub mod builder;
pub mod disk;
pub mod memory;
pub mod migrations;
pub mod password;
pub mod repository;

pub use builder::{Infrastructure, InfrastructureConfig, InfrastructureError};
pub use disk::DiskAttachmentStorage;
pub use memory::{
    InMemoryMessageRepository, InMemoryRoomRepository, InMemorySessionRepository, InMemoryStorage,
    InMemoryUserRepository,
};
pub use migrations::MIGRATOR;
pub use password::BcryptPasswordHasher;
pub use repository::{
    create_pg_pool, PgMessageRepository, PgRoomRepository, PgSessionRepository, PgStorage,
    PgUserRepository,
};
