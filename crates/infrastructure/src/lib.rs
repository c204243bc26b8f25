//! 基础设施层实现。
//!
//! 提供 SQLite 仓储与 bcrypt 密码哈希适配器，实现应用层定义的接口。

pub mod builder;
pub mod password;
pub mod repository;

pub use builder::{Infrastructure, InfrastructureConfig, InfrastructureError};
pub use password::BcryptPasswordHasher;
pub use repository::{
    apply_schema, create_sqlite_pool, SqliteLocationHistoryRepository,
    SqliteParticipantRepository, SqliteRoomRepository, SqliteStorage,
};
