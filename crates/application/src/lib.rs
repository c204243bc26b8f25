//! 应用层实现。
//!
//! 这里提供围绕领域模型的用例服务，处理输入校验、并发边界、
//! 以及对外部适配器（例如密码哈希、时钟、存储）的抽象。

pub mod clock;
pub mod error;
pub mod locks;
pub mod memory;
pub mod password;
pub mod repository;
pub mod services;

pub use clock::{Clock, SystemClock};
pub use error::ApplicationError;
pub use locks::RoomLockRegistry;
pub use memory::{
    MemoryLocationHistoryRepository, MemoryParticipantRepository, MemoryRoomRepository,
};
pub use password::{PasswordHasher, PasswordHasherError};
pub use repository::{LocationHistoryRepository, ParticipantRepository, RoomRepository};
pub use services::{
    CreateRoomRequest, CreatedRoom, JoinRoomRequest, JoinedRoom, LeaveRoomRequest,
    ParticipantWithTrail, RecordLocationRequest, RoomPolicy, RoomService, RoomServiceDependencies,
};
