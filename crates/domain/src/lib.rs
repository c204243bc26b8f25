//! 位置共享房间的核心领域模型。
//!
//! 包含房间、参与者、位置轨迹等实体与值对象，以及相关的校验规则。

pub mod errors;
pub mod location_history;
pub mod participant;
pub mod repository;
pub mod room;
pub mod value_objects;

pub use errors::{DomainError, DomainResult};
pub use location_history::{LocationSample, LOCATION_HISTORY_LIMIT};
pub use participant::Participant;
pub use repository::{RepositoryError, RepositoryResult};
pub use room::Room;
pub use value_objects::{
    ParticipantId, ParticipantName, PasswordHash, Position, RoomDuration, RoomId, RoomName,
    Timestamp,
};
