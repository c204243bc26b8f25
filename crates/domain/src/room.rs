use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::value_objects::{
    ParticipantName, PasswordHash, RoomDuration, RoomId, RoomName, Timestamp,
};

/// 限时位置共享房间。创建后不再变更，到期由清扫统一删除。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub name: RoomName,
    #[serde(skip_serializing)] // 房间密码哈希不暴露给客户端
    pub password: PasswordHash,
    pub creator: ParticipantName,
    pub duration: RoomDuration,
    pub created_at: Timestamp,
}

impl Room {
    pub fn new(
        id: RoomId,
        name: RoomName,
        password: PasswordHash,
        creator: ParticipantName,
        duration: RoomDuration,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            name,
            password,
            creator,
            duration,
            created_at,
        }
    }

    pub fn expires_at(&self) -> Timestamp {
        self.created_at + Duration::minutes(i64::from(self.duration.minutes()))
    }

    /// 到期判定取非严格边界：now 恰好等于到期时刻即视为过期。
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at()
    }

    pub fn is_live(&self, now: Timestamp) -> bool {
        !self.is_expired(now)
    }
}
