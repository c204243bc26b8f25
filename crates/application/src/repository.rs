use async_trait::async_trait;
use domain::{
    LocationSample, Participant, ParticipantId, ParticipantName, Position, RepositoryResult, Room,
    RoomId, RoomName, Timestamp,
};

#[async_trait]
pub trait RoomRepository: Send + Sync {
    /// 名称在现存房间中唯一，冲突返回 `Conflict`。
    async fn create(&self, room: Room) -> RepositoryResult<Room>;
    async fn find_by_id(&self, id: RoomId) -> RepositoryResult<Option<Room>>;
    async fn find_by_name(&self, name: &RoomName) -> RepositoryResult<Option<Room>>;
    /// 未过期房间，按 created_at 倒序，创建时间相同时按插入顺序。
    async fn list_live(&self, now: Timestamp) -> RepositoryResult<Vec<Room>>;
    /// 已过期房间的 id 集合（expires_at <= now），只查不删。
    async fn find_expired(&self, now: Timestamp) -> RepositoryResult<Vec<RoomId>>;
    /// 删除单个房间，目标不存在时视为无事发生。
    async fn delete(&self, id: RoomId) -> RepositoryResult<()>;
}

#[async_trait]
pub trait ParticipantRepository: Send + Sync {
    /// 显示名在所属房间内唯一，冲突返回 `Conflict`。
    async fn add(&self, participant: Participant) -> RepositoryResult<Participant>;
    async fn find_by_name(
        &self,
        room_id: RoomId,
        name: &ParticipantName,
    ) -> RepositoryResult<Option<Participant>>;
    /// 按加入顺序返回。
    async fn list_by_room(&self, room_id: RoomId) -> RepositoryResult<Vec<Participant>>;
    async fn update_position(
        &self,
        id: ParticipantId,
        position: Position,
    ) -> RepositoryResult<Participant>;
    async fn remove(&self, id: ParticipantId) -> RepositoryResult<()>;
    async fn ids_for_rooms(
        &self,
        room_ids: &[RoomId],
    ) -> RepositoryResult<Vec<ParticipantId>>;
    async fn remove_all_for_rooms(&self, room_ids: &[RoomId]) -> RepositoryResult<u64>;
}

#[async_trait]
pub trait LocationHistoryRepository: Send + Sync {
    /// 追加采样，并把该参与者的轨迹裁剪到最近
    /// [`domain::LOCATION_HISTORY_LIMIT`] 条。
    async fn append(&self, sample: LocationSample) -> RepositoryResult<()>;
    /// 最新采样在前。
    async fn recent(
        &self,
        participant_id: ParticipantId,
    ) -> RepositoryResult<Vec<LocationSample>>;
    async fn remove_all_for_participants(
        &self,
        participant_ids: &[ParticipantId],
    ) -> RepositoryResult<u64>;
}
