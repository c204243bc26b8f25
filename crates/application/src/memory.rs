//! 内存仓储实现
//!
//! 用于测试和单进程部署，不依赖外部存储

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use domain::{
    LocationSample, Participant, ParticipantId, ParticipantName, Position, RepositoryError, Room,
    RoomId, RoomName, Timestamp, LOCATION_HISTORY_LIMIT,
};
use tokio::sync::RwLock;

use crate::repository::{LocationHistoryRepository, ParticipantRepository, RoomRepository};

/// 内存中的房间存储
pub struct MemoryRoomRepository {
    /// 按创建先后保存，created_at 相同的房间按插入顺序排序
    rooms: Arc<RwLock<Vec<Room>>>,
}

impl Default for MemoryRoomRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRoomRepository {
    pub fn new() -> Self {
        Self {
            rooms: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

#[async_trait]
impl RoomRepository for MemoryRoomRepository {
    async fn create(&self, room: Room) -> Result<Room, RepositoryError> {
        let mut rooms = self.rooms.write().await;
        if rooms.iter().any(|existing| existing.name == room.name) {
            return Err(RepositoryError::conflict(format!(
                "room name already taken: {}",
                room.name
            )));
        }
        rooms.push(room.clone());
        Ok(room)
    }

    async fn find_by_id(&self, id: RoomId) -> Result<Option<Room>, RepositoryError> {
        let rooms = self.rooms.read().await;
        Ok(rooms.iter().find(|room| room.id == id).cloned())
    }

    async fn find_by_name(&self, name: &RoomName) -> Result<Option<Room>, RepositoryError> {
        let rooms = self.rooms.read().await;
        Ok(rooms.iter().find(|room| &room.name == name).cloned())
    }

    async fn list_live(&self, now: Timestamp) -> Result<Vec<Room>, RepositoryError> {
        let rooms = self.rooms.read().await;
        let mut live: Vec<Room> = rooms
            .iter()
            .filter(|room| room.is_live(now))
            .cloned()
            .collect();
        // 稳定排序，created_at 相同时保持插入顺序
        live.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(live)
    }

    async fn find_expired(&self, now: Timestamp) -> Result<Vec<RoomId>, RepositoryError> {
        let rooms = self.rooms.read().await;
        Ok(rooms
            .iter()
            .filter(|room| room.is_expired(now))
            .map(|room| room.id)
            .collect())
    }

    async fn delete(&self, id: RoomId) -> Result<(), RepositoryError> {
        let mut rooms = self.rooms.write().await;
        rooms.retain(|room| room.id != id);
        Ok(())
    }
}

/// 内存中的参与者存储
pub struct MemoryParticipantRepository {
    /// 插入顺序即加入顺序
    participants: Arc<RwLock<Vec<Participant>>>,
}

impl Default for MemoryParticipantRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryParticipantRepository {
    pub fn new() -> Self {
        Self {
            participants: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

#[async_trait]
impl ParticipantRepository for MemoryParticipantRepository {
    async fn add(&self, participant: Participant) -> Result<Participant, RepositoryError> {
        let mut participants = self.participants.write().await;
        let taken = participants
            .iter()
            .any(|existing| existing.room_id == participant.room_id && existing.name == participant.name);
        if taken {
            return Err(RepositoryError::conflict(format!(
                "participant name already taken in room: {}",
                participant.name
            )));
        }
        participants.push(participant.clone());
        Ok(participant)
    }

    async fn find_by_name(
        &self,
        room_id: RoomId,
        name: &ParticipantName,
    ) -> Result<Option<Participant>, RepositoryError> {
        let participants = self.participants.read().await;
        Ok(participants
            .iter()
            .find(|participant| participant.room_id == room_id && &participant.name == name)
            .cloned())
    }

    async fn list_by_room(&self, room_id: RoomId) -> Result<Vec<Participant>, RepositoryError> {
        let participants = self.participants.read().await;
        Ok(participants
            .iter()
            .filter(|participant| participant.room_id == room_id)
            .cloned()
            .collect())
    }

    async fn update_position(
        &self,
        id: ParticipantId,
        position: Position,
    ) -> Result<Participant, RepositoryError> {
        let mut participants = self.participants.write().await;
        let participant = participants
            .iter_mut()
            .find(|participant| participant.id == id)
            .ok_or(RepositoryError::NotFound)?;
        participant.move_to(position);
        Ok(participant.clone())
    }

    async fn remove(&self, id: ParticipantId) -> Result<(), RepositoryError> {
        let mut participants = self.participants.write().await;
        participants.retain(|participant| participant.id != id);
        Ok(())
    }

    async fn ids_for_rooms(
        &self,
        room_ids: &[RoomId],
    ) -> Result<Vec<ParticipantId>, RepositoryError> {
        let participants = self.participants.read().await;
        Ok(participants
            .iter()
            .filter(|participant| room_ids.contains(&participant.room_id))
            .map(|participant| participant.id)
            .collect())
    }

    async fn remove_all_for_rooms(&self, room_ids: &[RoomId]) -> Result<u64, RepositoryError> {
        let mut participants = self.participants.write().await;
        let before = participants.len();
        participants.retain(|participant| !room_ids.contains(&participant.room_id));
        Ok((before - participants.len()) as u64)
    }
}

/// 内存中的轨迹存储
pub struct MemoryLocationHistoryRepository {
    /// 参与者ID -> 采样队列，队首为最新
    samples: Arc<RwLock<HashMap<ParticipantId, VecDeque<LocationSample>>>>,
}

impl Default for MemoryLocationHistoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLocationHistoryRepository {
    pub fn new() -> Self {
        Self {
            samples: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl LocationHistoryRepository for MemoryLocationHistoryRepository {
    async fn append(&self, sample: LocationSample) -> Result<(), RepositoryError> {
        let mut samples = self.samples.write().await;
        let trail = samples
            .entry(sample.participant_id)
            .or_insert_with(VecDeque::new);
        trail.push_front(sample);
        trail.truncate(LOCATION_HISTORY_LIMIT);
        Ok(())
    }

    async fn recent(
        &self,
        participant_id: ParticipantId,
    ) -> Result<Vec<LocationSample>, RepositoryError> {
        let samples = self.samples.read().await;
        Ok(samples
            .get(&participant_id)
            .map(|trail| trail.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn remove_all_for_participants(
        &self,
        participant_ids: &[ParticipantId],
    ) -> Result<u64, RepositoryError> {
        let mut samples = self.samples.write().await;
        let mut removed = 0u64;
        for participant_id in participant_ids {
            if let Some(trail) = samples.remove(participant_id) {
                removed += trail.len() as u64;
            }
        }
        Ok(removed)
    }
}
