use std::sync::{Arc, Mutex};

use application::{
    Clock, CreateRoomRequest, JoinRoomRequest, MemoryLocationHistoryRepository,
    MemoryParticipantRepository, MemoryRoomRepository, PasswordHasher, PasswordHasherError,
    RoomPolicy, RoomRepository, RoomService, RoomServiceDependencies,
};
use chrono::{Duration, TimeZone, Utc};
use domain::{PasswordHash, RepositoryError, Room, RoomId, RoomName, Timestamp};

/// 测试基准时刻
pub fn base_time() -> Timestamp {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

/// 手动推进的测试时钟
pub struct ManualClock {
    now: Mutex<Timestamp>,
}

impl ManualClock {
    pub fn starting_at(now: Timestamp) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(now),
        })
    }

    pub fn advance(&self, delta: Duration) {
        let mut now = self.now.lock().unwrap();
        *now = *now + delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock().unwrap()
    }
}

/// 测试用哈希器：确定性前缀拼接，换取速度与可预测
pub struct StubPasswordHasher;

#[async_trait::async_trait]
impl PasswordHasher for StubPasswordHasher {
    async fn hash(&self, plaintext: &str) -> Result<PasswordHash, PasswordHasherError> {
        PasswordHash::new(format!("stub${plaintext}"))
            .map_err(|err| PasswordHasherError::hash_error(err.to_string()))
    }

    async fn verify(
        &self,
        plaintext: &str,
        hashed: &PasswordHash,
    ) -> Result<bool, PasswordHasherError> {
        Ok(hashed.as_str() == format!("stub${plaintext}"))
    }
}

/// 始终失败的房间存储，模拟底层存储故障
pub struct FailingRoomRepository;

#[async_trait::async_trait]
impl RoomRepository for FailingRoomRepository {
    async fn create(&self, _room: Room) -> Result<Room, RepositoryError> {
        Err(RepositoryError::storage("disk offline"))
    }

    async fn find_by_id(&self, _id: RoomId) -> Result<Option<Room>, RepositoryError> {
        Err(RepositoryError::storage("disk offline"))
    }

    async fn find_by_name(&self, _name: &RoomName) -> Result<Option<Room>, RepositoryError> {
        Err(RepositoryError::storage("disk offline"))
    }

    async fn list_live(&self, _now: Timestamp) -> Result<Vec<Room>, RepositoryError> {
        Err(RepositoryError::storage("disk offline"))
    }

    async fn find_expired(&self, _now: Timestamp) -> Result<Vec<RoomId>, RepositoryError> {
        Err(RepositoryError::storage("disk offline"))
    }

    async fn delete(&self, _id: RoomId) -> Result<(), RepositoryError> {
        Err(RepositoryError::storage("disk offline"))
    }
}

/// 测试辅助结构：内存存储上组好的房间服务
pub struct TestServices {
    pub service: Arc<RoomService>,
    pub clock: Arc<ManualClock>,
    pub rooms: Arc<MemoryRoomRepository>,
    pub participants: Arc<MemoryParticipantRepository>,
    pub history: Arc<MemoryLocationHistoryRepository>,
}

impl TestServices {
    pub fn new() -> Self {
        Self::with_policy(RoomPolicy::default())
    }

    pub fn with_policy(policy: RoomPolicy) -> Self {
        let clock = ManualClock::starting_at(base_time());
        let rooms = Arc::new(MemoryRoomRepository::new());
        let participants = Arc::new(MemoryParticipantRepository::new());
        let history = Arc::new(MemoryLocationHistoryRepository::new());

        let deps = RoomServiceDependencies {
            room_repository: rooms.clone(),
            participant_repository: participants.clone(),
            history_repository: history.clone(),
            password_hasher: Arc::new(StubPasswordHasher),
            clock: clock.clone(),
        };

        Self {
            service: Arc::new(RoomService::with_policy(deps, policy)),
            clock,
            rooms,
            participants,
            history,
        }
    }
}

pub fn create_request(name: &str, password: &str, creator: &str, minutes: u32) -> CreateRoomRequest {
    CreateRoomRequest {
        name: name.to_string(),
        password: password.to_string(),
        creator_name: creator.to_string(),
        duration_minutes: minutes,
        latitude: Some(37.5),
        longitude: Some(127.0),
        accuracy: None,
    }
}

pub fn join_request(room: &str, password: &str, participant: &str) -> JoinRoomRequest {
    JoinRoomRequest {
        room_name: room.to_string(),
        password: password.to_string(),
        participant_name: participant.to_string(),
        latitude: 37.5,
        longitude: 127.0,
        accuracy: None,
    }
}
