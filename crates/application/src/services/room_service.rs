use std::sync::Arc;

use domain::{
    DomainError, LocationSample, Participant, ParticipantId, ParticipantName, Position,
    RepositoryError, Room, RoomDuration, RoomId, RoomName,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    clock::Clock,
    error::ApplicationError,
    locks::RoomLockRegistry,
    password::PasswordHasher,
    repository::{LocationHistoryRepository, ParticipantRepository, RoomRepository},
};

#[derive(Debug, Clone)]
pub struct CreateRoomRequest {
    pub name: String,
    pub password: String,
    pub creator_name: String,
    pub duration_minutes: u32,
    pub latitude: Option<f64>, // 自动入驻开启时必填
    pub longitude: Option<f64>,
    pub accuracy: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct JoinRoomRequest {
    pub room_name: String,
    pub password: String,
    pub participant_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct LeaveRoomRequest {
    pub room_id: Uuid,
    pub participant_name: String,
}

#[derive(Debug, Clone)]
pub struct RecordLocationRequest {
    pub room_id: Uuid,
    pub participant_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
}

/// 建房结果，自动入驻开启时附带创建者的参与者记录
#[derive(Debug, Clone, Serialize)]
pub struct CreatedRoom {
    pub room: Room,
    pub creator: Option<Participant>,
}

/// 加入结果
#[derive(Debug, Clone, Serialize)]
pub struct JoinedRoom {
    pub room: Room,
    pub participant: Participant,
}

/// 参与者及其最近轨迹（最新在前）
#[derive(Debug, Clone, Serialize)]
pub struct ParticipantWithTrail {
    pub participant: Participant,
    pub trail: Vec<LocationSample>,
}

/// 房间行为开关
#[derive(Debug, Clone)]
pub struct RoomPolicy {
    /// 建房时创建者自动成为首位参与者，此时建房请求必须携带初始位置
    pub auto_join_creator: bool,
}

impl Default for RoomPolicy {
    fn default() -> Self {
        Self {
            auto_join_creator: true,
        }
    }
}

pub struct RoomServiceDependencies {
    pub room_repository: Arc<dyn RoomRepository>,
    pub participant_repository: Arc<dyn ParticipantRepository>,
    pub history_repository: Arc<dyn LocationHistoryRepository>,
    pub password_hasher: Arc<dyn PasswordHasher>,
    pub clock: Arc<dyn Clock>,
}

/// 房间生命周期服务
///
/// 所有对外操作的唯一入口。每个操作先清扫过期房间，再在对应房间的
/// 临界区内完成自己的读写，因此调用方永远看不到过期房间。
pub struct RoomService {
    deps: RoomServiceDependencies,
    policy: RoomPolicy,
    locks: RoomLockRegistry,
}

impl RoomService {
    pub fn new(deps: RoomServiceDependencies) -> Self {
        Self::with_policy(deps, RoomPolicy::default())
    }

    pub fn with_policy(deps: RoomServiceDependencies, policy: RoomPolicy) -> Self {
        Self {
            deps,
            policy,
            locks: RoomLockRegistry::new(),
        }
    }

    /// 创建房间。
    ///
    /// 自动入驻开启时创建者随建房一并入驻，两步在同一房间临界区内完成，
    /// 保证创建者是首位参与者。
    pub async fn create_room(
        &self,
        request: CreateRoomRequest,
    ) -> Result<CreatedRoom, ApplicationError> {
        self.sweep_expired().await?;

        let name = RoomName::parse(request.name)?;
        let creator = ParticipantName::parse(request.creator_name)?;
        let duration = RoomDuration::new(request.duration_minutes)?;
        if request.password.is_empty() {
            return Err(DomainError::invalid_argument("password", "cannot be empty").into());
        }

        let creator_position = if self.policy.auto_join_creator {
            let latitude = request.latitude.ok_or_else(|| {
                DomainError::invalid_argument("latitude", "required to create a room")
            })?;
            let longitude = request.longitude.ok_or_else(|| {
                DomainError::invalid_argument("longitude", "required to create a room")
            })?;
            Some(Position::new(latitude, longitude, request.accuracy)?)
        } else {
            None
        };

        let hashed = self.deps.password_hasher.hash(&request.password).await?;
        let now = self.deps.clock.now();
        let room_id = RoomId::from(Uuid::new_v4());
        let room = Room::new(room_id, name, hashed, creator, duration, now);

        let lock = self.locks.for_room(room_id).await;
        let _guard = lock.lock().await;

        let room = match self.deps.room_repository.create(room).await {
            Ok(room) => room,
            Err(err) => {
                // 房间未建立，回收刚分配的锁条目
                self.locks.discard(room_id).await;
                return Err(match err {
                    RepositoryError::Conflict(_) => DomainError::DuplicateRoomName.into(),
                    other => other.into(),
                });
            }
        };

        let creator_participant = match creator_position {
            Some(position) => {
                let participant = Participant::new(
                    ParticipantId::from(Uuid::new_v4()),
                    room.id,
                    room.creator.clone(),
                    position,
                    now,
                );
                let participant = self.deps.participant_repository.add(participant).await?;
                self.deps
                    .history_repository
                    .append(LocationSample::new(participant.id, position, now))
                    .await?;
                Some(participant)
            }
            None => None,
        };

        tracing::info!(
            room_id = %room.id,
            name = %room.name,
            expires_at = %room.expires_at(),
            "房间已创建"
        );

        Ok(CreatedRoom {
            room,
            creator: creator_participant,
        })
    }

    /// 凭房间名和口令加入房间。
    ///
    /// 口令校验、重名检查与插入在同一房间临界区内作为一个整体执行，
    /// 其他加入请求无法插队到检查与写入之间。
    pub async fn join_room(&self, request: JoinRoomRequest) -> Result<JoinedRoom, ApplicationError> {
        self.sweep_expired().await?;

        let room_name = RoomName::parse(request.room_name)?;
        let participant_name = ParticipantName::parse(request.participant_name)?;
        let position = Position::new(request.latitude, request.longitude, request.accuracy)?;

        let room = self
            .deps
            .room_repository
            .find_by_name(&room_name)
            .await?
            .ok_or(DomainError::RoomNotFound)?;

        let room_id = room.id;
        let lock = self.locks.for_room(room_id).await;
        let guard = lock.lock().await;

        // 锁内重读：等锁期间房间可能已被清扫或到期
        let room = match self.deps.room_repository.find_by_id(room_id).await? {
            Some(room) => room,
            None => {
                // 房间已不在，回收刚登记的锁条目
                drop(guard);
                self.locks.discard(room_id).await;
                return Err(DomainError::RoomNotFound.into());
            }
        };
        if room.is_expired(self.deps.clock.now()) {
            return Err(DomainError::RoomNotFound.into());
        }

        let valid = self
            .deps
            .password_hasher
            .verify(&request.password, &room.password)
            .await?;
        if !valid {
            return Err(DomainError::BadCredential.into());
        }

        if self
            .deps
            .participant_repository
            .find_by_name(room.id, &participant_name)
            .await?
            .is_some()
        {
            return Err(DomainError::DuplicateParticipantName.into());
        }

        let now = self.deps.clock.now();
        let participant = Participant::new(
            ParticipantId::from(Uuid::new_v4()),
            room.id,
            participant_name,
            position,
            now,
        );
        let participant = match self.deps.participant_repository.add(participant).await {
            Ok(participant) => participant,
            Err(RepositoryError::Conflict(_)) => {
                return Err(DomainError::DuplicateParticipantName.into())
            }
            Err(err) => return Err(err.into()),
        };

        self.deps
            .history_repository
            .append(LocationSample::new(participant.id, position, now))
            .await?;

        tracing::info!(
            room_id = %room.id,
            participant_id = %participant.id,
            "参与者加入房间"
        );

        Ok(JoinedRoom { room, participant })
    }

    /// 离开房间。幂等：目标已不存在时按成功处理。
    pub async fn leave_room(&self, request: LeaveRoomRequest) -> Result<(), ApplicationError> {
        self.sweep_expired().await?;

        let room_id = RoomId::from(request.room_id);
        let participant_name = ParticipantName::parse(request.participant_name)?;

        let lock = self.locks.for_room(room_id).await;
        let guard = lock.lock().await;

        // 房间不存在时按幂等成功处理，顺手回收刚登记的锁条目
        if self
            .deps
            .room_repository
            .find_by_id(room_id)
            .await?
            .is_none()
        {
            drop(guard);
            self.locks.discard(room_id).await;
            return Ok(());
        }

        let participant = match self
            .deps
            .participant_repository
            .find_by_name(room_id, &participant_name)
            .await?
        {
            Some(participant) => participant,
            None => return Ok(()),
        };

        // 先子后父：轨迹先于参与者删除
        self.deps
            .history_repository
            .remove_all_for_participants(&[participant.id])
            .await?;
        self.deps
            .participant_repository
            .remove(participant.id)
            .await?;

        tracing::info!(
            room_id = %room_id,
            participant_id = %participant.id,
            "参与者离开房间"
        );

        Ok(())
    }

    /// 上报当前位置并追加轨迹。
    ///
    /// 房间或参与者已不存在时返回会话失效错误，绝不原地复活任何记录。
    pub async fn record_location(
        &self,
        request: RecordLocationRequest,
    ) -> Result<Participant, ApplicationError> {
        self.sweep_expired().await?;

        let room_id = RoomId::from(request.room_id);
        let participant_name = ParticipantName::parse(request.participant_name)?;
        let position = Position::new(request.latitude, request.longitude, request.accuracy)?;

        let lock = self.locks.for_room(room_id).await;
        let guard = lock.lock().await;

        let room = match self.deps.room_repository.find_by_id(room_id).await? {
            Some(room) => room,
            None => {
                drop(guard);
                self.locks.discard(room_id).await;
                return Err(DomainError::StaleSession.into());
            }
        };
        if room.is_expired(self.deps.clock.now()) {
            return Err(DomainError::StaleSession.into());
        }

        let participant = self
            .deps
            .participant_repository
            .find_by_name(room_id, &participant_name)
            .await?
            .ok_or(DomainError::StaleSession)?;

        let now = self.deps.clock.now();
        let updated = match self
            .deps
            .participant_repository
            .update_position(participant.id, position)
            .await
        {
            Ok(updated) => updated,
            Err(RepositoryError::NotFound) => return Err(DomainError::StaleSession.into()),
            Err(err) => return Err(err.into()),
        };

        self.deps
            .history_repository
            .append(LocationSample::new(participant.id, position, now))
            .await?;

        Ok(updated)
    }

    /// 列出房间全部参与者及各自最近轨迹。
    ///
    /// 房间存在但无参与者时返回空列表；房间不存在或已到期时报错。
    pub async fn list_participants(
        &self,
        room_id: Uuid,
    ) -> Result<Vec<ParticipantWithTrail>, ApplicationError> {
        self.sweep_expired().await?;

        let room_id = RoomId::from(room_id);

        let lock = self.locks.for_room(room_id).await;
        let guard = lock.lock().await;

        let room = match self.deps.room_repository.find_by_id(room_id).await? {
            Some(room) => room,
            None => {
                drop(guard);
                self.locks.discard(room_id).await;
                return Err(DomainError::RoomNotFound.into());
            }
        };
        if room.is_expired(self.deps.clock.now()) {
            return Err(DomainError::RoomNotFound.into());
        }

        let participants = self
            .deps
            .participant_repository
            .list_by_room(room_id)
            .await?;

        let mut result = Vec::with_capacity(participants.len());
        for participant in participants {
            let trail = self.deps.history_repository.recent(participant.id).await?;
            result.push(ParticipantWithTrail { participant, trail });
        }
        Ok(result)
    }

    /// 列出当前存活的房间，最新创建的在前。
    pub async fn list_live_rooms(&self) -> Result<Vec<Room>, ApplicationError> {
        self.sweep_expired().await?;

        let now = self.deps.clock.now();
        let rooms = self.deps.room_repository.list_live(now).await?;
        Ok(rooms)
    }

    /// 清扫全部过期房间，返回被删除的房间 id。
    ///
    /// 幂等且可并发调用：每个房间在自己的临界区内复核后才级联删除，
    /// 已被其他清扫处理过的房间直接跳过。
    pub async fn sweep_expired(&self) -> Result<Vec<RoomId>, ApplicationError> {
        let now = self.deps.clock.now();
        let expired = self.deps.room_repository.find_expired(now).await?;

        let mut swept = Vec::new();
        for room_id in expired {
            let lock = self.locks.for_room(room_id).await;
            let guard = lock.lock().await;

            let still_expired = match self.deps.room_repository.find_by_id(room_id).await? {
                Some(room) => room.is_expired(now),
                None => false,
            };
            if !still_expired {
                continue;
            }

            // 先子后父：轨迹 -> 参与者 -> 房间
            let participant_ids = self
                .deps
                .participant_repository
                .ids_for_rooms(&[room_id])
                .await?;
            if !participant_ids.is_empty() {
                self.deps
                    .history_repository
                    .remove_all_for_participants(&participant_ids)
                    .await?;
            }
            self.deps
                .participant_repository
                .remove_all_for_rooms(&[room_id])
                .await?;
            self.deps.room_repository.delete(room_id).await?;

            drop(guard);
            self.locks.discard(room_id).await;
            swept.push(room_id);
        }

        if !swept.is_empty() {
            tracing::info!(count = swept.len(), "清扫过期房间");
        }
        Ok(swept)
    }
}
