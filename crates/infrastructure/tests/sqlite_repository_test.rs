//! SQLite 仓储集成测试
//!
//! 在进程内内存库上验证三个仓储的契约，以及整套服务跑在 SQLite 上的行为

use std::sync::{Arc, Mutex};

use application::{
    Clock, CreateRoomRequest, JoinRoomRequest, LocationHistoryRepository, ParticipantRepository,
    RecordLocationRequest, RoomRepository, RoomService, RoomServiceDependencies,
};
use chrono::{Duration, TimeZone, Utc};
use domain::{
    LocationSample, Participant, ParticipantId, ParticipantName, PasswordHash, Position,
    RepositoryError, Room, RoomDuration, RoomId, RoomName, Timestamp, LOCATION_HISTORY_LIMIT,
};
use infrastructure::{
    apply_schema, create_sqlite_pool, BcryptPasswordHasher, Infrastructure, InfrastructureConfig,
    SqliteStorage,
};
use uuid::Uuid;

/// bcrypt 的最低代价（MIN_COST 为私有常量，这里复制其值）
const MIN_COST: u32 = 4;

/// 单连接的内存库：同一个池内所有操作共享同一份数据
async fn memory_storage() -> SqliteStorage {
    let pool = create_sqlite_pool("sqlite::memory:", 1)
        .await
        .expect("in-memory sqlite pool");
    apply_schema(&pool).await.expect("schema");
    SqliteStorage::new(pool)
}

fn base_time() -> Timestamp {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

fn room_named(name: &str, created_at: Timestamp, minutes: u32) -> Room {
    Room::new(
        RoomId::from(Uuid::new_v4()),
        RoomName::parse(name).unwrap(),
        PasswordHash::new("$2b$04$abcdefghijklmnopqrstuv").unwrap(),
        ParticipantName::parse("alice").unwrap(),
        RoomDuration::new(minutes).unwrap(),
        created_at,
    )
}

fn participant_in(room_id: RoomId, name: &str, joined_at: Timestamp) -> Participant {
    Participant::new(
        ParticipantId::from(Uuid::new_v4()),
        room_id,
        ParticipantName::parse(name).unwrap(),
        Position::new(37.5, 127.0, None).unwrap(),
        joined_at,
    )
}

/// 手动推进的测试时钟
struct ManualClock {
    now: Mutex<Timestamp>,
}

impl ManualClock {
    fn starting_at(now: Timestamp) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(now),
        })
    }

    fn advance(&self, delta: Duration) {
        let mut now = self.now.lock().unwrap();
        *now = *now + delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock().unwrap()
    }
}

#[tokio::test]
async fn test_room_store_enforces_name_uniqueness() {
    let storage = memory_storage().await;
    let rooms = storage.room_repository.clone();
    let created_at = base_time();

    rooms.create(room_named("trip", created_at, 60)).await.unwrap();
    let err = rooms
        .create(room_named("trip", created_at, 30))
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::Conflict(_)));

    // 名称区分大小写
    rooms.create(room_named("Trip", created_at, 60)).await.unwrap();
}

#[tokio::test]
async fn test_room_store_round_trips_fields() {
    let storage = memory_storage().await;
    let rooms = storage.room_repository.clone();

    let room = room_named("trip", base_time(), 90);
    let created = rooms.create(room.clone()).await.unwrap();
    assert_eq!(created, room);

    let by_id = rooms.find_by_id(room.id).await.unwrap().unwrap();
    assert_eq!(by_id, room);

    let by_name = rooms
        .find_by_name(&RoomName::parse("trip").unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_name.id, room.id);
    assert_eq!(by_name.password.as_str(), room.password.as_str());
    assert_eq!(by_name.expires_at(), room.created_at + Duration::minutes(90));
}

#[tokio::test]
async fn test_room_store_lists_live_newest_first() {
    let storage = memory_storage().await;
    let rooms = storage.room_repository.clone();
    let base = base_time();

    rooms.create(room_named("old", base, 60)).await.unwrap();
    rooms
        .create(room_named("newer", base + Duration::minutes(5), 60))
        .await
        .unwrap();
    rooms
        .create(room_named("expired", base - Duration::minutes(90), 30))
        .await
        .unwrap();
    // created_at 相同时按插入顺序
    rooms.create(room_named("tied", base, 60)).await.unwrap();

    let live = rooms.list_live(base + Duration::minutes(10)).await.unwrap();
    let names: Vec<&str> = live.iter().map(|room| room.name.as_str()).collect();
    assert_eq!(names, vec!["newer", "old", "tied"]);
}

#[tokio::test]
async fn test_room_store_sweep_contract() {
    let storage = memory_storage().await;
    let rooms = storage.room_repository.clone();
    let base = base_time();

    let live = room_named("live", base, 60);
    let gone = room_named("gone", base - Duration::minutes(90), 30);
    rooms.create(live.clone()).await.unwrap();
    rooms.create(gone.clone()).await.unwrap();

    // 到期边界取非严格判定：恰好到期也算过期
    let boundary = room_named("boundary", base - Duration::minutes(30), 30);
    rooms.create(boundary.clone()).await.unwrap();

    let mut expired = rooms.find_expired(base).await.unwrap();
    expired.sort_by_key(|id| Uuid::from(*id));
    let mut wanted = vec![gone.id, boundary.id];
    wanted.sort_by_key(|id| Uuid::from(*id));
    assert_eq!(expired, wanted);

    rooms.delete(gone.id).await.unwrap();
    assert!(rooms.find_by_id(gone.id).await.unwrap().is_none());
    // 删除不存在的房间不是错误
    rooms.delete(gone.id).await.unwrap();

    // 删除后名称立即可重用
    rooms.create(room_named("gone", base, 60)).await.unwrap();
}

#[tokio::test]
async fn test_participant_store_contract() {
    let storage = memory_storage().await;
    let rooms = storage.room_repository.clone();
    let participants = storage.participant_repository.clone();
    let now = base_time();

    let room_a = rooms.create(room_named("a", now, 60)).await.unwrap();
    let room_b = rooms.create(room_named("b", now, 60)).await.unwrap();

    let alice = participants
        .add(participant_in(room_a.id, "alice", now))
        .await
        .unwrap();
    participants
        .add(participant_in(room_a.id, "bob", now))
        .await
        .unwrap();

    // 同房间重名被唯一约束拒绝
    let err = participants
        .add(participant_in(room_a.id, "bob", now))
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::Conflict(_)));

    // 不同房间允许同名
    participants
        .add(participant_in(room_b.id, "bob", now))
        .await
        .unwrap();

    let members = participants.list_by_room(room_a.id).await.unwrap();
    let names: Vec<&str> = members.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["alice", "bob"]);

    let next = Position::new(37.6, 127.1, Some(5.0)).unwrap();
    let updated = participants.update_position(alice.id, next).await.unwrap();
    assert_eq!(updated.position, next);

    let err = participants
        .update_position(ParticipantId::from(Uuid::new_v4()), next)
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound));

    let found = participants
        .find_by_name(room_a.id, &ParticipantName::parse("alice").unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, alice.id);

    let ids = participants.ids_for_rooms(&[room_a.id]).await.unwrap();
    assert_eq!(ids.len(), 2);

    let removed = participants.remove_all_for_rooms(&[room_a.id]).await.unwrap();
    assert_eq!(removed, 2);
    assert!(participants.list_by_room(room_a.id).await.unwrap().is_empty());
    assert_eq!(participants.list_by_room(room_b.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_history_store_trims_to_newest_ten() {
    let storage = memory_storage().await;
    let rooms = storage.room_repository.clone();
    let participants = storage.participant_repository.clone();
    let history = storage.history_repository.clone();
    let base = base_time();

    let room = rooms.create(room_named("trip", base, 60)).await.unwrap();
    let member = participants
        .add(participant_in(room.id, "bob", base))
        .await
        .unwrap();

    for i in 0..12i64 {
        let position = Position::new(37.5, 127.0 + i as f64 * 0.001, None).unwrap();
        history
            .append(LocationSample::new(
                member.id,
                position,
                base + Duration::seconds(i),
            ))
            .await
            .unwrap();
    }

    let trail = history.recent(member.id).await.unwrap();
    assert_eq!(trail.len(), LOCATION_HISTORY_LIMIT);
    // 最新在前，最旧两条已被裁剪
    assert_eq!(trail[0].recorded_at, base + Duration::seconds(11));
    assert_eq!(trail[9].recorded_at, base + Duration::seconds(2));

    let removed = history.remove_all_for_participants(&[member.id]).await.unwrap();
    assert_eq!(removed, LOCATION_HISTORY_LIMIT as u64);
    assert!(history.recent(member.id).await.unwrap().is_empty());
}

/// 整套房间服务落在 SQLite + bcrypt 上的端到端行为
#[tokio::test]
async fn test_room_service_over_sqlite() -> Result<(), Box<dyn std::error::Error>> {
    let storage = memory_storage().await;
    let clock = ManualClock::starting_at(base_time());

    let deps = RoomServiceDependencies {
        room_repository: storage.room_repository.clone(),
        participant_repository: storage.participant_repository.clone(),
        history_repository: storage.history_repository.clone(),
        // 测试用最低代价
        password_hasher: Arc::new(BcryptPasswordHasher::new(Some(MIN_COST))),
        clock: clock.clone(),
    };
    let service = RoomService::new(deps);

    let created = service
        .create_room(CreateRoomRequest {
            name: "trip".to_string(),
            password: "pw1".to_string(),
            creator_name: "alice".to_string(),
            duration_minutes: 30,
            latitude: Some(37.5),
            longitude: Some(127.0),
            accuracy: None,
        })
        .await?;
    let room_id = Uuid::from(created.room.id);

    // 存进库里的是哈希而不是明文
    let stored = storage
        .room_repository
        .find_by_id(created.room.id)
        .await?
        .unwrap();
    assert_ne!(stored.password.as_str(), "pw1");

    let err = service
        .join_room(JoinRoomRequest {
            room_name: "trip".to_string(),
            password: "wrongpw".to_string(),
            participant_name: "bob".to_string(),
            latitude: 37.5,
            longitude: 127.0,
            accuracy: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        application::ApplicationError::Domain(domain::DomainError::BadCredential)
    ));

    service
        .join_room(JoinRoomRequest {
            room_name: "trip".to_string(),
            password: "pw1".to_string(),
            participant_name: "bob".to_string(),
            latitude: 37.5,
            longitude: 127.0,
            accuracy: Some(12.0),
        })
        .await?;

    clock.advance(Duration::minutes(1));
    service
        .record_location(RecordLocationRequest {
            room_id,
            participant_name: "bob".to_string(),
            latitude: 37.6,
            longitude: 127.1,
            accuracy: None,
        })
        .await?;

    let listed = service.list_participants(room_id).await?;
    let names: Vec<&str> = listed
        .iter()
        .map(|entry| entry.participant.name.as_str())
        .collect();
    assert_eq!(names, vec!["alice", "bob"]);
    assert_eq!(listed[1].trail.len(), 2);
    assert_eq!(listed[1].trail[0].position.longitude(), 127.1);

    // 到期后清扫级联删除全部数据，且名称立即可重用
    clock.advance(Duration::minutes(30));
    let swept = service.sweep_expired().await?;
    assert_eq!(swept, vec![created.room.id]);
    assert!(storage
        .room_repository
        .find_by_id(created.room.id)
        .await?
        .is_none());
    assert!(storage
        .participant_repository
        .list_by_room(created.room.id)
        .await?
        .is_empty());

    service
        .create_room(CreateRoomRequest {
            name: "trip".to_string(),
            password: "pw2".to_string(),
            creator_name: "carol".to_string(),
            duration_minutes: 30,
            latitude: Some(37.5),
            longitude: Some(127.0),
            accuracy: None,
        })
        .await?;
    Ok(())
}

/// 通过 builder 组装存储与哈希器，建表由 connect 一步完成
#[tokio::test]
async fn test_builder_assembles_a_working_stack() -> Result<(), Box<dyn std::error::Error>> {
    let infra = Infrastructure::connect(InfrastructureConfig {
        database_url: "sqlite::memory:".to_string(),
        max_connections: 1,
        bcrypt_cost: Some(MIN_COST),
    })
    .await?;

    let deps = RoomServiceDependencies {
        room_repository: infra.storage.room_repository.clone(),
        participant_repository: infra.storage.participant_repository.clone(),
        history_repository: infra.storage.history_repository.clone(),
        password_hasher: infra.password_hasher_trait(),
        clock: ManualClock::starting_at(base_time()),
    };
    let service = RoomService::new(deps);

    let created = service
        .create_room(CreateRoomRequest {
            name: "trip".to_string(),
            password: "pw1".to_string(),
            creator_name: "alice".to_string(),
            duration_minutes: 30,
            latitude: Some(37.5),
            longitude: Some(127.0),
            accuracy: None,
        })
        .await?;

    service
        .join_room(JoinRoomRequest {
            room_name: "trip".to_string(),
            password: "pw1".to_string(),
            participant_name: "bob".to_string(),
            latitude: 37.5,
            longitude: 127.0,
            accuracy: None,
        })
        .await?;

    let listed = service.list_participants(Uuid::from(created.room.id)).await?;
    assert_eq!(listed.len(), 2);

    // builder 配置的 bcrypt 哈希器在口令校验上生效
    let err = service
        .join_room(JoinRoomRequest {
            room_name: "trip".to_string(),
            password: "wrongpw".to_string(),
            participant_name: "carol".to_string(),
            latitude: 37.5,
            longitude: 127.0,
            accuracy: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        application::ApplicationError::Domain(domain::DomainError::BadCredential)
    ));
    Ok(())
}
