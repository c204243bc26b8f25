use std::sync::Arc;

use application::repository::{LocationHistoryRepository, ParticipantRepository, RoomRepository};
use async_trait::async_trait;
use domain::{
    LocationSample, Participant, ParticipantId, ParticipantName, PasswordHash, Position,
    RepositoryError, Room, RoomDuration, RoomId, RoomName, Timestamp, LOCATION_HISTORY_LIMIT,
};
use sqlx::{sqlite::SqlitePoolOptions, FromRow, SqlitePool};
use uuid::Uuid;

/// 建表语句为幂等形式，每次启动时执行一遍即可
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS rooms (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    creator TEXT NOT NULL,
    duration_minutes INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS participants (
    id TEXT PRIMARY KEY,
    room_id TEXT NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    accuracy REAL,
    joined_at TEXT NOT NULL,
    UNIQUE (room_id, name)
);

CREATE TABLE IF NOT EXISTS location_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    participant_id TEXT NOT NULL REFERENCES participants(id) ON DELETE CASCADE,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    accuracy REAL,
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_location_history_participant
    ON location_history (participant_id, recorded_at DESC);
"#;

fn map_sqlx_err(err: sqlx::Error) -> RepositoryError {
    match err {
        sqlx::Error::RowNotFound => RepositoryError::NotFound,
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            RepositoryError::conflict(db_err.to_string())
        }
        other => RepositoryError::storage(other.to_string()),
    }
}

fn invalid_data(message: impl Into<String>) -> RepositoryError {
    RepositoryError::storage(message)
}

#[derive(Debug, FromRow)]
struct RoomRecord {
    id: String,
    name: String,
    password_hash: String,
    creator: String,
    duration_minutes: i64,
    created_at: Timestamp,
}

impl TryFrom<RoomRecord> for Room {
    type Error = RepositoryError;

    fn try_from(value: RoomRecord) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&value.id).map_err(|err| invalid_data(err.to_string()))?;
        let name = RoomName::parse(value.name).map_err(|err| invalid_data(err.to_string()))?;
        let password =
            PasswordHash::new(value.password_hash).map_err(|err| invalid_data(err.to_string()))?;
        let creator =
            ParticipantName::parse(value.creator).map_err(|err| invalid_data(err.to_string()))?;
        let minutes = u32::try_from(value.duration_minutes)
            .map_err(|err| invalid_data(err.to_string()))?;
        let duration = RoomDuration::new(minutes).map_err(|err| invalid_data(err.to_string()))?;

        Ok(Room {
            id: RoomId::from(id),
            name,
            password,
            creator,
            duration,
            created_at: value.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ParticipantRecord {
    id: String,
    room_id: String,
    name: String,
    latitude: f64,
    longitude: f64,
    accuracy: Option<f64>,
    joined_at: Timestamp,
}

impl TryFrom<ParticipantRecord> for Participant {
    type Error = RepositoryError;

    fn try_from(value: ParticipantRecord) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&value.id).map_err(|err| invalid_data(err.to_string()))?;
        let room_id =
            Uuid::parse_str(&value.room_id).map_err(|err| invalid_data(err.to_string()))?;
        let name =
            ParticipantName::parse(value.name).map_err(|err| invalid_data(err.to_string()))?;
        let position = Position::new(value.latitude, value.longitude, value.accuracy)
            .map_err(|err| invalid_data(err.to_string()))?;

        Ok(Participant {
            id: ParticipantId::from(id),
            room_id: RoomId::from(room_id),
            name,
            position,
            joined_at: value.joined_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct HistoryRecord {
    participant_id: String,
    latitude: f64,
    longitude: f64,
    accuracy: Option<f64>,
    recorded_at: Timestamp,
}

impl TryFrom<HistoryRecord> for LocationSample {
    type Error = RepositoryError;

    fn try_from(value: HistoryRecord) -> Result<Self, Self::Error> {
        let participant_id =
            Uuid::parse_str(&value.participant_id).map_err(|err| invalid_data(err.to_string()))?;
        let position = Position::new(value.latitude, value.longitude, value.accuracy)
            .map_err(|err| invalid_data(err.to_string()))?;

        Ok(LocationSample {
            participant_id: ParticipantId::from(participant_id),
            position,
            recorded_at: value.recorded_at,
        })
    }
}

#[derive(Clone)]
pub struct SqliteRoomRepository {
    pool: SqlitePool,
}

impl SqliteRoomRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoomRepository for SqliteRoomRepository {
    async fn create(&self, room: Room) -> Result<Room, RepositoryError> {
        let record = sqlx::query_as::<_, RoomRecord>(
            r#"
            INSERT INTO rooms (id, name, password_hash, creator, duration_minutes, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id, name, password_hash, creator, duration_minutes, created_at
            "#,
        )
        .bind(room.id.to_string())
        .bind(room.name.as_str())
        .bind(room.password.as_str())
        .bind(room.creator.as_str())
        .bind(i64::from(room.duration.minutes()))
        .bind(room.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Room::try_from(record)
    }

    async fn find_by_id(&self, id: RoomId) -> Result<Option<Room>, RepositoryError> {
        let record = sqlx::query_as::<_, RoomRecord>(
            r#"
            SELECT id, name, password_hash, creator, duration_minutes, created_at
            FROM rooms WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(Room::try_from).transpose()
    }

    async fn find_by_name(&self, name: &RoomName) -> Result<Option<Room>, RepositoryError> {
        let record = sqlx::query_as::<_, RoomRecord>(
            r#"
            SELECT id, name, password_hash, creator, duration_minutes, created_at
            FROM rooms WHERE name = ?
            "#,
        )
        .bind(name.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(Room::try_from).transpose()
    }

    async fn list_live(&self, now: Timestamp) -> Result<Vec<Room>, RepositoryError> {
        let records = sqlx::query_as::<_, RoomRecord>(
            r#"
            SELECT id, name, password_hash, creator, duration_minutes, created_at
            FROM rooms ORDER BY created_at DESC, rowid ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        // 到期时刻由 created_at 和时长推导，判定在进程内完成
        let mut rooms = Vec::with_capacity(records.len());
        for record in records {
            let room = Room::try_from(record)?;
            if room.is_live(now) {
                rooms.push(room);
            }
        }
        Ok(rooms)
    }

    async fn find_expired(&self, now: Timestamp) -> Result<Vec<RoomId>, RepositoryError> {
        let records = sqlx::query_as::<_, RoomRecord>(
            r#"
            SELECT id, name, password_hash, creator, duration_minutes, created_at
            FROM rooms
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        let mut expired = Vec::new();
        for record in records {
            let room = Room::try_from(record)?;
            if room.is_expired(now) {
                expired.push(room.id);
            }
        }
        Ok(expired)
    }

    async fn delete(&self, id: RoomId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM rooms WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct SqliteParticipantRepository {
    pool: SqlitePool,
}

impl SqliteParticipantRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ParticipantRepository for SqliteParticipantRepository {
    async fn add(&self, participant: Participant) -> Result<Participant, RepositoryError> {
        let record = sqlx::query_as::<_, ParticipantRecord>(
            r#"
            INSERT INTO participants (id, room_id, name, latitude, longitude, accuracy, joined_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id, room_id, name, latitude, longitude, accuracy, joined_at
            "#,
        )
        .bind(participant.id.to_string())
        .bind(participant.room_id.to_string())
        .bind(participant.name.as_str())
        .bind(participant.position.latitude())
        .bind(participant.position.longitude())
        .bind(participant.position.accuracy())
        .bind(participant.joined_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Participant::try_from(record)
    }

    async fn find_by_name(
        &self,
        room_id: RoomId,
        name: &ParticipantName,
    ) -> Result<Option<Participant>, RepositoryError> {
        let record = sqlx::query_as::<_, ParticipantRecord>(
            r#"
            SELECT id, room_id, name, latitude, longitude, accuracy, joined_at
            FROM participants WHERE room_id = ? AND name = ?
            "#,
        )
        .bind(room_id.to_string())
        .bind(name.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(Participant::try_from).transpose()
    }

    async fn list_by_room(&self, room_id: RoomId) -> Result<Vec<Participant>, RepositoryError> {
        let records = sqlx::query_as::<_, ParticipantRecord>(
            r#"
            SELECT id, room_id, name, latitude, longitude, accuracy, joined_at
            FROM participants WHERE room_id = ? ORDER BY rowid ASC
            "#,
        )
        .bind(room_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(Participant::try_from).collect()
    }

    async fn update_position(
        &self,
        id: ParticipantId,
        position: Position,
    ) -> Result<Participant, RepositoryError> {
        let record = sqlx::query_as::<_, ParticipantRecord>(
            r#"
            UPDATE participants SET latitude = ?, longitude = ?, accuracy = ?
            WHERE id = ?
            RETURNING id, room_id, name, latitude, longitude, accuracy, joined_at
            "#,
        )
        .bind(position.latitude())
        .bind(position.longitude())
        .bind(position.accuracy())
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        match record {
            Some(record) => Participant::try_from(record),
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn remove(&self, id: ParticipantId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM participants WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn ids_for_rooms(
        &self,
        room_ids: &[RoomId],
    ) -> Result<Vec<ParticipantId>, RepositoryError> {
        let mut ids = Vec::new();
        for room_id in room_ids {
            let rows = sqlx::query_scalar::<_, String>(
                "SELECT id FROM participants WHERE room_id = ? ORDER BY rowid ASC",
            )
            .bind(room_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

            for raw in rows {
                let id = Uuid::parse_str(&raw).map_err(|err| invalid_data(err.to_string()))?;
                ids.push(ParticipantId::from(id));
            }
        }
        Ok(ids)
    }

    async fn remove_all_for_rooms(&self, room_ids: &[RoomId]) -> Result<u64, RepositoryError> {
        let mut removed = 0u64;
        for room_id in room_ids {
            let result = sqlx::query("DELETE FROM participants WHERE room_id = ?")
                .bind(room_id.to_string())
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_err)?;
            removed += result.rows_affected();
        }
        Ok(removed)
    }
}

#[derive(Clone)]
pub struct SqliteLocationHistoryRepository {
    pool: SqlitePool,
}

impl SqliteLocationHistoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LocationHistoryRepository for SqliteLocationHistoryRepository {
    async fn append(&self, sample: LocationSample) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;

        sqlx::query(
            r#"
            INSERT INTO location_history (participant_id, latitude, longitude, accuracy, recorded_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(sample.participant_id.to_string())
        .bind(sample.position.latitude())
        .bind(sample.position.longitude())
        .bind(sample.position.accuracy())
        .bind(sample.recorded_at)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;

        // 插入后立即裁剪，只保留该参与者最近的若干条
        sqlx::query(
            r#"
            DELETE FROM location_history
            WHERE participant_id = ?
              AND id NOT IN (
                  SELECT id FROM location_history
                  WHERE participant_id = ?
                  ORDER BY recorded_at DESC, id DESC
                  LIMIT ?
              )
            "#,
        )
        .bind(sample.participant_id.to_string())
        .bind(sample.participant_id.to_string())
        .bind(LOCATION_HISTORY_LIMIT as i64)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;

        tx.commit().await.map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn recent(
        &self,
        participant_id: ParticipantId,
    ) -> Result<Vec<LocationSample>, RepositoryError> {
        let records = sqlx::query_as::<_, HistoryRecord>(
            r#"
            SELECT participant_id, latitude, longitude, accuracy, recorded_at
            FROM location_history
            WHERE participant_id = ?
            ORDER BY recorded_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(participant_id.to_string())
        .bind(LOCATION_HISTORY_LIMIT as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(LocationSample::try_from).collect()
    }

    async fn remove_all_for_participants(
        &self,
        participant_ids: &[ParticipantId],
    ) -> Result<u64, RepositoryError> {
        let mut removed = 0u64;
        for participant_id in participant_ids {
            let result = sqlx::query("DELETE FROM location_history WHERE participant_id = ?")
                .bind(participant_id.to_string())
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_err)?;
            removed += result.rows_affected();
        }
        Ok(removed)
    }
}

/// 汇总三个 SQLite 仓储，共享同一个连接池
pub struct SqliteStorage {
    pub pool: SqlitePool,
    pub room_repository: Arc<SqliteRoomRepository>,
    pub participant_repository: Arc<SqliteParticipantRepository>,
    pub history_repository: Arc<SqliteLocationHistoryRepository>,
}

impl SqliteStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            room_repository: Arc::new(SqliteRoomRepository::new(pool.clone())),
            participant_repository: Arc::new(SqliteParticipantRepository::new(pool.clone())),
            history_repository: Arc::new(SqliteLocationHistoryRepository::new(pool.clone())),
            pool,
        }
    }
}

pub async fn create_sqlite_pool(
    database_url: &str,
    max_connections: u32,
) -> Result<SqlitePool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

/// 应用内嵌的表结构
pub async fn apply_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    Ok(())
}
