//! `SQLite` implementation of [`ScheduleRepository`].

use std::future::Future;

use chrono::NaiveTime;
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use roomhub_app::ports::ScheduleRepository;
use roomhub_domain::error::RoomHubError;
use roomhub_domain::id::ScheduleId;
use roomhub_domain::room::{DeviceKind, RoomName};
use roomhub_domain::schedule::{Schedule, ScheduleKind, ScheduleShape};

use crate::error::StorageError;
use crate::{format_timestamp, parse_timestamp};

const TIME_FORMAT: &str = "%H:%M:%S";
const MINUTE_FORMAT: &str = "%H:%M";

/// Wrapper for converting database rows into domain [`Schedule`].
struct Wrapper(Schedule);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<Schedule> {
        value.map(|w| w.0)
    }
}

/// Decode every row that can be decoded; a malformed row is logged and left
/// out so the rest of the batch still reaches the reconciler.
fn decode_rows(rows: &[SqliteRow]) -> Vec<Schedule> {
    rows.iter()
        .filter_map(|row| match Wrapper::from_row(row) {
            Ok(wrapper) => Some(wrapper.0),
            Err(err) => {
                let id = row.try_get::<uuid::Uuid, _>("id").ok();
                tracing::warn!(?id, %err, "skipping unreadable schedule row");
                None
            }
        })
        .collect()
}

fn parse_time(column: &'static str, value: Option<String>) -> Result<NaiveTime, sqlx::Error> {
    let value = value.ok_or_else(|| StorageError::invalid(column, "NULL"))?;
    NaiveTime::parse_from_str(&value, TIME_FORMAT).map_err(|_| StorageError::invalid(column, value))
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: uuid::Uuid = row.try_get("id")?;
        let room: String = row.try_get("room")?;
        let name: Option<String> = row.try_get("name")?;
        let device: String = row.try_get("device")?;
        let target: bool = row.try_get("target")?;
        let kind: String = row.try_get("kind")?;
        let created_at: String = row.try_get("created_at")?;

        let shape = match kind.as_str() {
            "punctual" => ScheduleShape::Punctual {
                at: parse_time("at_time", row.try_get("at_time")?)?,
            },
            "interval" => ScheduleShape::Interval {
                start: parse_time("start_time", row.try_get("start_time")?)?,
                end: parse_time("end_time", row.try_get("end_time")?)?,
            },
            other => return Err(StorageError::invalid("kind", other)),
        };

        Ok(Self(Schedule {
            id: ScheduleId::from_uuid(id),
            room: RoomName::parse(room).map_err(|err| sqlx::Error::Decode(Box::new(err)))?,
            name,
            device: DeviceKind::from_name(&device)
                .ok_or_else(|| StorageError::invalid("device", device))?,
            target,
            shape,
            created_at: parse_timestamp(&created_at)?,
        }))
    }
}

const INSERT: &str = r"
    INSERT INTO schedules (id, room, name, device, target, kind, at_time, start_time, end_time, created_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
";
const SELECT_BY_ID: &str = "SELECT * FROM schedules WHERE id = ?";
const SELECT_ALL: &str = "SELECT * FROM schedules ORDER BY created_at";
const SELECT_BY_ROOM: &str = "SELECT * FROM schedules WHERE room = ? ORDER BY created_at";
const SELECT_BY_KIND: &str = "SELECT * FROM schedules WHERE kind = ? ORDER BY created_at";
const SELECT_PUNCTUAL_AT: &str = r"
    SELECT * FROM schedules
    WHERE kind = 'punctual' AND substr(at_time, 1, 5) = ?
    ORDER BY created_at
";
const DELETE_BY_ID: &str = "DELETE FROM schedules WHERE id = ?";
const DELETE_BY_ROOM: &str = "DELETE FROM schedules WHERE room = ?";

/// `SQLite`-backed schedule repository.
pub struct SqliteScheduleRepository {
    pool: SqlitePool,
}

impl SqliteScheduleRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, query: &'static str, value: String) -> Result<Vec<Schedule>, RoomHubError> {
        let rows = sqlx::query(query)
            .bind(value)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(decode_rows(&rows))
    }
}

impl ScheduleRepository for SqliteScheduleRepository {
    fn create(
        &self,
        schedule: Schedule,
    ) -> impl Future<Output = Result<Schedule, RoomHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let (at_time, start_time, end_time) = match schedule.shape {
                ScheduleShape::Punctual { at } => (Some(at.format(TIME_FORMAT).to_string()), None, None),
                ScheduleShape::Interval { start, end } => (
                    None,
                    Some(start.format(TIME_FORMAT).to_string()),
                    Some(end.format(TIME_FORMAT).to_string()),
                ),
            };

            sqlx::query(INSERT)
                .bind(schedule.id.as_uuid())
                .bind(schedule.room.as_str())
                .bind(schedule.name.as_deref())
                .bind(schedule.device.as_str())
                .bind(schedule.target)
                .bind(schedule.kind().as_str())
                .bind(at_time)
                .bind(start_time)
                .bind(end_time)
                .bind(format_timestamp(schedule.created_at))
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(schedule)
        }
    }

    fn get_by_id(
        &self,
        id: ScheduleId,
    ) -> impl Future<Output = Result<Option<Schedule>, RoomHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
                .bind(id.as_uuid())
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(Wrapper::maybe(row))
        }
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<Schedule>, RoomHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows = sqlx::query(SELECT_ALL)
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(decode_rows(&rows))
        }
    }

    fn find_by_room(
        &self,
        room: &RoomName,
    ) -> impl Future<Output = Result<Vec<Schedule>, RoomHubError>> + Send {
        self.fetch(SELECT_BY_ROOM, room.to_string())
    }

    fn find_by_kind(
        &self,
        kind: ScheduleKind,
    ) -> impl Future<Output = Result<Vec<Schedule>, RoomHubError>> + Send {
        self.fetch(SELECT_BY_KIND, kind.as_str().to_string())
    }

    fn find_punctual_at(
        &self,
        time: NaiveTime,
    ) -> impl Future<Output = Result<Vec<Schedule>, RoomHubError>> + Send {
        self.fetch(SELECT_PUNCTUAL_AT, time.format(MINUTE_FORMAT).to_string())
    }

    fn delete(&self, id: ScheduleId) -> impl Future<Output = Result<bool, RoomHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let result = sqlx::query(DELETE_BY_ID)
                .bind(id.as_uuid())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(result.rows_affected() > 0)
        }
    }

    fn delete_by_room(
        &self,
        room: &RoomName,
    ) -> impl Future<Output = Result<u64, RoomHubError>> + Send {
        let pool = self.pool.clone();
        let room = room.to_string();
        async move {
            let result = sqlx::query(DELETE_BY_ROOM)
                .bind(room)
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(result.rows_affected())
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use roomhub_app::ports::RoomRepository;

    use super::*;
    use crate::pool::Config;
    use crate::room_repo::SqliteRoomRepository;

    async fn setup() -> (SqliteScheduleRepository, SqliteRoomRepository) {
        let db = Config {
            database_url: "sqlite::memory:".to_string(),
        }
        .build()
        .await
        .unwrap();
        let rooms = SqliteRoomRepository::new(db.pool().clone());
        rooms.insert_if_absent(&salon()).await.unwrap();
        (SqliteScheduleRepository::new(db.pool().clone()), rooms)
    }

    fn salon() -> RoomName {
        RoomName::parse("salon").unwrap()
    }

    fn hm(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    fn punctual(hour: u32, minute: u32) -> Schedule {
        Schedule::builder()
            .room(salon())
            .name("bedtime")
            .device(DeviceKind::Light)
            .target(false)
            .punctual(hm(hour, minute))
            .created_at(Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap())
            .build()
            .unwrap()
    }

    fn night_alarm() -> Schedule {
        Schedule::builder()
            .room(salon())
            .device(DeviceKind::Alarm)
            .target(true)
            .interval(hm(22, 0), hm(6, 0))
            .created_at(Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn should_read_back_created_schedules() {
        let (repo, _) = setup().await;
        let light = repo.create(punctual(20, 0)).await.unwrap();
        let alarm = repo.create(night_alarm()).await.unwrap();

        assert_eq!(repo.get_by_id(light.id).await.unwrap(), Some(light.clone()));
        assert_eq!(repo.get_by_id(alarm.id).await.unwrap(), Some(alarm.clone()));
        assert_eq!(repo.get_all().await.unwrap(), vec![light, alarm]);
    }

    #[tokio::test]
    async fn should_return_none_when_schedule_not_found() {
        let (repo, _) = setup().await;
        assert!(repo.get_by_id(ScheduleId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn should_reject_schedule_for_unknown_room() {
        let (repo, _) = setup().await;
        let orphan = Schedule::builder()
            .room(RoomName::parse("grenier").unwrap())
            .device(DeviceKind::Light)
            .target(true)
            .punctual(hm(7, 0))
            .build()
            .unwrap();

        let result = repo.create(orphan).await;
        assert!(matches!(result, Err(RoomHubError::Storage(_))));
    }

    #[tokio::test]
    async fn should_find_punctual_schedules_by_hour_and_minute() {
        let (repo, _) = setup().await;
        let evening = repo.create(punctual(20, 0)).await.unwrap();
        repo.create(punctual(20, 1)).await.unwrap();
        repo.create(night_alarm()).await.unwrap();

        let found = repo
            .find_punctual_at(NaiveTime::from_hms_opt(20, 0, 42).unwrap())
            .await
            .unwrap();
        assert_eq!(found, vec![evening]);
    }

    #[tokio::test]
    async fn should_find_schedules_by_kind() {
        let (repo, _) = setup().await;
        repo.create(punctual(20, 0)).await.unwrap();
        let alarm = repo.create(night_alarm()).await.unwrap();

        let intervals = repo.find_by_kind(ScheduleKind::Interval).await.unwrap();
        assert_eq!(intervals, vec![alarm]);
    }

    #[tokio::test]
    async fn should_skip_unreadable_row_and_keep_the_others() {
        let (repo, _) = setup().await;
        let alarm = repo.create(night_alarm()).await.unwrap();
        sqlx::query(
            "INSERT INTO schedules (id, room, device, target, kind, start_time, end_time, created_at) \
             VALUES (?, 'salon', 'light', 1, 'interval', '7pm', '23:00:00', '2025-03-01T10:00:00.000000Z')",
        )
        .bind(ScheduleId::new().as_uuid())
        .execute(&repo.pool)
        .await
        .unwrap();

        let intervals = repo.find_by_kind(ScheduleKind::Interval).await.unwrap();
        assert_eq!(intervals, vec![alarm.clone()]);
        assert_eq!(repo.find_by_room(&salon()).await.unwrap(), vec![alarm.clone()]);
        assert_eq!(repo.get_all().await.unwrap(), vec![alarm]);
    }

    #[tokio::test]
    async fn should_delete_schedule_once() {
        let (repo, _) = setup().await;
        let schedule = repo.create(punctual(20, 0)).await.unwrap();

        assert!(repo.delete(schedule.id).await.unwrap());
        assert!(!repo.delete(schedule.id).await.unwrap());
    }

    #[tokio::test]
    async fn should_delete_all_schedules_of_room() {
        let (repo, rooms) = setup().await;
        let cuisine = RoomName::parse("cuisine").unwrap();
        rooms.insert_if_absent(&cuisine).await.unwrap();
        repo.create(punctual(20, 0)).await.unwrap();
        repo.create(night_alarm()).await.unwrap();
        let kept = Schedule::builder()
            .room(cuisine.clone())
            .device(DeviceKind::Light)
            .target(true)
            .punctual(hm(7, 0))
            .build()
            .unwrap();
        repo.create(kept).await.unwrap();

        assert_eq!(repo.delete_by_room(&salon()).await.unwrap(), 2);
        assert!(repo.find_by_room(&salon()).await.unwrap().is_empty());
        assert_eq!(repo.find_by_room(&cuisine).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn should_cascade_when_room_is_deleted() {
        let (repo, rooms) = setup().await;
        repo.create(night_alarm()).await.unwrap();

        rooms.delete(&salon()).await.unwrap();

        assert!(repo.get_all().await.unwrap().is_empty());
    }
}
