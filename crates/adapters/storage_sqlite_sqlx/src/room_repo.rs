//! `SQLite` implementation of [`RoomRepository`].

use std::future::Future;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use roomhub_app::ports::RoomRepository;
use roomhub_domain::error::RoomHubError;
use roomhub_domain::room::{DeviceKind, Room, RoomName, SwitchState};

use crate::error::StorageError;

/// Wrapper for converting database rows into domain [`Room`].
struct Wrapper(Room);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<Room> {
        value.map(|w| w.0)
    }
}

fn switch_state(column: &'static str, value: &str) -> Result<SwitchState, sqlx::Error> {
    SwitchState::from_name(value).ok_or_else(|| StorageError::invalid(column, value))
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let name: String = row.try_get("name")?;
        let light: String = row.try_get("light")?;
        let alarm: String = row.try_get("alarm")?;

        Ok(Self(Room {
            name: RoomName::parse(name).map_err(|err| sqlx::Error::Decode(Box::new(err)))?,
            light: switch_state("light", &light)?,
            alarm: switch_state("alarm", &alarm)?,
        }))
    }
}

const SELECT_BY_NAME: &str = "SELECT name, light, alarm FROM rooms WHERE name = ?";
const SELECT_ALL: &str = "SELECT name, light, alarm FROM rooms ORDER BY name";
const INSERT_IF_ABSENT: &str = "INSERT INTO rooms (name) VALUES (?) ON CONFLICT (name) DO NOTHING";
const UPSERT_LIGHT: &str = r"
    INSERT INTO rooms (name, light) VALUES (?, ?)
    ON CONFLICT (name) DO UPDATE SET light = excluded.light
    RETURNING name, light, alarm
";
const UPSERT_ALARM: &str = r"
    INSERT INTO rooms (name, alarm) VALUES (?, ?)
    ON CONFLICT (name) DO UPDATE SET alarm = excluded.alarm
    RETURNING name, light, alarm
";
const DELETE_BY_NAME: &str = "DELETE FROM rooms WHERE name = ?";

/// `SQLite`-backed room repository.
///
/// Device states are written one column at a time, so concurrent commits for
/// the light and the alarm of the same room never overwrite each other.
pub struct SqliteRoomRepository {
    pool: SqlitePool,
}

impl SqliteRoomRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl RoomRepository for SqliteRoomRepository {
    fn get(
        &self,
        name: &RoomName,
    ) -> impl Future<Output = Result<Option<Room>, RoomHubError>> + Send {
        let pool = self.pool.clone();
        let name = name.to_string();
        async move {
            let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_NAME)
                .bind(name)
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(Wrapper::maybe(row))
        }
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<Room>, RoomHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<Wrapper> = sqlx::query_as(SELECT_ALL)
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(rows.into_iter().map(|w| w.0).collect())
        }
    }

    fn insert_if_absent(
        &self,
        name: &RoomName,
    ) -> impl Future<Output = Result<(Room, bool), RoomHubError>> + Send {
        let pool = self.pool.clone();
        let name = name.clone();
        async move {
            let created = sqlx::query(INSERT_IF_ABSENT)
                .bind(name.as_str())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?
                .rows_affected()
                > 0;

            let row: Wrapper = sqlx::query_as(SELECT_BY_NAME)
                .bind(name.as_str())
                .fetch_one(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok((row.0, created))
        }
    }

    fn set_state(
        &self,
        name: &RoomName,
        device: DeviceKind,
        state: SwitchState,
    ) -> impl Future<Output = Result<Room, RoomHubError>> + Send {
        let pool = self.pool.clone();
        let name = name.to_string();
        let query = match device {
            DeviceKind::Light => UPSERT_LIGHT,
            DeviceKind::Alarm => UPSERT_ALARM,
        };
        async move {
            let row: Wrapper = sqlx::query_as(query)
                .bind(name)
                .bind(state.as_str())
                .fetch_one(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(row.0)
        }
    }

    fn delete(&self, name: &RoomName) -> impl Future<Output = Result<bool, RoomHubError>> + Send {
        let pool = self.pool.clone();
        let name = name.to_string();
        async move {
            let result = sqlx::query(DELETE_BY_NAME)
                .bind(name)
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(result.rows_affected() > 0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Config;

    async fn setup() -> SqliteRoomRepository {
        let db = Config {
            database_url: "sqlite::memory:".to_string(),
        }
        .build()
        .await
        .unwrap();
        SqliteRoomRepository::new(db.pool().clone())
    }

    fn salon() -> RoomName {
        RoomName::parse("salon").unwrap()
    }

    #[tokio::test]
    async fn should_return_none_when_room_not_found() {
        let repo = setup().await;
        assert!(repo.get(&salon()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn should_insert_room_with_unknown_devices_only_once() {
        let repo = setup().await;

        let (room, created) = repo.insert_if_absent(&salon()).await.unwrap();
        assert!(created);
        assert_eq!(room, Room::new(salon()));

        let (_, created_again) = repo.insert_if_absent(&salon()).await.unwrap();
        assert!(!created_again);
    }

    #[tokio::test]
    async fn should_create_room_when_setting_state_of_unknown_room() {
        let repo = setup().await;

        let room = repo
            .set_state(&salon(), DeviceKind::Alarm, SwitchState::On)
            .await
            .unwrap();

        assert_eq!(room.alarm, SwitchState::On);
        assert_eq!(room.light, SwitchState::Unknown);
    }

    #[tokio::test]
    async fn should_only_update_requested_column() {
        let repo = setup().await;
        repo.set_state(&salon(), DeviceKind::Light, SwitchState::On)
            .await
            .unwrap();
        repo.set_state(&salon(), DeviceKind::Alarm, SwitchState::Off)
            .await
            .unwrap();

        let room = repo.get(&salon()).await.unwrap().unwrap();
        assert_eq!(room.light, SwitchState::On);
        assert_eq!(room.alarm, SwitchState::Off);
    }

    #[tokio::test]
    async fn should_keep_existing_state_when_inserting_existing_room() {
        let repo = setup().await;
        repo.set_state(&salon(), DeviceKind::Light, SwitchState::On)
            .await
            .unwrap();

        let (room, created) = repo.insert_if_absent(&salon()).await.unwrap();

        assert!(!created);
        assert_eq!(room.light, SwitchState::On);
    }

    #[tokio::test]
    async fn should_list_rooms_by_name() {
        let repo = setup().await;
        for name in ["salon", "cuisine", "chambre"] {
            repo.insert_if_absent(&RoomName::parse(name).unwrap())
                .await
                .unwrap();
        }

        let names: Vec<String> = repo
            .get_all()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name.to_string())
            .collect();
        assert_eq!(names, vec!["chambre", "cuisine", "salon"]);
    }

    #[tokio::test]
    async fn should_report_whether_room_was_deleted() {
        let repo = setup().await;
        repo.insert_if_absent(&salon()).await.unwrap();

        assert!(repo.delete(&salon()).await.unwrap());
        assert!(!repo.delete(&salon()).await.unwrap());
        assert!(repo.get(&salon()).await.unwrap().is_none());
    }
}
