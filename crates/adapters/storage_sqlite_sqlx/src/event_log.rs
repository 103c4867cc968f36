//! `SQLite` implementation of [`EventLog`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use roomhub_app::ports::EventLog;
use roomhub_domain::error::RoomHubError;
use roomhub_domain::event::{Event, EventType};
use roomhub_domain::id::EventId;
use roomhub_domain::room::RoomName;
use roomhub_domain::time::Timestamp;

use crate::error::StorageError;
use crate::{format_timestamp, parse_timestamp};

struct Wrapper(Event);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: uuid::Uuid = row.try_get("id")?;
        let event_type: String = row.try_get("event_type")?;
        let room: Option<String> = row.try_get("room")?;
        let timestamp: String = row.try_get("timestamp")?;
        let data_json: String = row.try_get("data")?;

        let event_type: EventType = serde_json::from_str(&format!("\"{event_type}\""))
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let room = room
            .map(RoomName::parse)
            .transpose()
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let data: serde_json::Value =
            serde_json::from_str(&data_json).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;

        Ok(Self(Event {
            id: EventId::from_uuid(id),
            event_type,
            room,
            timestamp: parse_timestamp(&timestamp)?,
            data,
        }))
    }
}

const INSERT: &str = r"
    INSERT INTO events (id, event_type, room, timestamp, data)
    VALUES (?, ?, ?, ?, ?)
";

const SELECT_RECENT: &str = "SELECT * FROM events ORDER BY timestamp DESC LIMIT ?";
const SELECT_BY_ROOM: &str =
    "SELECT * FROM events WHERE room = ? ORDER BY timestamp DESC LIMIT ?";
const DELETE_BEFORE: &str = "DELETE FROM events WHERE timestamp < ?";

/// `SQLite`-backed audit log.
pub struct SqliteEventLog {
    pool: SqlitePool,
}

impl SqliteEventLog {
    /// Create a new audit log using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn limit(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

impl EventLog for SqliteEventLog {
    async fn append(&self, event: Event) -> Result<(), RoomHubError> {
        let data_json = serde_json::to_string(&event.data).map_err(StorageError::from)?;

        sqlx::query(INSERT)
            .bind(event.id.as_uuid())
            .bind(event.event_type.as_str())
            .bind(event.room.as_ref().map(RoomName::as_str))
            .bind(format_timestamp(event.timestamp))
            .bind(data_json)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(())
    }

    async fn get_recent(&self, limit_to: usize) -> Result<Vec<Event>, RoomHubError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_RECENT)
            .bind(limit(limit_to))
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn find_by_room(
        &self,
        room: &RoomName,
        limit_to: usize,
    ) -> Result<Vec<Event>, RoomHubError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_BY_ROOM)
            .bind(room.as_str())
            .bind(limit(limit_to))
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn prune_before(&self, cutoff: Timestamp) -> Result<u64, RoomHubError> {
        let result = sqlx::query(DELETE_BEFORE)
            .bind(format_timestamp(cutoff))
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(result.rows_affected())
    }
}
