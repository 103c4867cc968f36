//! Schedule repository port — persistence for schedules.

use std::future::Future;

use chrono::NaiveTime;

use roomhub_domain::error::RoomHubError;
use roomhub_domain::id::ScheduleId;
use roomhub_domain::room::RoomName;
use roomhub_domain::schedule::{Schedule, ScheduleKind};

/// Repository for persisting and querying [`Schedule`]s.
pub trait ScheduleRepository {
    /// Create a new schedule in storage.
    fn create(
        &self,
        schedule: Schedule,
    ) -> impl Future<Output = Result<Schedule, RoomHubError>> + Send;

    /// Get a schedule by its unique identifier.
    fn get_by_id(
        &self,
        id: ScheduleId,
    ) -> impl Future<Output = Result<Option<Schedule>, RoomHubError>> + Send;

    /// Get all schedules.
    fn get_all(&self) -> impl Future<Output = Result<Vec<Schedule>, RoomHubError>> + Send;

    /// Get every schedule attached to a room.
    fn find_by_room(
        &self,
        room: &RoomName,
    ) -> impl Future<Output = Result<Vec<Schedule>, RoomHubError>> + Send;

    /// Get every schedule of one kind.
    fn find_by_kind(
        &self,
        kind: ScheduleKind,
    ) -> impl Future<Output = Result<Vec<Schedule>, RoomHubError>> + Send;

    /// Get punctual schedules whose time has the same hour and minute as `time`.
    fn find_punctual_at(
        &self,
        time: NaiveTime,
    ) -> impl Future<Output = Result<Vec<Schedule>, RoomHubError>> + Send;

    /// Delete a schedule. Returns whether it existed.
    fn delete(&self, id: ScheduleId) -> impl Future<Output = Result<bool, RoomHubError>> + Send;

    /// Delete every schedule of a room, returning how many were removed.
    fn delete_by_room(
        &self,
        room: &RoomName,
    ) -> impl Future<Output = Result<u64, RoomHubError>> + Send;
}

impl<T: ScheduleRepository + Send + Sync> ScheduleRepository for std::sync::Arc<T> {
    fn create(
        &self,
        schedule: Schedule,
    ) -> impl Future<Output = Result<Schedule, RoomHubError>> + Send {
        (**self).create(schedule)
    }

    fn get_by_id(
        &self,
        id: ScheduleId,
    ) -> impl Future<Output = Result<Option<Schedule>, RoomHubError>> + Send {
        (**self).get_by_id(id)
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<Schedule>, RoomHubError>> + Send {
        (**self).get_all()
    }

    fn find_by_room(
        &self,
        room: &RoomName,
    ) -> impl Future<Output = Result<Vec<Schedule>, RoomHubError>> + Send {
        (**self).find_by_room(room)
    }

    fn find_by_kind(
        &self,
        kind: ScheduleKind,
    ) -> impl Future<Output = Result<Vec<Schedule>, RoomHubError>> + Send {
        (**self).find_by_kind(kind)
    }

    fn find_punctual_at(
        &self,
        time: NaiveTime,
    ) -> impl Future<Output = Result<Vec<Schedule>, RoomHubError>> + Send {
        (**self).find_punctual_at(time)
    }

    fn delete(&self, id: ScheduleId) -> impl Future<Output = Result<bool, RoomHubError>> + Send {
        (**self).delete(id)
    }

    fn delete_by_room(
        &self,
        room: &RoomName,
    ) -> impl Future<Output = Result<u64, RoomHubError>> + Send {
        (**self).delete_by_room(room)
    }
}
