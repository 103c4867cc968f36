//! Schedule service — use-cases for the schedule store.

use std::sync::Arc;

use roomhub_domain::error::{NotFoundError, RoomHubError};
use roomhub_domain::id::ScheduleId;
use roomhub_domain::room::RoomName;
use roomhub_domain::schedule::Schedule;

use crate::ports::{RoomRepository, ScheduleRepository};
use crate::registry::DeviceRegistry;

/// Application service for schedule CRUD operations.
///
/// Schedules are immutable once stored; changing one means deleting it and
/// creating a new one.
pub struct ScheduleService<S, R> {
    repo: S,
    registry: Arc<DeviceRegistry<R>>,
}

impl<S, R> ScheduleService<S, R>
where
    S: ScheduleRepository + Send + Sync,
    R: RoomRepository + Send + Sync,
{
    /// Create a new service backed by the given repository.
    pub fn new(repo: S, registry: Arc<DeviceRegistry<R>>) -> Self {
        Self { repo, registry }
    }

    /// Store a new schedule for an existing room.
    ///
    /// # Errors
    ///
    /// Returns [`RoomHubError::Validation`] if invariants fail,
    /// [`RoomHubError::NotFound`] if the room does not exist, or a storage
    /// error propagated from the repository.
    #[tracing::instrument(skip(self, schedule), fields(room = %schedule.room, kind = schedule.kind().as_str()))]
    pub async fn create_schedule(&self, schedule: Schedule) -> Result<Schedule, RoomHubError> {
        schedule.validate()?;
        if self.registry.get(&schedule.room).await?.is_none() {
            return Err(NotFoundError {
                entity: "Room",
                id: schedule.room.to_string(),
            }
            .into());
        }
        self.repo.create(schedule).await
    }

    /// Look up a schedule by id, returning an error if not found.
    ///
    /// # Errors
    ///
    /// Returns [`RoomHubError::NotFound`] when no schedule with `id` exists,
    /// or a storage error from the repository.
    pub async fn get_schedule(&self, id: ScheduleId) -> Result<Schedule, RoomHubError> {
        self.repo.get_by_id(id).await?.ok_or_else(|| {
            NotFoundError {
                entity: "Schedule",
                id: id.to_string(),
            }
            .into()
        })
    }

    /// List all schedules.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_schedules(&self) -> Result<Vec<Schedule>, RoomHubError> {
        self.repo.get_all().await
    }

    /// List the schedules of one room.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_for_room(&self, room: &RoomName) -> Result<Vec<Schedule>, RoomHubError> {
        self.repo.find_by_room(room).await
    }

    /// Delete a schedule by id.
    ///
    /// # Errors
    ///
    /// Returns [`RoomHubError::NotFound`] when no schedule with `id` exists,
    /// or a storage error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn delete_schedule(&self, id: ScheduleId) -> Result<(), RoomHubError> {
        if self.repo.delete(id).await? {
            Ok(())
        } else {
            Err(NotFoundError {
                entity: "Schedule",
                id: id.to_string(),
            }
            .into())
        }
    }
}
