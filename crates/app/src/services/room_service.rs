//! Room service — explicit room lifecycle.
//!
//! Rooms are usually created implicitly by the first confirmation; this
//! service covers the deliberate paths. Deleting a room also deletes its
//! schedules and tells the devices on `{room}/remove`.

use std::sync::Arc;

use roomhub_domain::error::{NotFoundError, RoomHubError};
use roomhub_domain::event::{Event, EventType};
use roomhub_domain::room::{Room, RoomName};
use roomhub_domain::topic::removal_topic;

use crate::pending::PendingCommands;
use crate::ports::{CommandPublisher, EventPublisher, RoomRepository, ScheduleRepository};
use crate::registry::DeviceRegistry;

pub struct RoomService<R, S, B, P> {
    registry: Arc<DeviceRegistry<R>>,
    schedules: S,
    bus: B,
    events: P,
    pending: Arc<PendingCommands>,
}

impl<R, S, B, P> RoomService<R, S, B, P>
where
    R: RoomRepository + Send + Sync,
    S: ScheduleRepository + Send + Sync,
    B: CommandPublisher + Send + Sync,
    P: EventPublisher + Send + Sync,
{
    pub fn new(
        registry: Arc<DeviceRegistry<R>>,
        schedules: S,
        bus: B,
        events: P,
        pending: Arc<PendingCommands>,
    ) -> Self {
        Self {
            registry,
            schedules,
            bus,
            events,
            pending,
        }
    }

    /// Create a room with unknown devices. Creating an existing room returns
    /// it unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`RoomHubError::Validation`] for an invalid name, or a
    /// storage error propagated from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn create_room(&self, name: &str) -> Result<Room, RoomHubError> {
        let name = RoomName::parse(name)?;
        let (room, created) = self.registry.get_or_create(&name).await?;
        if created {
            self.events
                .publish(Event::for_room(
                    EventType::RoomCreated,
                    &name,
                    serde_json::json!({ "source": "service" }),
                ))
                .await?;
        }
        Ok(room)
    }

    /// Look up a room, returning an error if not found.
    ///
    /// # Errors
    ///
    /// Returns [`RoomHubError::NotFound`] when the room does not exist,
    /// or a storage error from the repository.
    pub async fn get_room(&self, name: &RoomName) -> Result<Room, RoomHubError> {
        self.registry.get(name).await?.ok_or_else(|| {
            NotFoundError {
                entity: "Room",
                id: name.to_string(),
            }
            .into()
        })
    }

    /// List all rooms.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_rooms(&self) -> Result<Vec<Room>, RoomHubError> {
        self.registry.list().await
    }

    /// Delete a room together with its schedules and announce the removal.
    ///
    /// # Errors
    ///
    /// Returns [`RoomHubError::NotFound`] when the room does not exist,
    /// a storage error from the repositories, or a bus error if the
    /// removal notice could not be published.
    #[tracing::instrument(skip(self), fields(room = %name))]
    pub async fn delete_room(&self, name: &RoomName) -> Result<(), RoomHubError> {
        self.get_room(name).await?;

        let schedules_removed = self.schedules.delete_by_room(name).await?;
        self.registry.remove(name).await?;
        self.pending.forget_room(name);
        tracing::info!(schedules_removed, "room deleted");

        self.bus.publish(removal_topic(name), Vec::new()).await?;
        self.events
            .publish(Event::for_room(
                EventType::RoomRemoved,
                name,
                serde_json::json!({ "schedules_removed": schedules_removed }),
            ))
            .await
    }
}
