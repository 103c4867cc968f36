//! Room repository port — persisted device state per room.

use std::future::Future;

use roomhub_domain::error::RoomHubError;
use roomhub_domain::room::{DeviceKind, Room, RoomName, SwitchState};

/// Repository for persisting and querying [`Room`]s.
pub trait RoomRepository {
    /// Get a room by name.
    fn get(
        &self,
        name: &RoomName,
    ) -> impl Future<Output = Result<Option<Room>, RoomHubError>> + Send;

    /// Get all rooms, ordered by name.
    fn get_all(&self) -> impl Future<Output = Result<Vec<Room>, RoomHubError>> + Send;

    /// Insert a room with unknown devices unless one already exists.
    ///
    /// Returns the stored room and whether it was created by this call.
    fn insert_if_absent(
        &self,
        name: &RoomName,
    ) -> impl Future<Output = Result<(Room, bool), RoomHubError>> + Send;

    /// Write one device's state, leaving the other devices untouched.
    fn set_state(
        &self,
        name: &RoomName,
        device: DeviceKind,
        state: SwitchState,
    ) -> impl Future<Output = Result<Room, RoomHubError>> + Send;

    /// Delete a room. Returns whether it existed.
    fn delete(&self, name: &RoomName) -> impl Future<Output = Result<bool, RoomHubError>> + Send;
}

impl<T: RoomRepository + Send + Sync> RoomRepository for std::sync::Arc<T> {
    fn get(
        &self,
        name: &RoomName,
    ) -> impl Future<Output = Result<Option<Room>, RoomHubError>> + Send {
        (**self).get(name)
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<Room>, RoomHubError>> + Send {
        (**self).get_all()
    }

    fn insert_if_absent(
        &self,
        name: &RoomName,
    ) -> impl Future<Output = Result<(Room, bool), RoomHubError>> + Send {
        (**self).insert_if_absent(name)
    }

    fn set_state(
        &self,
        name: &RoomName,
        device: DeviceKind,
        state: SwitchState,
    ) -> impl Future<Output = Result<Room, RoomHubError>> + Send {
        (**self).set_state(name, device, state)
    }

    fn delete(&self, name: &RoomName) -> impl Future<Output = Result<bool, RoomHubError>> + Send {
        (**self).delete(name)
    }
}
