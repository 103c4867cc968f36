//! Device registry — the single owner of confirmed device state.
//!
//! Every write goes through [`DeviceRegistry::commit`], which serializes
//! read-modify-write per `(room, device)` pair. Two confirmations for the same
//! light can race on the bus; they cannot interleave here.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use roomhub_domain::error::RoomHubError;
use roomhub_domain::room::{DeviceKind, Room, RoomName, SwitchState};

use crate::ports::RoomRepository;

type SlotLock = Arc<tokio::sync::Mutex<()>>;

/// Result of committing a confirmed state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub room: RoomName,
    pub device: DeviceKind,
    pub from: SwitchState,
    pub to: SwitchState,
    /// The room did not exist before this commit.
    pub created: bool,
}

impl Transition {
    #[must_use]
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

pub struct DeviceRegistry<R> {
    repo: R,
    slots: Mutex<HashMap<(RoomName, DeviceKind), SlotLock>>,
}

impl<R: RoomRepository> DeviceRegistry<R> {
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, room: &RoomName, device: DeviceKind) -> SlotLock {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry((room.clone(), device)).or_default())
    }

    /// Look up a room without creating it.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn get(&self, room: &RoomName) -> Result<Option<Room>, RoomHubError> {
        self.repo.get(room).await
    }

    /// List every known room.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list(&self) -> Result<Vec<Room>, RoomHubError> {
        self.repo.get_all().await
    }

    /// Confirmed state of one device; `Unknown` when the room does not exist.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn state_of(
        &self,
        room: &RoomName,
        device: DeviceKind,
    ) -> Result<SwitchState, RoomHubError> {
        Ok(self
            .repo
            .get(room)
            .await?
            .map_or(SwitchState::Unknown, |r| r.state(device)))
    }

    /// The one place rooms are created implicitly.
    ///
    /// Returns the room and whether this call created it.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    #[tracing::instrument(skip(self), fields(room = %room))]
    pub async fn get_or_create(&self, room: &RoomName) -> Result<(Room, bool), RoomHubError> {
        let (stored, created) = self.repo.insert_if_absent(room).await?;
        if created {
            tracing::info!("room created");
        }
        Ok((stored, created))
    }

    /// Record a confirmed state for one device, creating the room if needed.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository. Nothing is
    /// retried; the caller decides whether the failure matters.
    pub async fn commit(
        &self,
        room: &RoomName,
        device: DeviceKind,
        on: bool,
    ) -> Result<Transition, RoomHubError> {
        let slot = self.slot(room, device);
        let _guard = slot.lock().await;

        let (current, created) = self.get_or_create(room).await?;
        let updated = self
            .repo
            .set_state(room, device, SwitchState::from_bool(on))
            .await?;

        Ok(Transition {
            room: room.clone(),
            device,
            from: current.state(device),
            to: updated.state(device),
            created,
        })
    }

    /// Whether movement detection is armed in `room`. Unknown rooms are not.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn is_armed(&self, room: &RoomName) -> Result<bool, RoomHubError> {
        Ok(self.repo.get(room).await?.is_some_and(|r| r.is_armed()))
    }

    /// Forget a room entirely. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn remove(&self, room: &RoomName) -> Result<bool, RoomHubError> {
        let existed = self.repo.delete(room).await?;
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(name, _), _| name != room);
        Ok(existed)
    }
}
