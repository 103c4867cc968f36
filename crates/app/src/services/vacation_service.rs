//! Vacation mode — arm every sensor and fake presence with the lights.
//!
//! While active, each simulation tick picks a random known room and switches
//! its light on or off at random. Presenting a known card at the door leaves
//! vacation mode (see [`CardService`](super::card_service::CardService)).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rand::Rng;

use roomhub_domain::error::RoomHubError;
use roomhub_domain::event::{Event, EventType};
use roomhub_domain::room::{DeviceKind, RoomName};

use crate::ports::{DeviceHandler, EventPublisher, RoomRepository};
use crate::registry::DeviceRegistry;

/// Shared on/off flag, also cleared by the card reader.
#[derive(Debug, Default)]
pub struct VacationMode {
    active: AtomicBool,
}

impl VacationMode {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Returns `true` if the mode was off.
    pub fn activate(&self) -> bool {
        !self.active.swap(true, Ordering::SeqCst)
    }

    /// Returns `true` if the mode was on.
    pub fn deactivate(&self) -> bool {
        self.active.swap(false, Ordering::SeqCst)
    }
}

fn changed(active: bool) -> Event {
    Event::new(
        EventType::VacationModeChanged,
        None,
        serde_json::json!({ "active": active }),
    )
}

pub struct VacationService<R, D, P> {
    registry: Arc<DeviceRegistry<R>>,
    light: D,
    alarm: D,
    events: P,
    mode: Arc<VacationMode>,
}

impl<R, D, P> VacationService<R, D, P>
where
    R: RoomRepository + Send + Sync,
    D: DeviceHandler + Send + Sync,
    P: EventPublisher + Send + Sync,
{
    pub fn new(
        registry: Arc<DeviceRegistry<R>>,
        light: D,
        alarm: D,
        events: P,
        mode: Arc<VacationMode>,
    ) -> Self {
        Self {
            registry,
            light,
            alarm,
            events,
            mode,
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.mode.is_active()
    }

    /// Turn vacation mode on and ask every sensor to arm.
    ///
    /// Returns the number of rooms an arm command was published to; `0` if
    /// the mode was already on.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the rooms cannot be listed. Failing to
    /// command a single room is logged and does not abort the others.
    #[tracing::instrument(skip(self))]
    pub async fn activate(&self) -> Result<usize, RoomHubError> {
        if !self.mode.activate() {
            return Ok(0);
        }
        let rooms = self.registry.list().await?;
        let mut armed = 0;
        for room in &rooms {
            match self.alarm.issue_command(&room.name, true).await {
                Ok(()) => armed += 1,
                Err(err) => tracing::warn!(%err, room = %room.name, "failed to arm sensor"),
            }
        }
        tracing::info!(rooms = armed, "vacation mode on");
        self.events.publish(changed(true)).await?;
        Ok(armed)
    }

    /// Turn vacation mode off. Sensors are left as they are.
    ///
    /// # Errors
    ///
    /// Returns an error if the change event cannot be published.
    #[tracing::instrument(skip(self))]
    pub async fn deactivate(&self) -> Result<bool, RoomHubError> {
        if !self.mode.deactivate() {
            return Ok(false);
        }
        tracing::info!("vacation mode off");
        self.events.publish(changed(false)).await?;
        Ok(true)
    }

    /// Toggle one random room's light if vacation mode is on.
    ///
    /// Returns the room and the state asked for, or `None` when the mode is
    /// off or no room is known.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the rooms cannot be listed, or the error
    /// from publishing the light command.
    pub async fn simulate_with<G: Rng + Send>(
        &self,
        rng: &mut G,
    ) -> Result<Option<(RoomName, bool)>, RoomHubError> {
        if !self.mode.is_active() {
            return Ok(None);
        }
        let rooms = self.registry.list().await?;
        if rooms.is_empty() {
            return Ok(None);
        }
        let room = rooms[rng.random_range(0..rooms.len())].name.clone();
        let on = rng.random_bool(0.5);

        tracing::debug!(room = %room, on, "presence simulation");
        self.light.issue_command(&room, on).await?;
        Ok(Some((room, on)))
    }
}
