//! Device controller — the command/confirmation protocol for one device kind.
//!
//! ```text
//!  issue_command ──▶ {room}/{sub}/command ──▶ device
//!                                               │
//!  on_confirmation ◀── {room}/{sub}/confirmation ◀┘   SUCCESS → commit
//!                                                    ERROR   → log only
//! ```
//!
//! Commands never touch the registry. Only confirmations and manual events
//! move a device's state.

use std::sync::Arc;

use roomhub_domain::error::RoomHubError;
use roomhub_domain::event::{Event, EventType};
use roomhub_domain::payload::{CommandPayload, Confirmation, ManualEvent};
use roomhub_domain::room::{DeviceKind, RoomName, SwitchState};
use roomhub_domain::time::now;
use roomhub_domain::topic::command_topic;

use crate::pending::PendingCommands;
use crate::ports::{CommandPublisher, DeviceHandler, EventPublisher, Notifier, RoomRepository};
use crate::registry::{DeviceRegistry, Transition};

/// Where a committed state came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Confirmation,
    Manual,
}

impl Source {
    fn as_str(self) -> &'static str {
        match self {
            Self::Confirmation => "confirmation",
            Self::Manual => "manual",
        }
    }
}

fn wire_state(on: bool) -> &'static str {
    if on { "ON" } else { "OFF" }
}

pub struct DeviceController<R, B, N, P> {
    device: DeviceKind,
    registry: Arc<DeviceRegistry<R>>,
    bus: B,
    notifier: N,
    events: P,
    pending: Arc<PendingCommands>,
}

impl<R, B, N, P> DeviceController<R, B, N, P>
where
    R: RoomRepository + Send + Sync,
    B: CommandPublisher + Send + Sync,
    N: Notifier + Send + Sync,
    P: EventPublisher + Send + Sync,
{
    pub fn new(
        device: DeviceKind,
        registry: Arc<DeviceRegistry<R>>,
        bus: B,
        notifier: N,
        events: P,
        pending: Arc<PendingCommands>,
    ) -> Self {
        Self {
            device,
            registry,
            bus,
            notifier,
            events,
            pending,
        }
    }

    async fn emit(&self, event: Event) {
        let event_type = event.event_type;
        if let Err(err) = self.events.publish(event).await {
            tracing::warn!(%err, %event_type, "failed to publish domain event");
        }
    }

    async fn apply(&self, room: &RoomName, on: bool, source: Source) {
        match self.registry.commit(room, self.device, on).await {
            Ok(transition) => self.announce(&transition, source).await,
            Err(err) => {
                tracing::error!(
                    %err,
                    room = %room,
                    device = %self.device,
                    source = source.as_str(),
                    "failed to persist device state, update dropped"
                );
            }
        }
    }

    async fn announce(&self, transition: &Transition, source: Source) {
        let room = &transition.room;
        if transition.created {
            self.emit(Event::for_room(
                EventType::RoomCreated,
                room,
                serde_json::json!({ "source": source.as_str() }),
            ))
            .await;
        }
        if !transition.changed() {
            tracing::debug!(room = %room, device = %self.device, state = %transition.to, "state unchanged");
            return;
        }
        tracing::info!(
            room = %room,
            device = %self.device,
            from = %transition.from,
            to = %transition.to,
            source = source.as_str(),
            "device state changed"
        );
        self.emit(Event::for_room(
            EventType::StateChanged,
            room,
            serde_json::json!({
                "device": self.device.as_str(),
                "from": transition.from.as_str(),
                "to": transition.to.as_str(),
                "source": source.as_str(),
            }),
        ))
        .await;
    }

    async fn on_movement(&self, room: &RoomName, timestamp: Option<String>) {
        let armed = match self.registry.is_armed(room).await {
            Ok(armed) => armed,
            Err(err) => {
                tracing::error!(%err, room = %room, "failed to read detection state, movement dropped");
                return;
            }
        };
        let data = serde_json::json!({ "device_timestamp": timestamp });

        if !armed {
            tracing::debug!(room = %room, "movement while disarmed");
            self.emit(Event::for_room(EventType::MovementIgnored, room, data))
                .await;
            return;
        }

        tracing::warn!(room = %room, "movement detected in armed room");
        if let Err(err) = self.notifier.movement_alert(room).await {
            tracing::error!(%err, room = %room, "failed to send movement alert");
        }
        self.emit(Event::for_room(EventType::MovementDetected, room, data))
            .await;
    }
}

impl<R, B, N, P> DeviceHandler for DeviceController<R, B, N, P>
where
    R: RoomRepository + Send + Sync,
    B: CommandPublisher + Send + Sync,
    N: Notifier + Send + Sync,
    P: EventPublisher + Send + Sync,
{
    fn device(&self) -> DeviceKind {
        self.device
    }

    #[tracing::instrument(skip(self), fields(room = %room, device = %self.device))]
    async fn issue_command(&self, room: &RoomName, on: bool) -> Result<(), RoomHubError> {
        let payload = CommandPayload::new(self.device, on)
            .to_bytes()
            .map_err(|err| RoomHubError::Bus(Box::new(err)))?;
        self.bus
            .publish(command_topic(room, self.device), payload)
            .await?;

        let attempt = self.pending.record(room, self.device, on, now());
        tracing::debug!(state = wire_state(on), attempt, "command published");
        self.emit(Event::for_room(
            EventType::CommandIssued,
            room,
            serde_json::json!({
                "device": self.device.as_str(),
                "state": wire_state(on),
                "attempt": attempt,
            }),
        ))
        .await;
        Ok(())
    }

    async fn on_confirmation(&self, room: &RoomName, payload: &[u8]) {
        let confirmation = match Confirmation::parse(payload) {
            Ok(confirmation) => confirmation,
            Err(err) => {
                tracing::warn!(%err, room = %room, device = %self.device, "ignoring malformed confirmation");
                return;
            }
        };
        self.pending.resolve(room, self.device);

        match confirmation {
            Confirmation::Success { on } => self.apply(room, on, Source::Confirmation).await,
            Confirmation::Error { message, state } => {
                tracing::warn!(
                    room = %room,
                    device = %self.device,
                    error = %message,
                    "device reported an error, state left unchanged"
                );
                self.emit(Event::for_room(
                    EventType::CommandFailed,
                    room,
                    serde_json::json!({
                        "device": self.device.as_str(),
                        "reason": "device_error",
                        "error": message,
                        "reported": state.map(SwitchState::from_bool).map(SwitchState::as_str),
                    }),
                ))
                .await;
            }
        }
    }

    async fn on_manual_event(&self, room: &RoomName, payload: &[u8]) {
        let event = match ManualEvent::parse(payload) {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!(%err, room = %room, device = %self.device, "ignoring malformed device event");
                return;
            }
        };

        match event {
            ManualEvent::Changed { device, on } if device == self.device => {
                self.pending.resolve(room, self.device);
                self.apply(room, on, Source::Manual).await;
            }
            ManualEvent::Changed { device, .. } => {
                tracing::warn!(
                    room = %room,
                    expected = %self.device,
                    reported = %device,
                    "device event for another device kind, ignoring"
                );
            }
            ManualEvent::MovementDetected { timestamp } if self.device == DeviceKind::Alarm => {
                self.on_movement(room, timestamp).await;
            }
            ManualEvent::MovementDetected { .. } => {
                tracing::warn!(room = %room, device = %self.device, "movement reported on a non-sensor topic");
            }
        }
    }
}
