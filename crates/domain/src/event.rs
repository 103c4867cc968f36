//! Event — an immutable record of something that happened.
//!
//! Events are raised by controllers, the reconciler and the card reader
//! service, broadcast in-process and appended to the audit log.

use serde::{Deserialize, Serialize};

use crate::id::EventId;
use crate::room::RoomName;
use crate::time::{Timestamp, now};

/// Discriminant describing what happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A device's confirmed state changed in the registry.
    StateChanged,
    /// A command was published to a device.
    CommandIssued,
    /// A device reported an error, or a command was never confirmed.
    CommandFailed,
    /// Movement in an armed room; a notification was sent.
    MovementDetected,
    /// Movement in a disarmed room; recorded only.
    MovementIgnored,
    /// A schedule caused a command.
    ScheduleExecuted,
    RoomCreated,
    RoomRemoved,
    /// A known card disarmed every sensor.
    SensorsDisarmed,
    VacationModeChanged,
    CardRegistered,
}

impl EventType {
    /// Stable snake-case name used for storage.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StateChanged => "state_changed",
            Self::CommandIssued => "command_issued",
            Self::CommandFailed => "command_failed",
            Self::MovementDetected => "movement_detected",
            Self::MovementIgnored => "movement_ignored",
            Self::ScheduleExecuted => "schedule_executed",
            Self::RoomCreated => "room_created",
            Self::RoomRemoved => "room_removed",
            Self::SensorsDisarmed => "sensors_disarmed",
            Self::VacationModeChanged => "vacation_mode_changed",
            Self::CardRegistered => "card_registered",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A timestamped record, optionally scoped to a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub event_type: EventType,
    pub room: Option<RoomName>,
    pub timestamp: Timestamp,
    pub data: serde_json::Value,
}

impl Event {
    /// Create an event stamped with the current time.
    #[must_use]
    pub fn new(event_type: EventType, room: Option<RoomName>, data: serde_json::Value) -> Self {
        Self {
            id: EventId::new(),
            event_type,
            room,
            timestamp: now(),
            data,
        }
    }

    /// Shorthand for an event about one room.
    #[must_use]
    pub fn for_room(event_type: EventType, room: &RoomName, data: serde_json::Value) -> Self {
        Self::new(event_type, Some(room.clone()), data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_serialize_event_type_as_snake_case() {
        let json = serde_json::to_string(&EventType::MovementIgnored).unwrap();
        assert_eq!(json, "\"movement_ignored\"");
        assert_eq!(EventType::MovementIgnored.as_str(), "movement_ignored");
    }

    #[test]
    fn should_scope_event_to_room() {
        let room = RoomName::parse("salon").unwrap();
        let event = Event::for_room(
            EventType::StateChanged,
            &room,
            serde_json::json!({"device": "light", "from": "unknown", "to": "on"}),
        );
        assert_eq!(event.room, Some(room));
        assert_eq!(event.data["to"], "on");
    }
}
