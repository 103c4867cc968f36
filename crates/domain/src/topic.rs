//! Bus topic grammar.
//!
//! ```text
//! {room}/{subsystem}/{kind}     kind ∈ event | confirmation | command
//! {room}/{subsystem}            implicit event
//! rfid/{event|register}         card reader traffic
//! rfid/command/{START|CANCEL}   outbound card reader commands
//! {room}/remove                 outbound room removal notice
//! ```

use crate::error::ValidationError;
use crate::room::{CARD_READER_TOPIC, DeviceKind, RoomName};

const COMMAND: &str = "command";
const EVENT: &str = "event";
const CONFIRMATION: &str = "confirmation";
const REGISTER: &str = "register";
const REMOVE: &str = "remove";
const SOUND: &str = "sou";

/// Subscription filter covering every topic the router understands.
pub const SUBSCRIPTION: &str = "#";

/// Outbound topic asking the card reader to capture a card for registration.
pub const CARD_START_TOPIC: &str = "rfid/command/START";

/// Outbound topic aborting a card capture.
pub const CARD_CANCEL_TOPIC: &str = "rfid/command/CANCEL";

/// Inbound message kinds a device controller handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundKind {
    /// Unsolicited physical change or sensor reading.
    Event,
    /// Outcome of a previously issued command.
    Confirmation,
}

/// Card reader channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardChannel {
    Event,
    Register,
}

/// Classified bus topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Topic {
    /// Traffic this process publishes itself (commands, removal notices).
    Outbound,
    Device {
        room: RoomName,
        device: DeviceKind,
        kind: InboundKind,
    },
    /// Sound subsystem traffic; accepted but not handled.
    Sound { room: RoomName },
    Card(CardChannel),
}

/// Why a topic could not be classified.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopicError {
    #[error("topic has no room segment")]
    MissingRoom,

    #[error("topic has no subsystem segment")]
    MissingSubsystem,

    #[error("invalid room segment")]
    InvalidRoom(#[source] ValidationError),

    #[error("unknown subsystem `{0}`")]
    UnknownSubsystem(String),

    #[error("unknown message kind `{0}`")]
    UnknownKind(String),
}

impl Topic {
    /// Classify a raw topic.
    ///
    /// A `command` kind is recognised before anything else is validated, so a
    /// command echo is never mistaken for inbound state.
    ///
    /// # Errors
    ///
    /// Returns a [`TopicError`] when the topic is malformed or names an
    /// unknown subsystem or kind.
    pub fn parse(topic: &str) -> Result<Self, TopicError> {
        let mut segments = topic.split('/');
        let room = segments.next().unwrap_or_default();
        let subsystem = segments.next();
        let kind = segments.next();

        if kind == Some(COMMAND) {
            return Ok(Self::Outbound);
        }
        if room.is_empty() {
            return Err(TopicError::MissingRoom);
        }
        let subsystem = match subsystem {
            Some(s) if !s.is_empty() => s,
            _ => return Err(TopicError::MissingSubsystem),
        };

        if room == CARD_READER_TOPIC {
            return match subsystem {
                COMMAND => Ok(Self::Outbound),
                EVENT => Ok(Self::Card(CardChannel::Event)),
                REGISTER => Ok(Self::Card(CardChannel::Register)),
                other => Err(TopicError::UnknownSubsystem(other.to_string())),
            };
        }
        if subsystem == REMOVE && kind.is_none() {
            return Ok(Self::Outbound);
        }

        let room = RoomName::parse(room).map_err(TopicError::InvalidRoom)?;
        let kind = match kind {
            None | Some(EVENT) => InboundKind::Event,
            Some(CONFIRMATION) => InboundKind::Confirmation,
            Some(other) => return Err(TopicError::UnknownKind(other.to_string())),
        };

        match subsystem {
            SOUND => Ok(Self::Sound { room }),
            other => DeviceKind::ALL
                .into_iter()
                .find(|device| device.subsystem() == other)
                .map(|device| Self::Device { room, device, kind })
                .ok_or_else(|| TopicError::UnknownSubsystem(other.to_string())),
        }
    }
}

/// Topic a device command is published to.
#[must_use]
pub fn command_topic(room: &RoomName, device: DeviceKind) -> String {
    format!("{room}/{}/{COMMAND}", device.subsystem())
}

/// Topic announcing that a room was removed.
#[must_use]
pub fn removal_topic(room: &RoomName) -> String {
    format!("{room}/{REMOVE}")
}
