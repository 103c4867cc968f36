//! Room — the unit every device and schedule is attached to.
//!
//! A room is identified by its name; there is no surrogate key. The name is
//! also the first segment of every bus topic addressing the room.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{RoomHubError, ValidationError};

/// First topic segment reserved for the card reader.
pub const CARD_READER_TOPIC: &str = "rfid";

/// Validated room name, safe to embed in a bus topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomName(String);

impl RoomName {
    /// Validate and wrap a room name.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyName`] for an empty name,
    /// [`ValidationError::InvalidRoomName`] when it contains `/`, `+` or `#`,
    /// and [`ValidationError::ReservedRoomName`] for the card reader segment.
    pub fn parse(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if value.contains(['/', '+', '#']) {
            return Err(ValidationError::InvalidRoomName);
        }
        if value == CARD_READER_TOPIC {
            return Err(ValidationError::ReservedRoomName(value));
        }
        Ok(Self(value))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RoomName {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<RoomName> for String {
    fn from(value: RoomName) -> Self {
        value.0
    }
}

impl AsRef<str> for RoomName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The kinds of device a room can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Light,
    /// Motion sensor; `On` means detection is armed.
    Alarm,
}

impl DeviceKind {
    pub const ALL: [Self; 2] = [Self::Light, Self::Alarm];

    /// Second topic segment used on the bus.
    #[must_use]
    pub fn subsystem(self) -> &'static str {
        match self {
            Self::Light => "lig",
            Self::Alarm => "mov",
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Alarm => "alarm",
        }
    }

    /// Inverse of [`as_str`](Self::as_str).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "light" => Some(Self::Light),
            "alarm" => Some(Self::Alarm),
            _ => None,
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Confirmed state of one device in one room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchState {
    /// Never confirmed by the device.
    #[default]
    Unknown,
    Off,
    On,
}

impl SwitchState {
    #[must_use]
    pub fn from_bool(on: bool) -> Self {
        if on { Self::On } else { Self::Off }
    }

    /// `None` while the state has never been confirmed.
    #[must_use]
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Self::Unknown => None,
            Self::Off => Some(false),
            Self::On => Some(true),
        }
    }

    /// Whether this state already equals `desired`. `Unknown` never does.
    #[must_use]
    pub fn satisfies(self, desired: bool) -> bool {
        self.as_bool() == Some(desired)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Off => "off",
            Self::On => "on",
        }
    }

    /// Inverse of [`as_str`](Self::as_str).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "unknown" => Some(Self::Unknown),
            "off" => Some(Self::Off),
            "on" => Some(Self::On),
            _ => None,
        }
    }
}

impl fmt::Display for SwitchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted view of a room's devices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub name: RoomName,
    pub light: SwitchState,
    pub alarm: SwitchState,
}

impl Room {
    /// A freshly created room whose devices have never reported.
    #[must_use]
    pub fn new(name: RoomName) -> Self {
        Self {
            name,
            light: SwitchState::Unknown,
            alarm: SwitchState::Unknown,
        }
    }

    /// Build a room from a raw name.
    ///
    /// # Errors
    ///
    /// Returns [`RoomHubError::Validation`] if the name is invalid.
    pub fn named(name: impl Into<String>) -> Result<Self, RoomHubError> {
        Ok(Self::new(RoomName::parse(name)?))
    }

    #[must_use]
    pub fn state(&self, kind: DeviceKind) -> SwitchState {
        match kind {
            DeviceKind::Light => self.light,
            DeviceKind::Alarm => self.alarm,
        }
    }

    pub fn set_state(&mut self, kind: DeviceKind, state: SwitchState) {
        match kind {
            DeviceKind::Light => self.light = state,
            DeviceKind::Alarm => self.alarm = state,
        }
    }

    /// Movement detection is armed only once the sensor confirmed `On`.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.alarm == SwitchState::On
    }
}
