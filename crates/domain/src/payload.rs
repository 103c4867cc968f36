//! JSON payloads exchanged with devices over the bus.

use serde::{Deserialize, Serialize};

use crate::room::DeviceKind;

/// Why a payload could not be understood.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("invalid JSON payload")]
    Json(#[from] serde_json::Error),

    #[error("payload is missing `{0}`")]
    MissingField(&'static str),

    #[error("unknown event `{0}`")]
    UnknownEvent(String),
}

/// On/off as spelled on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WireState {
    On,
    Off,
}

impl From<bool> for WireState {
    fn from(on: bool) -> Self {
        if on { Self::On } else { Self::Off }
    }
}

impl From<WireState> for bool {
    fn from(state: WireState) -> Self {
        matches!(state, WireState::On)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandName {
    SetLight,
    SetAlarm,
}

/// Outbound `{"command": "SET_LIGHT", "state": "ON"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandPayload {
    pub command: CommandName,
    pub state: WireState,
}

impl CommandPayload {
    #[must_use]
    pub fn new(device: DeviceKind, on: bool) -> Self {
        let command = match device {
            DeviceKind::Light => CommandName::SetLight,
            DeviceKind::Alarm => CommandName::SetAlarm,
        };
        Self {
            command,
            state: on.into(),
        }
    }

    /// Serialize for publishing.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::Json`] if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, PayloadError> {
        Ok(serde_json::to_vec(self)?)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
enum Status {
    Success,
    Error,
}

#[derive(Debug, Deserialize)]
struct RawConfirmation {
    status: Status,
    state: Option<WireState>,
    error: Option<String>,
}

/// Device acknowledgement of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    /// The hardware now reports `on`.
    Success { on: bool },
    /// The device refused or failed; `state` is whatever it echoed back.
    Error { message: String, state: Option<bool> },
}

impl Confirmation {
    /// Parse `{"status": "SUCCESS"|"ERROR", "state"?: "ON"|"OFF", "error"?: string}`.
    ///
    /// # Errors
    ///
    /// Returns a [`PayloadError`] for invalid JSON or a success without state.
    pub fn parse(payload: &[u8]) -> Result<Self, PayloadError> {
        let raw: RawConfirmation = serde_json::from_slice(payload)?;
        match raw.status {
            Status::Success => raw
                .state
                .map(|state| Self::Success { on: state.into() })
                .ok_or(PayloadError::MissingField("state")),
            Status::Error => Ok(Self::Error {
                message: raw.error.unwrap_or_else(|| "unspecified device error".to_string()),
                state: raw.state.map(Into::into),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawManualEvent {
    event: String,
    state: Option<WireState>,
    timestamp: Option<String>,
}

/// Unsolicited device report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManualEvent {
    /// Physical toggle of a device (`LIGHT_CHANGED` / `ALARM_CHANGED`).
    Changed { device: DeviceKind, on: bool },
    /// Motion sensor trigger; the timestamp is the device's own clock.
    MovementDetected { timestamp: Option<String> },
}

impl ManualEvent {
    /// Parse a manual-event payload.
    ///
    /// # Errors
    ///
    /// Returns a [`PayloadError`] for invalid JSON, an unknown event name or
    /// a change event without state.
    pub fn parse(payload: &[u8]) -> Result<Self, PayloadError> {
        let raw: RawManualEvent = serde_json::from_slice(payload)?;
        let device = match raw.event.as_str() {
            "MOVEMENT_DETECTED" => {
                return Ok(Self::MovementDetected {
                    timestamp: raw.timestamp,
                });
            }
            "LIGHT_CHANGED" => DeviceKind::Light,
            "ALARM_CHANGED" => DeviceKind::Alarm,
            other => return Err(PayloadError::UnknownEvent(other.to_string())),
        };
        let state = raw.state.ok_or(PayloadError::MissingField("state"))?;
        Ok(Self::Changed {
            device,
            on: state.into(),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCardEvent {
    event: String,
    card_id: Option<String>,
}

/// Card reader report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardEvent {
    /// A card was presented at the door.
    Detected { card_id: String },
    /// A card was captured for the pending registration.
    Captured { card_id: String },
    /// The reader abandoned the capture.
    CaptureCancelled,
}

impl CardEvent {
    /// Parse a card reader payload.
    ///
    /// # Errors
    ///
    /// Returns a [`PayloadError`] for invalid JSON, an unknown event name or
    /// a missing `cardId`.
    pub fn parse(payload: &[u8]) -> Result<Self, PayloadError> {
        let raw: RawCardEvent = serde_json::from_slice(payload)?;
        let card_id = || raw.card_id.clone().ok_or(PayloadError::MissingField("cardId"));
        match raw.event.as_str() {
            "RFID_DETECTED" => Ok(Self::Detected { card_id: card_id()? }),
            "RFID_REGISTER" => Ok(Self::Captured { card_id: card_id()? }),
            "RFID_REGISTER_CANCEL" => Ok(Self::CaptureCancelled),
            other => Err(PayloadError::UnknownEvent(other.to_string())),
        }
    }
}
