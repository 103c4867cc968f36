//! Inbound seams between the router / reconciler and the device logic.
//!
//! The router only needs "hand this payload to whoever owns the light", and
//! the reconciler only needs "ask the light to turn on". Keeping those as
//! traits lets both be exercised against spies.

use std::future::Future;

use roomhub_domain::error::RoomHubError;
use roomhub_domain::room::{DeviceKind, RoomName};

/// Command/confirmation endpoint for one kind of device.
pub trait DeviceHandler {
    /// The device kind this handler owns.
    fn device(&self) -> DeviceKind;

    /// Publish a command asking the device in `room` to switch to `on`.
    fn issue_command(
        &self,
        room: &RoomName,
        on: bool,
    ) -> impl Future<Output = Result<(), RoomHubError>> + Send;

    /// Handle a `{room}/{subsystem}/confirmation` payload. Never fails.
    fn on_confirmation(&self, room: &RoomName, payload: &[u8]) -> impl Future<Output = ()> + Send;

    /// Handle a `{room}/{subsystem}/event` payload. Never fails.
    fn on_manual_event(&self, room: &RoomName, payload: &[u8]) -> impl Future<Output = ()> + Send;
}

impl<T: DeviceHandler + Send + Sync> DeviceHandler for std::sync::Arc<T> {
    fn device(&self) -> DeviceKind {
        (**self).device()
    }

    fn issue_command(
        &self,
        room: &RoomName,
        on: bool,
    ) -> impl Future<Output = Result<(), RoomHubError>> + Send {
        (**self).issue_command(room, on)
    }

    fn on_confirmation(&self, room: &RoomName, payload: &[u8]) -> impl Future<Output = ()> + Send {
        (**self).on_confirmation(room, payload)
    }

    fn on_manual_event(&self, room: &RoomName, payload: &[u8]) -> impl Future<Output = ()> + Send {
        (**self).on_manual_event(room, payload)
    }
}

/// Endpoint for card reader traffic.
pub trait CardHandler {
    /// Handle an `rfid/event` payload (a card presented at the door).
    fn on_card_event(&self, payload: &[u8]) -> impl Future<Output = ()> + Send;

    /// Handle an `rfid/register` payload (registration capture outcome).
    fn on_registration_event(&self, payload: &[u8]) -> impl Future<Output = ()> + Send;
}

impl<T: CardHandler + Send + Sync> CardHandler for std::sync::Arc<T> {
    fn on_card_event(&self, payload: &[u8]) -> impl Future<Output = ()> + Send {
        (**self).on_card_event(payload)
    }

    fn on_registration_event(&self, payload: &[u8]) -> impl Future<Output = ()> + Send {
        (**self).on_registration_event(payload)
    }
}
