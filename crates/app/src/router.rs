//! Message router — classifies inbound bus traffic and hands it to the
//! right controller.
//!
//! Everything published by this process travels on the same bus, so the
//! router sees its own commands come back. Those are dropped before anything
//! else looks at them.

use roomhub_domain::room::DeviceKind;
use roomhub_domain::topic::{CardChannel, InboundKind, Topic};

use crate::ports::{CardHandler, DeviceHandler};

/// What the router did with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Self-issued traffic, dropped.
    Outbound,
    Confirmation(DeviceKind),
    Event(DeviceKind),
    Card(CardChannel),
    /// Understood but not handled (sound subsystem).
    Ignored,
    /// Topic could not be classified.
    Malformed,
}

pub struct MessageRouter<D, C> {
    light: D,
    alarm: D,
    cards: C,
}

impl<D, C> MessageRouter<D, C>
where
    D: DeviceHandler + Send + Sync,
    C: CardHandler + Send + Sync,
{
    /// Wire the router to one handler per device kind and the card reader.
    ///
    /// `light` and `alarm` must own [`DeviceKind::Light`] and
    /// [`DeviceKind::Alarm`] respectively.
    pub fn new(light: D, alarm: D, cards: C) -> Self {
        debug_assert_eq!(light.device(), DeviceKind::Light);
        debug_assert_eq!(alarm.device(), DeviceKind::Alarm);
        Self {
            light,
            alarm,
            cards,
        }
    }

    fn handler(&self, device: DeviceKind) -> &D {
        match device {
            DeviceKind::Light => &self.light,
            DeviceKind::Alarm => &self.alarm,
        }
    }

    /// Dispatch one inbound message. Never fails; handlers swallow their own
    /// payload errors.
    pub async fn route(&self, topic: &str, payload: &[u8]) -> Disposition {
        let parsed = match Topic::parse(topic) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::debug!(%err, topic, "dropping unroutable message");
                return Disposition::Malformed;
            }
        };

        match parsed {
            Topic::Outbound => {
                tracing::trace!(topic, "dropping self-issued message");
                Disposition::Outbound
            }
            Topic::Device {
                room,
                device,
                kind: InboundKind::Confirmation,
            } => {
                self.handler(device).on_confirmation(&room, payload).await;
                Disposition::Confirmation(device)
            }
            Topic::Device {
                room,
                device,
                kind: InboundKind::Event,
            } => {
                self.handler(device).on_manual_event(&room, payload).await;
                Disposition::Event(device)
            }
            Topic::Sound { room } => {
                tracing::debug!(room = %room, "sound subsystem message ignored");
                Disposition::Ignored
            }
            Topic::Card(channel) => {
                match channel {
                    CardChannel::Event => self.cards.on_card_event(payload).await,
                    CardChannel::Register => self.cards.on_registration_event(payload).await,
                }
                Disposition::Card(channel)
            }
        }
    }
}
