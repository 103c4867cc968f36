//! Message bus port — outbound publishing towards devices.

use std::future::Future;

use roomhub_domain::error::RoomHubError;

/// Publishes raw payloads on the device bus.
///
/// Publishing is fire-and-forget: a successful return only means the client
/// accepted the message, not that any device received it.
pub trait CommandPublisher {
    fn publish(
        &self,
        topic: String,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), RoomHubError>> + Send;
}

impl<T: CommandPublisher + Send + Sync> CommandPublisher for std::sync::Arc<T> {
    fn publish(
        &self,
        topic: String,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), RoomHubError>> + Send {
        (**self).publish(topic, payload)
    }
}
