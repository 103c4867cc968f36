//! MQTT adapter error types.

use roomhub_domain::error::RoomHubError;

/// Errors specific to the MQTT adapter.
#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    /// The rumqttc client refused the request (event loop gone or queue full).
    #[error("MQTT client error")]
    Client(#[source] rumqttc::ClientError),

    /// The dispatcher side of the inbound channel was dropped.
    #[error("inbound channel closed")]
    ChannelClosed,
}

impl From<MqttError> for RoomHubError {
    fn from(err: MqttError) -> Self {
        RoomHubError::Bus(Box::new(err))
    }
}
