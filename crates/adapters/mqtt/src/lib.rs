//! # roomhub-adapter-mqtt
//!
//! MQTT adapter — the device bus.
//!
//! ## Responsibilities
//! - Connect to the broker and subscribe to every topic
//! - Forward inbound publishes to the dispatcher over a bounded channel; when
//!   the dispatcher falls behind the network loop waits instead of dropping
//! - Implement [`CommandPublisher`] for outbound commands
//!
//! The router filters this process's own commands when they come back; the
//! adapter forwards everything it receives.
//!
//! ## Dependency rule
//! Same as other adapters: depends on `roomhub-app` and `roomhub-domain`.

pub mod config;
pub mod error;

use std::future::Future;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use roomhub_app::ports::CommandPublisher;
use roomhub_domain::error::RoomHubError;
use roomhub_domain::topic::SUBSCRIPTION;

pub use config::MqttConfig;
pub use error::MqttError;

const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// A message received from the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

fn options(config: &MqttConfig) -> MqttOptions {
    let mut options = MqttOptions::new(
        config.client_id.clone(),
        config.broker_host.clone(),
        config.broker_port,
    );
    options.set_keep_alive(Duration::from_secs(u64::from(config.keep_alive_secs)));
    options
}

fn into_inbound(event: Event) -> Option<InboundMessage> {
    match event {
        Event::Incoming(Packet::Publish(publish)) => Some(InboundMessage {
            topic: publish.topic,
            payload: publish.payload.to_vec(),
        }),
        _ => None,
    }
}

/// Handle to the broker connection.
#[derive(Clone)]
pub struct MqttBus {
    client: AsyncClient,
}

impl MqttBus {
    /// Create the client and spawn its network loop.
    ///
    /// Returns the bus handle, the receiving end of the inbound channel and
    /// the network loop's task. The loop subscribes on every (re)connection
    /// and ends once the receiver is dropped.
    #[must_use]
    pub fn connect(config: &MqttConfig) -> (Self, mpsc::Receiver<InboundMessage>, JoinHandle<()>) {
        let capacity = config.channel_capacity.max(1);
        let (client, eventloop) = AsyncClient::new(options(config), capacity);
        let (tx, rx) = mpsc::channel(capacity);

        tracing::info!(
            host = %config.broker_host,
            port = config.broker_port,
            client_id = %config.client_id,
            "connecting to MQTT broker"
        );
        let handle = tokio::spawn(run_eventloop(eventloop, client.clone(), tx));
        (Self { client }, rx, handle)
    }

    /// Ask the broker to close the session.
    ///
    /// # Errors
    ///
    /// Returns [`MqttError::Client`] if the network loop is already gone.
    pub async fn disconnect(&self) -> Result<(), MqttError> {
        self.client.disconnect().await.map_err(MqttError::Client)
    }
}

async fn forward(
    tx: &mpsc::Sender<InboundMessage>,
    message: InboundMessage,
) -> Result<(), MqttError> {
    if tx.capacity() == 0 {
        tracing::debug!(topic = %message.topic, "dispatcher busy, waiting");
    }
    tx.send(message).await.map_err(|_| MqttError::ChannelClosed)
}

async fn run_eventloop(
    mut eventloop: EventLoop,
    client: AsyncClient,
    tx: mpsc::Sender<InboundMessage>,
) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                tracing::info!("connected to MQTT broker");
                if let Err(err) = client.try_subscribe(SUBSCRIPTION, QoS::AtLeastOnce) {
                    tracing::error!(%err, "failed to subscribe");
                }
            }
            Ok(event) => {
                let Some(message) = into_inbound(event) else {
                    continue;
                };
                if let Err(err) = forward(&tx, message).await {
                    tracing::info!(%err, "stopping MQTT loop");
                    break;
                }
            }
            Err(err) => {
                tracing::warn!(%err, "MQTT connection error, retrying");
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

impl CommandPublisher for MqttBus {
    fn publish(
        &self,
        topic: String,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), RoomHubError>> + Send {
        let client = self.client.clone();
        async move {
            tracing::trace!(%topic, "publishing");
            client
                .publish(topic, QoS::AtLeastOnce, false, payload)
                .await
                .map_err(|err| MqttError::Client(err).into())
        }
    }
}
