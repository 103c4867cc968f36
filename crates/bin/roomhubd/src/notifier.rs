//! Movement alerts written to the log.
//!
//! Push delivery to phones is out of reach of this daemon; the alert is
//! logged at `warn` so any log shipper can forward it.

use std::future::Future;

use roomhub_app::ports::Notifier;
use roomhub_domain::error::RoomHubError;
use roomhub_domain::room::RoomName;

#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn movement_alert(
        &self,
        room: &RoomName,
    ) -> impl Future<Output = Result<(), RoomHubError>> + Send {
        tracing::warn!(room = %room, "movement detected in armed room");
        async { Ok(()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn should_never_fail_to_alert() {
        let room = RoomName::parse("salon").unwrap();
        assert!(LogNotifier.movement_alert(&room).await.is_ok());
    }
}
