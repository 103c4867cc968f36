//! Notification port — alerts pushed to the household's phones.

use std::future::Future;

use roomhub_domain::error::RoomHubError;
use roomhub_domain::room::RoomName;

/// Delivers user-facing alerts.
pub trait Notifier {
    /// Warn that movement was detected in an armed room.
    fn movement_alert(&self, room: &RoomName)
    -> impl Future<Output = Result<(), RoomHubError>> + Send;
}

impl<T: Notifier + Send + Sync> Notifier for std::sync::Arc<T> {
    fn movement_alert(
        &self,
        room: &RoomName,
    ) -> impl Future<Output = Result<(), RoomHubError>> + Send {
        (**self).movement_alert(room)
    }
}
