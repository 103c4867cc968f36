//! Audit log port — persistence for domain events.

use std::future::Future;

use roomhub_domain::error::RoomHubError;
use roomhub_domain::event::Event;
use roomhub_domain::room::RoomName;
use roomhub_domain::time::Timestamp;

/// Append-only store of [`Event`]s.
pub trait EventLog {
    /// Persist a new event.
    fn append(&self, event: Event) -> impl Future<Output = Result<(), RoomHubError>> + Send;

    /// Get the most recent events, ordered newest-first.
    fn get_recent(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Event>, RoomHubError>> + Send;

    /// Find events about one room, ordered newest-first.
    fn find_by_room(
        &self,
        room: &RoomName,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Event>, RoomHubError>> + Send;

    /// Delete events older than `cutoff`, returning how many were removed.
    fn prune_before(
        &self,
        cutoff: Timestamp,
    ) -> impl Future<Output = Result<u64, RoomHubError>> + Send;
}

impl<T: EventLog + Send + Sync> EventLog for std::sync::Arc<T> {
    fn append(&self, event: Event) -> impl Future<Output = Result<(), RoomHubError>> + Send {
        (**self).append(event)
    }

    fn get_recent(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Event>, RoomHubError>> + Send {
        (**self).get_recent(limit)
    }

    fn find_by_room(
        &self,
        room: &RoomName,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Event>, RoomHubError>> + Send {
        (**self).find_by_room(room, limit)
    }

    fn prune_before(
        &self,
        cutoff: Timestamp,
    ) -> impl Future<Output = Result<u64, RoomHubError>> + Send {
        (**self).prune_before(cutoff)
    }
}
