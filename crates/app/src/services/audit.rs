//! Audit recorder — persists every domain event off the hot path.

use chrono::TimeDelta;
use tokio::sync::broadcast::{self, error::RecvError};

use roomhub_domain::error::RoomHubError;
use roomhub_domain::event::Event;
use roomhub_domain::room::RoomName;
use roomhub_domain::time::Timestamp;

use crate::ports::EventLog;

pub struct AuditRecorder<L> {
    log: L,
}

impl<L: EventLog + Send + Sync> AuditRecorder<L> {
    pub fn new(log: L) -> Self {
        Self { log }
    }

    /// Append every event received on `rx` until the bus is closed.
    ///
    /// Append failures and lagging are logged; the loop keeps going.
    pub async fn run(&self, mut rx: broadcast::Receiver<Event>) {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let event_type = event.event_type;
                    if let Err(err) = self.log.append(event).await {
                        tracing::warn!(%err, %event_type, "failed to append event to audit log");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "audit recorder lagged, events lost");
                }
                Err(RecvError::Closed) => break,
            }
        }
        tracing::debug!("audit recorder stopped");
    }

    /// Delete events older than `retention` before `at`.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the log.
    #[tracing::instrument(skip(self))]
    pub async fn prune(&self, retention: TimeDelta, at: Timestamp) -> Result<u64, RoomHubError> {
        let removed = self.log.prune_before(at - retention).await?;
        if removed > 0 {
            tracing::info!(removed, "pruned audit log");
        }
        Ok(removed)
    }

    /// Most recent events, newest first.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the log.
    pub async fn recent(&self, limit: usize) -> Result<Vec<Event>, RoomHubError> {
        self.log.get_recent(limit).await
    }

    /// Most recent events about one room, newest first.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the log.
    pub async fn for_room(&self, room: &RoomName, limit: usize) -> Result<Vec<Event>, RoomHubError> {
        self.log.find_by_room(room, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::InProcessEventBus;
    use crate::ports::EventPublisher;
    use crate::testing::{InMemoryEventLog, room};
    use roomhub_domain::event::EventType;
    use roomhub_domain::time::now;
    use std::sync::Arc;

    #[tokio::test]
    async fn should_append_published_events_until_bus_closes() {
        let log = Arc::new(InMemoryEventLog::default());
        let recorder = AuditRecorder::new(Arc::clone(&log));
        let bus = InProcessEventBus::new(16);
        let rx = bus.subscribe();

        bus.publish(Event::for_room(
            EventType::RoomCreated,
            &room("salon"),
            serde_json::json!({}),
        ))
        .await
        .unwrap();
        bus.publish(Event::new(
            EventType::SensorsDisarmed,
            None,
            serde_json::json!({}),
        ))
        .await
        .unwrap();
        drop(bus);

        recorder.run(rx).await;

        let types: Vec<_> = log.events().into_iter().map(|e| e.event_type).collect();
        assert_eq!(types, vec![EventType::RoomCreated, EventType::SensorsDisarmed]);
    }

    #[tokio::test]
    async fn should_prune_events_older_than_retention() {
        let log = Arc::new(InMemoryEventLog::default());
        let recorder = AuditRecorder::new(Arc::clone(&log));
        let mut old = Event::new(EventType::StateChanged, None, serde_json::json!({}));
        old.timestamp = now() - TimeDelta::days(40);
        log.append(old).await.unwrap();
        log.append(Event::new(EventType::StateChanged, None, serde_json::json!({})))
            .await
            .unwrap();

        let removed = recorder.prune(TimeDelta::days(30), now()).await.unwrap();

        assert_eq!(removed, 1);
        assert_eq!(recorder.recent(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn should_filter_history_by_room() {
        let log = Arc::new(InMemoryEventLog::default());
        let recorder = AuditRecorder::new(Arc::clone(&log));
        for name in ["salon", "cuisine", "salon"] {
            log.append(Event::for_room(
                EventType::StateChanged,
                &room(name),
                serde_json::json!({}),
            ))
            .await
            .unwrap();
        }

        assert_eq!(recorder.for_room(&room("salon"), 10).await.unwrap().len(), 2);
        assert_eq!(recorder.for_room(&room("salon"), 1).await.unwrap().len(), 1);
    }
}
