//! Card reader service — door access and card registration.
//!
//! A known card presented at the door disarms every sensor and ends vacation
//! mode. Registration binds the next card the reader captures to one user;
//! only one capture can be in flight, and it expires.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::TimeDelta;

use roomhub_domain::error::RoomHubError;
use roomhub_domain::event::{Event, EventType};
use roomhub_domain::payload::CardEvent;
use roomhub_domain::registration::{Capture, CardRegistration, RegistrationRequest};
use roomhub_domain::time::{Timestamp, now};
use roomhub_domain::topic::{CARD_CANCEL_TOPIC, CARD_START_TOPIC};

use crate::ports::{
    CardDirectory, CardHandler, CommandPublisher, DeviceHandler, EventPublisher, RoomRepository,
};
use crate::registry::DeviceRegistry;
use crate::services::vacation_service::VacationMode;

pub struct CardService<R, B, D, C, P> {
    registry: Arc<DeviceRegistry<R>>,
    bus: B,
    alarm: D,
    directory: C,
    events: P,
    vacation: Arc<VacationMode>,
    registration: Mutex<CardRegistration>,
    ttl: TimeDelta,
}

impl<R, B, D, C, P> CardService<R, B, D, C, P>
where
    R: RoomRepository + Send + Sync,
    B: CommandPublisher + Send + Sync,
    D: DeviceHandler + Send + Sync,
    C: CardDirectory + Send + Sync,
    P: EventPublisher + Send + Sync,
{
    pub fn new(
        registry: Arc<DeviceRegistry<R>>,
        bus: B,
        alarm: D,
        directory: C,
        events: P,
        vacation: Arc<VacationMode>,
        ttl: TimeDelta,
    ) -> Self {
        Self {
            registry,
            bus,
            alarm,
            directory,
            events,
            vacation,
            registration: Mutex::new(CardRegistration::default()),
            ttl,
        }
    }

    fn registration(&self) -> MutexGuard<'_, CardRegistration> {
        self.registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    async fn emit(&self, event: Event) {
        if let Err(err) = self.events.publish(event).await {
            tracing::warn!(%err, "failed to publish card reader event");
        }
    }

    /// The capture currently waiting for a card, if any.
    #[must_use]
    pub fn pending_registration(&self) -> Option<RegistrationRequest> {
        self.registration().pending().cloned()
    }

    /// Ask the reader to capture the next card for `username`.
    ///
    /// # Errors
    ///
    /// Returns [`RoomHubError::Conflict`] while another user's capture is
    /// in flight, or a bus error if the reader could not be told.
    #[tracing::instrument(skip(self))]
    pub async fn start_registration(
        &self,
        username: &str,
    ) -> Result<RegistrationRequest, RoomHubError> {
        let request = self.registration().start(username, now(), self.ttl)?;
        self.bus
            .publish(CARD_START_TOPIC.to_string(), Vec::new())
            .await?;
        tracing::info!(request_id = %request.id, expires_at = %request.expires_at, "waiting for card");
        Ok(request)
    }

    /// Abort `username`'s capture. Returns `false` if they had none.
    ///
    /// # Errors
    ///
    /// Returns a bus error if the reader could not be told.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_registration(&self, username: &str) -> Result<bool, RoomHubError> {
        let cancelled = self.registration().cancel(Some(username));
        if cancelled.is_none() {
            return Ok(false);
        }
        self.bus
            .publish(CARD_CANCEL_TOPIC.to_string(), Vec::new())
            .await?;
        Ok(true)
    }

    /// Drop a capture whose deadline passed and tell the reader to stop.
    ///
    /// # Errors
    ///
    /// Returns a bus error if the reader could not be told.
    pub async fn expire_registration(
        &self,
        at: Timestamp,
    ) -> Result<Option<RegistrationRequest>, RoomHubError> {
        let expired = self.registration().expire(at);
        if let Some(request) = &expired {
            tracing::info!(request_id = %request.id, username = %request.username, "card registration expired");
            self.bus
                .publish(CARD_CANCEL_TOPIC.to_string(), Vec::new())
                .await?;
        }
        Ok(expired)
    }

    /// Disarm the sensor of every known room and leave vacation mode.
    ///
    /// Returns the number of rooms a disarm command was published to.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the rooms cannot be listed.
    #[tracing::instrument(skip(self))]
    pub async fn disarm_all(&self, username: Option<&str>) -> Result<usize, RoomHubError> {
        let rooms = self.registry.list().await?;
        let mut disarmed = 0;
        for room in &rooms {
            match self.alarm.issue_command(&room.name, false).await {
                Ok(()) => disarmed += 1,
                Err(err) => tracing::warn!(%err, room = %room.name, "failed to disarm sensor"),
            }
        }
        if self.vacation.deactivate() {
            self.emit(Event::new(
                EventType::VacationModeChanged,
                None,
                serde_json::json!({ "active": false, "by": username }),
            ))
            .await;
        }
        self.emit(Event::new(
            EventType::SensorsDisarmed,
            None,
            serde_json::json!({ "rooms": disarmed, "by": username }),
        ))
        .await;
        Ok(disarmed)
    }

    async fn bind(&self, request: RegistrationRequest, card_id: String) {
        match self.directory.bind_card(&request.username, &card_id).await {
            Ok(true) => {
                tracing::info!(username = %request.username, "card registered");
                self.emit(Event::new(
                    EventType::CardRegistered,
                    None,
                    serde_json::json!({ "username": request.username, "card_id": card_id }),
                ))
                .await;
            }
            Ok(false) => {
                tracing::warn!(username = %request.username, "card captured for unknown user");
            }
            Err(err) => {
                tracing::error!(%err, username = %request.username, "failed to store card binding");
            }
        }
    }
}

impl<R, B, D, C, P> CardHandler for CardService<R, B, D, C, P>
where
    R: RoomRepository + Send + Sync,
    B: CommandPublisher + Send + Sync,
    D: DeviceHandler + Send + Sync,
    C: CardDirectory + Send + Sync,
    P: EventPublisher + Send + Sync,
{
    async fn on_card_event(&self, payload: &[u8]) {
        let card_id = match CardEvent::parse(payload) {
            Ok(CardEvent::Detected { card_id }) => card_id,
            Ok(other) => {
                tracing::warn!(?other, "unexpected event on card reader channel");
                return;
            }
            Err(err) => {
                tracing::warn!(%err, "ignoring malformed card event");
                return;
            }
        };

        let user = match self.directory.find_user_by_card(&card_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                tracing::warn!(%card_id, "unknown card presented");
                return;
            }
            Err(err) => {
                tracing::error!(%err, "failed to look up card");
                return;
            }
        };

        tracing::info!(username = %user, "known card presented, disarming");
        if let Err(err) = self.disarm_all(Some(&user)).await {
            tracing::error!(%err, "failed to disarm sensors");
        }
    }

    async fn on_registration_event(&self, payload: &[u8]) {
        let event = match CardEvent::parse(payload) {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!(%err, "ignoring malformed registration event");
                return;
            }
        };

        match event {
            CardEvent::Captured { card_id } => {
                let capture = self.registration().capture(now());
                match capture {
                    Capture::Matched(request) => self.bind(request, card_id).await,
                    Capture::Expired(request) => {
                        tracing::warn!(username = %request.username, "card arrived after registration expired");
                    }
                    Capture::Unsolicited => {
                        tracing::warn!("card captured while no registration was pending");
                    }
                }
            }
            CardEvent::CaptureCancelled => {
                if let Some(request) = self.registration().cancel(None) {
                    tracing::info!(username = %request.username, "reader cancelled card registration");
                }
            }
            CardEvent::Detected { .. } => {
                tracing::warn!("card detection reported on registration channel");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::DeviceController;
    use crate::pending::PendingCommands;
    use crate::testing::{
        InMemoryCardDirectory, InMemoryRoomRepo, RecordingBus, SpyNotifier, SpyPublisher, room,
    };
    use roomhub_domain::room::{DeviceKind, Room, SwitchState};

    type Alarm = Arc<
        DeviceController<
            Arc<InMemoryRoomRepo>,
            Arc<RecordingBus>,
            Arc<SpyNotifier>,
            Arc<SpyPublisher>,
        >,
    >;

    type TestService = CardService<
        Arc<InMemoryRoomRepo>,
        Arc<RecordingBus>,
        Alarm,
        Arc<InMemoryCardDirectory>,
        Arc<SpyPublisher>,
    >;

    struct Fixture {
        bus: Arc<RecordingBus>,
        directory: Arc<InMemoryCardDirectory>,
        events: Arc<SpyPublisher>,
        vacation: Arc<VacationMode>,
        service: TestService,
    }

    fn fixture() -> Fixture {
        let armed = |name: &str| Room {
            name: room(name),
            light: SwitchState::Off,
            alarm: SwitchState::On,
        };
        let repo = Arc::new(InMemoryRoomRepo::with_rooms([armed("salon"), armed("cuisine")]));
        let registry = Arc::new(DeviceRegistry::new(repo));
        let bus = Arc::new(RecordingBus::default());
        let events = Arc::new(SpyPublisher::default());
        let directory = Arc::new(
            InMemoryCardDirectory::default()
                .with_user("alice", Some("04A1"))
                .with_user("bob", None),
        );
        let vacation = Arc::new(VacationMode::default());
        let alarm = Arc::new(DeviceController::new(
            DeviceKind::Alarm,
            Arc::clone(&registry),
            Arc::clone(&bus),
            Arc::new(SpyNotifier::default()),
            Arc::clone(&events),
            Arc::new(PendingCommands::default()),
        ));
        let service = CardService::new(
            registry,
            Arc::clone(&bus),
            alarm,
            Arc::clone(&directory),
            Arc::clone(&events),
            Arc::clone(&vacation),
            TimeDelta::seconds(60),
        );
        Fixture {
            bus,
            directory,
            events,
            vacation,
            service,
        }
    }

    #[tokio::test]
    async fn should_disarm_every_sensor_when_known_card_presented() {
        let f = fixture();
        f.vacation.activate();

        f.service
            .on_card_event(br#"{"event":"RFID_DETECTED","cardId":"04A1"}"#)
            .await;

        for topic in ["salon/mov/command", "cuisine/mov/command"] {
            assert_eq!(
                f.bus.payloads_on(topic),
                vec![serde_json::json!({"command": "SET_ALARM", "state": "OFF"})]
            );
        }
        assert!(!f.vacation.is_active());
        let disarmed = f.events.of_type(EventType::SensorsDisarmed);
        assert_eq!(disarmed[0].data["by"], "alice");
        assert_eq!(f.events.of_type(EventType::VacationModeChanged).len(), 1);
    }

    #[tokio::test]
    async fn should_ignore_unknown_card() {
        let f = fixture();
        f.service
            .on_card_event(br#"{"event":"RFID_DETECTED","cardId":"FFFF"}"#)
            .await;
        assert!(f.bus.published().is_empty());
        assert!(f.events.events().is_empty());
    }

    #[tokio::test]
    async fn should_ignore_malformed_card_event() {
        let f = fixture();
        f.service.on_card_event(b"RFID").await;
        assert!(f.bus.published().is_empty());
    }

    #[tokio::test]
    async fn should_tell_reader_to_capture_when_registration_starts() {
        let f = fixture();

        let request = f.service.start_registration("bob").await.unwrap();

        assert_eq!(request.username, "bob");
        assert_eq!(f.bus.topics(), vec![CARD_START_TOPIC]);
        assert_eq!(f.service.pending_registration(), Some(request));
    }

    #[tokio::test]
    async fn should_refuse_second_registration_while_first_pending() {
        let f = fixture();
        f.service.start_registration("bob").await.unwrap();

        let err = f.service.start_registration("alice").await.unwrap_err();

        assert!(matches!(err, RoomHubError::Conflict(c) if c.holder == "bob"));
        assert_eq!(f.bus.topics(), vec![CARD_START_TOPIC]);
    }

    #[tokio::test]
    async fn should_bind_captured_card_to_pending_user() {
        let f = fixture();
        f.service.start_registration("bob").await.unwrap();

        f.service
            .on_registration_event(br#"{"event":"RFID_REGISTER","cardId":"0B0B"}"#)
            .await;

        assert_eq!(f.directory.card_of("bob").as_deref(), Some("0B0B"));
        assert!(f.service.pending_registration().is_none());
        assert_eq!(f.events.types(), vec![EventType::CardRegistered]);
    }

    #[tokio::test]
    async fn should_not_bind_unsolicited_capture() {
        let f = fixture();
        f.service
            .on_registration_event(br#"{"event":"RFID_REGISTER","cardId":"0B0B"}"#)
            .await;
        assert!(f.directory.card_of("bob").is_none());
        assert!(f.events.events().is_empty());
    }

    #[tokio::test]
    async fn should_clear_pending_registration_when_reader_cancels() {
        let f = fixture();
        f.service.start_registration("bob").await.unwrap();

        f.service
            .on_registration_event(br#"{"event":"RFID_REGISTER_CANCEL"}"#)
            .await;

        assert!(f.service.pending_registration().is_none());
    }

    #[tokio::test]
    async fn should_only_cancel_own_registration() {
        let f = fixture();
        f.service.start_registration("bob").await.unwrap();

        assert!(!f.service.cancel_registration("alice").await.unwrap());
        assert!(f.service.cancel_registration("bob").await.unwrap());
        assert_eq!(f.bus.topics(), vec![CARD_START_TOPIC, CARD_CANCEL_TOPIC]);
    }

    #[tokio::test]
    async fn should_expire_registration_after_deadline() {
        let f = fixture();
        let request = f.service.start_registration("bob").await.unwrap();

        assert!(f.service.expire_registration(now()).await.unwrap().is_none());
        let expired = f
            .service
            .expire_registration(request.expires_at)
            .await
            .unwrap();

        assert_eq!(expired, Some(request));
        assert!(f.service.pending_registration().is_none());
        assert_eq!(f.bus.topics(), vec![CARD_START_TOPIC, CARD_CANCEL_TOPIC]);
    }
}
