//! In-memory fakes of the driven ports, shared by the unit tests.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{NaiveTime, Timelike};

use roomhub_domain::error::RoomHubError;
use roomhub_domain::event::{Event, EventType};
use roomhub_domain::id::ScheduleId;
use roomhub_domain::room::{DeviceKind, Room, RoomName, SwitchState};
use roomhub_domain::schedule::{Schedule, ScheduleKind, ScheduleShape};
use roomhub_domain::time::Timestamp;

use crate::ports::{
    CardDirectory, CommandPublisher, EventLog, EventPublisher, Notifier, RoomRepository,
    ScheduleRepository,
};

pub fn room(name: &str) -> RoomName {
    RoomName::parse(name).unwrap()
}

pub fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

#[derive(Debug)]
struct Unavailable;

impl std::fmt::Display for Unavailable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("storage unavailable")
    }
}

impl std::error::Error for Unavailable {}

fn unavailable() -> RoomHubError {
    RoomHubError::Storage(Box::new(Unavailable))
}

#[derive(Default)]
pub struct InMemoryRoomRepo {
    rooms: Mutex<BTreeMap<RoomName, Room>>,
    failing: AtomicBool,
}

impl InMemoryRoomRepo {
    pub fn with_rooms(rooms: impl IntoIterator<Item = Room>) -> Self {
        let repo = Self::default();
        {
            let mut store = repo.rooms.lock().unwrap();
            for room in rooms {
                store.insert(room.name.clone(), room);
            }
        }
        repo
    }

    /// Make every subsequent call fail with a storage error.
    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn snapshot(&self, name: &RoomName) -> Option<Room> {
        self.rooms.lock().unwrap().get(name).cloned()
    }

    fn check(&self) -> Result<(), RoomHubError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(unavailable())
        } else {
            Ok(())
        }
    }
}

impl RoomRepository for InMemoryRoomRepo {
    fn get(
        &self,
        name: &RoomName,
    ) -> impl Future<Output = Result<Option<Room>, RoomHubError>> + Send {
        let result = self.check().map(|()| self.snapshot(name));
        async move { result }
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<Room>, RoomHubError>> + Send {
        let result = self
            .check()
            .map(|()| self.rooms.lock().unwrap().values().cloned().collect());
        async move { result }
    }

    fn insert_if_absent(
        &self,
        name: &RoomName,
    ) -> impl Future<Output = Result<(Room, bool), RoomHubError>> + Send {
        let result = self.check().map(|()| {
            let mut store = self.rooms.lock().unwrap();
            match store.get(name) {
                Some(existing) => (existing.clone(), false),
                None => {
                    let created = Room::new(name.clone());
                    store.insert(name.clone(), created.clone());
                    (created, true)
                }
            }
        });
        async move { result }
    }

    fn set_state(
        &self,
        name: &RoomName,
        device: DeviceKind,
        state: SwitchState,
    ) -> impl Future<Output = Result<Room, RoomHubError>> + Send {
        let result = self.check().map(|()| {
            let mut store = self.rooms.lock().unwrap();
            let entry = store
                .entry(name.clone())
                .or_insert_with(|| Room::new(name.clone()));
            entry.set_state(device, state);
            entry.clone()
        });
        async move { result }
    }

    fn delete(&self, name: &RoomName) -> impl Future<Output = Result<bool, RoomHubError>> + Send {
        let result = self
            .check()
            .map(|()| self.rooms.lock().unwrap().remove(name).is_some());
        async move { result }
    }
}

#[derive(Default)]
pub struct InMemoryScheduleRepo {
    store: Mutex<Vec<Schedule>>,
    failing: AtomicBool,
}

impl InMemoryScheduleRepo {
    pub fn with(schedules: impl IntoIterator<Item = Schedule>) -> Self {
        let repo = Self::default();
        repo.store.lock().unwrap().extend(schedules);
        repo
    }

    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.store.lock().unwrap().len()
    }

    fn query(
        &self,
        predicate: impl Fn(&Schedule) -> bool,
    ) -> Result<Vec<Schedule>, RoomHubError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(self
            .store
            .lock()
            .unwrap()
            .iter()
            .filter(|s| predicate(s))
            .cloned()
            .collect())
    }
}

impl ScheduleRepository for InMemoryScheduleRepo {
    fn create(
        &self,
        schedule: Schedule,
    ) -> impl Future<Output = Result<Schedule, RoomHubError>> + Send {
        self.store.lock().unwrap().push(schedule.clone());
        async move { Ok(schedule) }
    }

    fn get_by_id(
        &self,
        id: ScheduleId,
    ) -> impl Future<Output = Result<Option<Schedule>, RoomHubError>> + Send {
        let result = self.query(|s| s.id == id).map(|mut found| found.pop());
        async move { result }
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<Schedule>, RoomHubError>> + Send {
        let result = self.query(|_| true);
        async move { result }
    }

    fn find_by_room(
        &self,
        room: &RoomName,
    ) -> impl Future<Output = Result<Vec<Schedule>, RoomHubError>> + Send {
        let result = self.query(|s| &s.room == room);
        async move { result }
    }

    fn find_by_kind(
        &self,
        kind: ScheduleKind,
    ) -> impl Future<Output = Result<Vec<Schedule>, RoomHubError>> + Send {
        let result = self.query(|s| s.kind() == kind);
        async move { result }
    }

    fn find_punctual_at(
        &self,
        time: NaiveTime,
    ) -> impl Future<Output = Result<Vec<Schedule>, RoomHubError>> + Send {
        let result = self.query(|s| match s.shape {
            ScheduleShape::Punctual { at } => {
                at.hour() == time.hour() && at.minute() == time.minute()
            }
            ScheduleShape::Interval { .. } => false,
        });
        async move { result }
    }

    fn delete(&self, id: ScheduleId) -> impl Future<Output = Result<bool, RoomHubError>> + Send {
        let mut store = self.store.lock().unwrap();
        let before = store.len();
        store.retain(|s| s.id != id);
        let removed = store.len() != before;
        async move { Ok(removed) }
    }

    fn delete_by_room(
        &self,
        room: &RoomName,
    ) -> impl Future<Output = Result<u64, RoomHubError>> + Send {
        let mut store = self.store.lock().unwrap();
        let before = store.len();
        store.retain(|s| &s.room != room);
        let removed = (before - store.len()) as u64;
        async move { Ok(removed) }
    }
}

#[derive(Default)]
pub struct RecordingBus {
    published: Mutex<Vec<(String, Vec<u8>)>>,
}

impl RecordingBus {
    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.published.lock().unwrap().clone()
    }

    pub fn topics(&self) -> Vec<String> {
        self.published().into_iter().map(|(topic, _)| topic).collect()
    }

    /// Decoded JSON payloads published on `topic`.
    pub fn payloads_on(&self, topic: &str) -> Vec<serde_json::Value> {
        self.published()
            .into_iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, payload)| serde_json::from_slice(&payload).unwrap())
            .collect()
    }

    pub fn clear(&self) {
        self.published.lock().unwrap().clear();
    }
}

impl CommandPublisher for RecordingBus {
    fn publish(
        &self,
        topic: String,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), RoomHubError>> + Send {
        self.published.lock().unwrap().push((topic, payload));
        async { Ok(()) }
    }
}

#[derive(Default)]
pub struct SpyNotifier {
    alerts: Mutex<Vec<RoomName>>,
}

impl SpyNotifier {
    pub fn alerts(&self) -> Vec<RoomName> {
        self.alerts.lock().unwrap().clone()
    }
}

impl Notifier for SpyNotifier {
    fn movement_alert(
        &self,
        room: &RoomName,
    ) -> impl Future<Output = Result<(), RoomHubError>> + Send {
        self.alerts.lock().unwrap().push(room.clone());
        async { Ok(()) }
    }
}

#[derive(Default)]
pub struct SpyPublisher {
    events: Mutex<Vec<Event>>,
}

impl SpyPublisher {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn types(&self) -> Vec<EventType> {
        self.events().into_iter().map(|e| e.event_type).collect()
    }

    pub fn of_type(&self, event_type: EventType) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }
}

impl EventPublisher for SpyPublisher {
    fn publish(&self, event: Event) -> impl Future<Output = Result<(), RoomHubError>> + Send {
        self.events.lock().unwrap().push(event);
        async { Ok(()) }
    }
}

/// Users keyed by name, with their bound card if any.
#[derive(Default)]
pub struct InMemoryCardDirectory {
    users: Mutex<HashMap<String, Option<String>>>,
}

impl InMemoryCardDirectory {
    pub fn with_user(self, username: &str, card: Option<&str>) -> Self {
        self.users
            .lock()
            .unwrap()
            .insert(username.to_string(), card.map(str::to_string));
        self
    }

    pub fn card_of(&self, username: &str) -> Option<String> {
        self.users.lock().unwrap().get(username).cloned().flatten()
    }
}

impl CardDirectory for InMemoryCardDirectory {
    fn find_user_by_card(
        &self,
        card_id: &str,
    ) -> impl Future<Output = Result<Option<String>, RoomHubError>> + Send {
        let found = self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|(_, card)| card.as_deref() == Some(card_id))
            .map(|(user, _)| user.clone());
        async move { Ok(found) }
    }

    fn bind_card(
        &self,
        username: &str,
        card_id: &str,
    ) -> impl Future<Output = Result<bool, RoomHubError>> + Send {
        let bound = match self.users.lock().unwrap().get_mut(username) {
            Some(card) => {
                *card = Some(card_id.to_string());
                true
            }
            None => false,
        };
        async move { Ok(bound) }
    }
}

#[derive(Default)]
pub struct InMemoryEventLog {
    events: Mutex<Vec<Event>>,
}

impl InMemoryEventLog {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

impl EventLog for InMemoryEventLog {
    fn append(&self, event: Event) -> impl Future<Output = Result<(), RoomHubError>> + Send {
        self.events.lock().unwrap().push(event);
        async { Ok(()) }
    }

    fn get_recent(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Event>, RoomHubError>> + Send {
        let recent: Vec<Event> = self.events().into_iter().rev().take(limit).collect();
        async move { Ok(recent) }
    }

    fn find_by_room(
        &self,
        room: &RoomName,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Event>, RoomHubError>> + Send {
        let found: Vec<Event> = self
            .events()
            .into_iter()
            .rev()
            .filter(|e| e.room.as_ref() == Some(room))
            .take(limit)
            .collect();
        async move { Ok(found) }
    }

    fn prune_before(
        &self,
        cutoff: Timestamp,
    ) -> impl Future<Output = Result<u64, RoomHubError>> + Send {
        let mut events = self.events.lock().unwrap();
        let before = events.len();
        events.retain(|e| e.timestamp >= cutoff);
        let removed = (before - events.len()) as u64;
        async move { Ok(removed) }
    }
}
