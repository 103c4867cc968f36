//! Pending commands — the "commanded but not yet confirmed" state.
//!
//! The registry only ever holds confirmed state. What was asked of a device
//! lives here until a confirmation or a manual event for the same
//! `(room, device)` arrives. Entries older than the confirm timeout are
//! handed back for republishing until `max_attempts` publishes were made,
//! then abandoned.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use chrono::TimeDelta;

use roomhub_domain::room::{DeviceKind, RoomName};
use roomhub_domain::time::Timestamp;

/// Bounds on how long and how often an unconfirmed command is republished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub confirm_timeout: TimeDelta,
    /// Total publishes, the first one included.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            confirm_timeout: TimeDelta::seconds(30),
            max_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCommand {
    pub room: RoomName,
    pub device: DeviceKind,
    pub desired: bool,
    pub issued_at: Timestamp,
    pub attempts: u32,
}

/// Commands whose confirm timeout elapsed.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Due {
    /// Still within budget; republish these.
    pub retry: Vec<PendingCommand>,
    /// Out of attempts; already removed from the tracker.
    pub abandoned: Vec<PendingCommand>,
}

pub struct PendingCommands {
    policy: RetryPolicy,
    entries: Mutex<HashMap<(RoomName, DeviceKind), PendingCommand>>,
}

impl PendingCommands {
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<(RoomName, DeviceKind), PendingCommand>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Note that a command was published and return its attempt number.
    ///
    /// Republishing the same desired state counts as another attempt; a
    /// different desired state replaces the entry.
    pub fn record(&self, room: &RoomName, device: DeviceKind, desired: bool, now: Timestamp) -> u32 {
        let mut entries = self.entries();
        let entry = entries
            .entry((room.clone(), device))
            .and_modify(|pending| {
                pending.attempts = if pending.desired == desired {
                    pending.attempts + 1
                } else {
                    1
                };
                pending.desired = desired;
                pending.issued_at = now;
            })
            .or_insert_with(|| PendingCommand {
                room: room.clone(),
                device,
                desired,
                issued_at: now,
                attempts: 1,
            });
        entry.attempts
    }

    /// Clear the entry for `(room, device)`, returning it if there was one.
    pub fn resolve(&self, room: &RoomName, device: DeviceKind) -> Option<PendingCommand> {
        self.entries().remove(&(room.clone(), device))
    }

    /// Drop every entry of a room.
    pub fn forget_room(&self, room: &RoomName) {
        self.entries().retain(|(name, _), _| name != room);
    }

    #[must_use]
    pub fn get(&self, room: &RoomName, device: DeviceKind) -> Option<PendingCommand> {
        self.entries().get(&(room.clone(), device)).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Split the entries whose confirm timeout elapsed at `now`.
    pub fn take_due(&self, now: Timestamp) -> Due {
        let mut entries = self.entries();
        let mut due = Due::default();
        entries.retain(|_, pending| {
            if now - pending.issued_at < self.policy.confirm_timeout {
                return true;
            }
            if pending.attempts >= self.policy.max_attempts {
                due.abandoned.push(pending.clone());
                false
            } else {
                due.retry.push(pending.clone());
                true
            }
        });
        due
    }
}

impl Default for PendingCommands {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}
