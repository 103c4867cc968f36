//! Schedule — a time-based rule driving one device of one room.
//!
//! Two shapes exist:
//!
//! | Shape | Fires | Semantics |
//! |-------|-------|-----------|
//! | [`Punctual`](ScheduleShape::Punctual) | when the tick minute equals `at` | pulse: always sends the target |
//! | [`Interval`](ScheduleShape::Interval) | every tick | set-point: target inside the window, its negation outside |
//!
//! An interval whose `end` is earlier than its `start` crosses midnight.

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::{RoomHubError, ValidationError};
use crate::id::ScheduleId;
use crate::room::{DeviceKind, RoomName};
use crate::time::{Timestamp, truncate_to_minute};

/// Longest accepted human-readable schedule name.
pub const MAX_NAME_LEN: usize = 60;

/// Discriminant of [`ScheduleShape`], used for repository queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleKind {
    Punctual,
    Interval,
}

impl ScheduleKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Punctual => "punctual",
            Self::Interval => "interval",
        }
    }
}

/// When a schedule applies. Exactly one shape holds by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ScheduleShape {
    Punctual { at: NaiveTime },
    Interval { start: NaiveTime, end: NaiveTime },
}

impl ScheduleShape {
    #[must_use]
    pub fn kind(&self) -> ScheduleKind {
        match self {
            Self::Punctual { .. } => ScheduleKind::Punctual,
            Self::Interval { .. } => ScheduleKind::Interval,
        }
    }
}

/// Wraparound-aware closed interval membership.
///
/// `start <= end` is a same-day window `[start, end]`; otherwise the window
/// crosses midnight and covers `[start, 24:00) ∪ [00:00, end]`.
#[must_use]
pub fn interval_contains(start: NaiveTime, end: NaiveTime, now: NaiveTime) -> bool {
    if start <= end {
        start <= now && now <= end
    } else {
        now >= start || now <= end
    }
}

/// A persisted time-based rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: ScheduleId,
    pub room: RoomName,
    pub name: Option<String>,
    pub device: DeviceKind,
    /// State requested by the rule (`true` = on / armed).
    pub target: bool,
    pub shape: ScheduleShape,
    pub created_at: Timestamp,
}

impl Schedule {
    /// Create a builder for constructing a [`Schedule`].
    #[must_use]
    pub fn builder() -> ScheduleBuilder {
        ScheduleBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`RoomHubError::Validation`] when the name is blank or longer
    /// than [`MAX_NAME_LEN`] characters.
    pub fn validate(&self) -> Result<(), RoomHubError> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(ValidationError::EmptyName.into());
            }
            if name.chars().count() > MAX_NAME_LEN {
                return Err(ValidationError::ScheduleNameTooLong { max: MAX_NAME_LEN }.into());
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn kind(&self) -> ScheduleKind {
        self.shape.kind()
    }

    /// Whether a punctual schedule fires during the minute `now`.
    #[must_use]
    pub fn fires_at(&self, now: NaiveTime) -> bool {
        match self.shape {
            ScheduleShape::Punctual { at } => at.hour() == now.hour() && at.minute() == now.minute(),
            ScheduleShape::Interval { .. } => false,
        }
    }

    /// Whether `now` lies inside an interval schedule's window.
    #[must_use]
    pub fn is_active_at(&self, now: NaiveTime) -> bool {
        match self.shape {
            ScheduleShape::Interval { start, end } => interval_contains(start, end, now),
            ScheduleShape::Punctual { .. } => false,
        }
    }

    /// Device state an interval schedule asks for at `now`; `None` for
    /// punctual schedules, which carry no set-point.
    #[must_use]
    pub fn desired_state_at(&self, now: NaiveTime) -> Option<bool> {
        match self.shape {
            ScheduleShape::Interval { .. } => Some(if self.is_active_at(now) {
                self.target
            } else {
                !self.target
            }),
            ScheduleShape::Punctual { .. } => None,
        }
    }

    fn recency(&self) -> (Timestamp, ScheduleId) {
        (self.created_at, self.id)
    }
}

/// Pick the schedule that decides a device's state among interval schedules
/// sharing the same room and device.
///
/// The most recently created *active* schedule wins; when none is active the
/// most recently created schedule of the group decides. Ties on creation
/// time fall back to the id so the choice is stable across ticks.
#[must_use]
pub fn governing_schedule<'a>(group: &[&'a Schedule], now: NaiveTime) -> Option<&'a Schedule> {
    group
        .iter()
        .copied()
        .filter(|s| s.is_active_at(now))
        .max_by_key(|s| s.recency())
        .or_else(|| group.iter().copied().max_by_key(|s| s.recency()))
}

/// Step-by-step builder for [`Schedule`].
#[derive(Debug, Default)]
pub struct ScheduleBuilder {
    id: Option<ScheduleId>,
    room: Option<RoomName>,
    name: Option<String>,
    device: Option<DeviceKind>,
    target: Option<bool>,
    shape: Option<ScheduleShape>,
    created_at: Option<Timestamp>,
}

impl ScheduleBuilder {
    #[must_use]
    pub fn id(mut self, id: ScheduleId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn room(mut self, room: RoomName) -> Self {
        self.room = Some(room);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn device(mut self, device: DeviceKind) -> Self {
        self.device = Some(device);
        self
    }

    #[must_use]
    pub fn target(mut self, target: bool) -> Self {
        self.target = Some(target);
        self
    }

    #[must_use]
    pub fn punctual(mut self, at: NaiveTime) -> Self {
        self.shape = Some(ScheduleShape::Punctual {
            at: truncate_to_minute(at),
        });
        self
    }

    #[must_use]
    pub fn interval(mut self, start: NaiveTime, end: NaiveTime) -> Self {
        self.shape = Some(ScheduleShape::Interval {
            start: truncate_to_minute(start),
            end: truncate_to_minute(end),
        });
        self
    }

    #[must_use]
    pub fn created_at(mut self, created_at: Timestamp) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Consume the builder, validate, and return a [`Schedule`].
    ///
    /// # Errors
    ///
    /// Returns [`RoomHubError::Validation`] if the room, device, target or
    /// time is missing, or if the name is invalid.
    pub fn build(self) -> Result<Schedule, RoomHubError> {
        let schedule = Schedule {
            id: self.id.unwrap_or_default(),
            room: self.room.ok_or(ValidationError::MissingField("room"))?,
            name: self.name,
            device: self.device.ok_or(ValidationError::MissingField("device"))?,
            target: self.target.ok_or(ValidationError::MissingField("target"))?,
            shape: self.shape.ok_or(ValidationError::MissingField("time"))?,
            created_at: self.created_at.unwrap_or_else(crate::time::now),
        };
        schedule.validate()?;
        Ok(schedule)
    }
}
