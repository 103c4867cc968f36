//! Schedule reconciler — compares schedule-derived desired state with the
//! registry once per tick and issues the corrective commands.
//!
//! Each tick runs three independent passes:
//!
//! 1. **punctual**: schedules whose time matches the tick minute fire their
//!    target unconditionally (pulse semantics);
//! 2. **interval**: for every `(room, device)` group of interval schedules the
//!    governing schedule's set-point is compared with the confirmed state and
//!    a command is issued only when they differ;
//! 3. **retry**: unconfirmed commands past their timeout are republished or
//!    abandoned.
//!
//! A failing pass is logged and does not stop the others. A tick that starts
//! while the previous one is still running is skipped.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveTime;

use roomhub_domain::error::RoomHubError;
use roomhub_domain::event::{Event, EventType};
use roomhub_domain::room::{DeviceKind, Room, RoomName};
use roomhub_domain::schedule::{Schedule, ScheduleKind, governing_schedule};
use roomhub_domain::time::Timestamp;

use crate::pending::PendingCommands;
use crate::ports::{DeviceHandler, EventPublisher, RoomRepository, ScheduleRepository};
use crate::registry::DeviceRegistry;

/// Counters for one completed tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub punctual_fired: usize,
    pub interval_commands: usize,
    /// Schedules whose room could not be resolved this tick.
    pub skipped: usize,
    pub retried: usize,
    pub abandoned: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Completed(TickReport),
    /// The previous tick was still in flight.
    Skipped,
}

pub struct ScheduleReconciler<S, R, D, P> {
    schedules: S,
    registry: Arc<DeviceRegistry<R>>,
    light: D,
    alarm: D,
    events: P,
    pending: Arc<PendingCommands>,
    in_flight: tokio::sync::Mutex<()>,
}

impl<S, R, D, P> ScheduleReconciler<S, R, D, P>
where
    S: ScheduleRepository + Send + Sync,
    R: RoomRepository + Send + Sync,
    D: DeviceHandler + Send + Sync,
    P: EventPublisher + Send + Sync,
{
    pub fn new(
        schedules: S,
        registry: Arc<DeviceRegistry<R>>,
        light: D,
        alarm: D,
        events: P,
        pending: Arc<PendingCommands>,
    ) -> Self {
        Self {
            schedules,
            registry,
            light,
            alarm,
            events,
            pending,
            in_flight: tokio::sync::Mutex::new(()),
        }
    }

    fn handler(&self, device: DeviceKind) -> &D {
        match device {
            DeviceKind::Light => &self.light,
            DeviceKind::Alarm => &self.alarm,
        }
    }

    /// Run one reconciliation tick.
    ///
    /// `minute` is the local time of day truncated to the minute, `at` the
    /// instant used to age pending commands.
    #[tracing::instrument(skip(self, at))]
    pub async fn tick(&self, minute: NaiveTime, at: Timestamp) -> TickOutcome {
        let Ok(_guard) = self.in_flight.try_lock() else {
            tracing::warn!("previous tick still running, skipping");
            return TickOutcome::Skipped;
        };

        let mut report = TickReport::default();
        if let Err(err) = self.punctual_pass(minute, &mut report).await {
            tracing::error!(%err, "punctual pass failed");
        }
        if let Err(err) = self.interval_pass(minute, &mut report).await {
            tracing::error!(%err, "interval pass failed");
        }
        self.retry_pass(at, &mut report).await;

        tracing::debug!(?report, "tick completed");
        TickOutcome::Completed(report)
    }

    /// Whether the room still exists; lookup failures count as "skip".
    async fn resolvable(&self, schedule: &Schedule) -> Option<Room> {
        match self.registry.get(&schedule.room).await {
            Ok(Some(room)) => Some(room),
            Ok(None) => {
                tracing::warn!(schedule_id = %schedule.id, room = %schedule.room, "room no longer exists, schedule skipped");
                None
            }
            Err(err) => {
                tracing::error!(%err, schedule_id = %schedule.id, room = %schedule.room, "failed to read room, schedule skipped");
                None
            }
        }
    }

    async fn execute(&self, schedule: &Schedule, desired: bool) -> bool {
        if let Err(err) = self
            .handler(schedule.device)
            .issue_command(&schedule.room, desired)
            .await
        {
            tracing::error!(%err, schedule_id = %schedule.id, "failed to issue scheduled command");
            return false;
        }
        let event = Event::for_room(
            EventType::ScheduleExecuted,
            &schedule.room,
            serde_json::json!({
                "schedule_id": schedule.id,
                "kind": schedule.kind().as_str(),
                "device": schedule.device.as_str(),
                "state": desired,
            }),
        );
        if let Err(err) = self.events.publish(event).await {
            tracing::warn!(%err, "failed to publish schedule event");
        }
        true
    }

    async fn punctual_pass(
        &self,
        minute: NaiveTime,
        report: &mut TickReport,
    ) -> Result<(), RoomHubError> {
        let due = self.schedules.find_punctual_at(minute).await?;
        for schedule in due.iter().filter(|s| s.fires_at(minute)) {
            if self.resolvable(schedule).await.is_none() {
                report.skipped += 1;
                continue;
            }
            if self.execute(schedule, schedule.target).await {
                report.punctual_fired += 1;
            }
        }
        Ok(())
    }

    async fn interval_pass(
        &self,
        minute: NaiveTime,
        report: &mut TickReport,
    ) -> Result<(), RoomHubError> {
        let schedules = self.schedules.find_by_kind(ScheduleKind::Interval).await?;

        let mut groups: BTreeMap<(&RoomName, DeviceKind), Vec<&Schedule>> = BTreeMap::new();
        for schedule in &schedules {
            groups
                .entry((&schedule.room, schedule.device))
                .or_default()
                .push(schedule);
        }

        for ((room_name, device), group) in groups {
            let Some(governing) = governing_schedule(&group, minute) else {
                continue;
            };
            let Some(desired) = governing.desired_state_at(minute) else {
                continue;
            };
            let Some(room) = self.resolvable(governing).await else {
                report.skipped += group.len();
                continue;
            };
            if room.state(device).satisfies(desired) {
                continue;
            }
            if self
                .pending
                .get(room_name, device)
                .is_some_and(|pending| pending.desired == desired)
            {
                tracing::trace!(room = %room_name, %device, "command already awaiting confirmation");
                continue;
            }
            if self.execute(governing, desired).await {
                report.interval_commands += 1;
            }
        }
        Ok(())
    }

    async fn retry_pass(&self, at: Timestamp, report: &mut TickReport) {
        let due = self.pending.take_due(at);

        for pending in due.retry {
            tracing::info!(
                room = %pending.room,
                device = %pending.device,
                attempts = pending.attempts,
                "no confirmation received, republishing command"
            );
            match self
                .handler(pending.device)
                .issue_command(&pending.room, pending.desired)
                .await
            {
                Ok(()) => report.retried += 1,
                Err(err) => tracing::error!(%err, room = %pending.room, "failed to republish command"),
            }
        }

        for pending in due.abandoned {
            tracing::warn!(
                room = %pending.room,
                device = %pending.device,
                attempts = pending.attempts,
                "command never confirmed, giving up"
            );
            report.abandoned += 1;
            let event = Event::for_room(
                EventType::CommandFailed,
                &pending.room,
                serde_json::json!({
                    "device": pending.device.as_str(),
                    "reason": "timeout",
                    "desired": pending.desired,
                    "attempts": pending.attempts,
                }),
            );
            if let Err(err) = self.events.publish(event).await {
                tracing::warn!(%err, "failed to publish command failure");
            }
        }
    }
}
