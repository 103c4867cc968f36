//! Time and timestamp helpers.

use chrono::{DateTime, Local, NaiveTime, Timelike, Utc};

/// UTC timestamp used for event times, schedule creation, command issuance.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Drop seconds and sub-second precision so minute comparisons are exact.
#[must_use]
pub fn truncate_to_minute(time: NaiveTime) -> NaiveTime {
    NaiveTime::from_hms_opt(time.hour(), time.minute(), 0).unwrap_or(time)
}

/// Current wall-clock time of day, truncated to the minute.
///
/// Schedules are written in the household's local time.
#[must_use]
pub fn local_minute() -> NaiveTime {
    truncate_to_minute(Local::now().time())
}
