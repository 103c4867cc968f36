//! # roomhub-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the repository port traits defined in `roomhub-app::ports`
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//! - Map between domain types and database rows
//!
//! Times of day are stored as `HH:MM:SS` text and instants as RFC 3339 text
//! with a fixed precision, so both sort lexicographically.
//!
//! ## Dependency rule
//! Depends on `roomhub-app` (for port traits) and `roomhub-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

pub mod card_directory;
pub mod error;
pub mod event_log;
pub mod pool;
pub mod room_repo;
pub mod schedule_repo;

pub use card_directory::SqliteCardDirectory;
pub use error::StorageError;
pub use event_log::SqliteEventLog;
pub use pool::{Config, Database};
pub use room_repo::SqliteRoomRepository;
pub use schedule_repo::SqliteScheduleRepository;

use chrono::SecondsFormat;
use roomhub_domain::time::Timestamp;

pub(crate) fn format_timestamp(value: Timestamp) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(value: &str) -> Result<Timestamp, sqlx::Error> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.to_utc())
        .map_err(|err| sqlx::Error::Decode(Box::new(err)))
}
