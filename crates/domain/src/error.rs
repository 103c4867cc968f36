//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`RoomHubError`] via `#[from]` at the port boundary.

/// Base error returned by every port and service.
#[derive(Debug, thiserror::Error)]
pub enum RoomHubError {
    #[error("validation error")]
    Validation(#[from] ValidationError),

    #[error("not found")]
    NotFound(#[from] NotFoundError),

    #[error("conflict")]
    Conflict(#[from] ConflictError),

    /// A persistence adapter failed.
    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The message bus client failed.
    #[error("message bus error")]
    Bus(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Domain invariant violations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("room name must not contain topic separators or wildcards")]
    InvalidRoomName,

    #[error("schedule name exceeds {max} characters")]
    ScheduleNameTooLong { max: usize },

    #[error("room name `{0}` is reserved")]
    ReservedRoomName(String),

    #[error("missing required field `{0}`")]
    MissingField(&'static str),
}

/// A looked-up record does not exist.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} `{id}` not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// A resource is held by someone else.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{resource} is held by `{holder}`")]
pub struct ConflictError {
    pub resource: &'static str,
    pub holder: String,
}
