//! Card registration — binding the next captured card to a user.
//!
//! ```text
//!            start(user)                 capture / cancel / expire
//!   Idle ─────────────────▶ AwaitingCard ───────────────────────────▶ Idle
//! ```
//!
//! Only one capture can be in flight; a second user cannot hijack it until it
//! completes, is cancelled or expires.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::error::ConflictError;
use crate::id::RegistrationId;
use crate::time::Timestamp;

/// A capture request waiting for the reader to report a card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRequest {
    pub id: RegistrationId,
    pub username: String,
    pub expires_at: Timestamp,
}

impl RegistrationRequest {
    #[must_use]
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }
}

/// Outcome of a card capture reported by the reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capture {
    /// The card belongs to this request.
    Matched(RegistrationRequest),
    /// The request timed out before the card arrived.
    Expired(RegistrationRequest),
    /// Nothing was waiting for a card.
    Unsolicited,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CardRegistration {
    #[default]
    Idle,
    AwaitingCard(RegistrationRequest),
}

impl CardRegistration {
    /// The in-flight request, expired or not.
    #[must_use]
    pub fn pending(&self) -> Option<&RegistrationRequest> {
        match self {
            Self::Idle => None,
            Self::AwaitingCard(request) => Some(request),
        }
    }

    /// Begin waiting for a card on behalf of `username`.
    ///
    /// The same user may restart their own request; another user's
    /// unexpired request is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`ConflictError`] when another user's request is still live.
    pub fn start(
        &mut self,
        username: impl Into<String>,
        now: Timestamp,
        ttl: TimeDelta,
    ) -> Result<RegistrationRequest, ConflictError> {
        let username = username.into();
        if let Self::AwaitingCard(current) = self {
            if current.username != username && !current.is_expired(now) {
                return Err(ConflictError {
                    resource: "card registration",
                    holder: current.username.clone(),
                });
            }
        }
        let request = RegistrationRequest {
            id: RegistrationId::new(),
            username,
            expires_at: now + ttl,
        };
        *self = Self::AwaitingCard(request.clone());
        Ok(request)
    }

    /// Abort the pending request.
    ///
    /// With `Some(username)` only that user's request is cancelled; `None`
    /// (the reader gave up) cancels whatever is pending.
    pub fn cancel(&mut self, username: Option<&str>) -> Option<RegistrationRequest> {
        let matches = match (&*self, username) {
            (Self::Idle, _) => false,
            (Self::AwaitingCard(_), None) => true,
            (Self::AwaitingCard(current), Some(user)) => current.username == user,
        };
        if matches { self.take() } else { None }
    }

    /// Resolve the pending request against a card reported at `now`.
    pub fn capture(&mut self, now: Timestamp) -> Capture {
        match self.take() {
            None => Capture::Unsolicited,
            Some(request) if request.is_expired(now) => Capture::Expired(request),
            Some(request) => Capture::Matched(request),
        }
    }

    /// Drop the pending request if it expired before `now`.
    pub fn expire(&mut self, now: Timestamp) -> Option<RegistrationRequest> {
        if self.pending().is_some_and(|request| request.is_expired(now)) {
            self.take()
        } else {
            None
        }
    }

    fn take(&mut self) -> Option<RegistrationRequest> {
        match std::mem::take(self) {
            Self::Idle => None,
            Self::AwaitingCard(request) => Some(request),
        }
    }
}
