//! Card directory port — which user owns which access card.
//!
//! User accounts themselves live outside this system; the directory only
//! answers lookups and records bindings.

use std::future::Future;

use roomhub_domain::error::RoomHubError;

pub trait CardDirectory {
    /// Username owning `card_id`, if any.
    fn find_user_by_card(
        &self,
        card_id: &str,
    ) -> impl Future<Output = Result<Option<String>, RoomHubError>> + Send;

    /// Bind `card_id` to `username`. Returns `false` when the user is unknown.
    fn bind_card(
        &self,
        username: &str,
        card_id: &str,
    ) -> impl Future<Output = Result<bool, RoomHubError>> + Send;
}

impl<T: CardDirectory + Send + Sync> CardDirectory for std::sync::Arc<T> {
    fn find_user_by_card(
        &self,
        card_id: &str,
    ) -> impl Future<Output = Result<Option<String>, RoomHubError>> + Send {
        (**self).find_user_by_card(card_id)
    }

    fn bind_card(
        &self,
        username: &str,
        card_id: &str,
    ) -> impl Future<Output = Result<bool, RoomHubError>> + Send {
        (**self).bind_card(username, card_id)
    }
}
