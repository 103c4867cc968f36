//! `SQLite` implementation of [`CardDirectory`].
//!
//! A card belongs to at most one user; binding it to someone else moves it.

use sqlx::SqlitePool;

use roomhub_app::ports::CardDirectory;
use roomhub_domain::error::RoomHubError;

use crate::error::StorageError;

const SELECT_USER_BY_CARD: &str = "SELECT username FROM users WHERE card_id = ?";
const CLEAR_CARD: &str = "UPDATE users SET card_id = NULL WHERE card_id = ? AND username != ?";
const BIND_CARD: &str = "UPDATE users SET card_id = ? WHERE username = ?";
const INSERT_USER: &str = "INSERT INTO users (username) VALUES (?) ON CONFLICT (username) DO NOTHING";

/// `SQLite`-backed card directory.
pub struct SqliteCardDirectory {
    pool: SqlitePool,
}

impl SqliteCardDirectory {
    /// Create a new directory using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Register a user without a card. Returns whether the user is new.
    ///
    /// # Errors
    ///
    /// Returns [`RoomHubError::Storage`] if the insert fails.
    pub async fn add_user(&self, username: &str) -> Result<bool, RoomHubError> {
        let result = sqlx::query(INSERT_USER)
            .bind(username)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(result.rows_affected() > 0)
    }
}

impl CardDirectory for SqliteCardDirectory {
    async fn find_user_by_card(&self, card_id: &str) -> Result<Option<String>, RoomHubError> {
        let row: Option<(String,)> = sqlx::query_as(SELECT_USER_BY_CARD)
            .bind(card_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(row.map(|(username,)| username))
    }

    async fn bind_card(&self, username: &str, card_id: &str) -> Result<bool, RoomHubError> {
        let mut tx = self.pool.begin().await.map_err(StorageError::from)?;

        sqlx::query(CLEAR_CARD)
            .bind(card_id)
            .bind(username)
            .execute(&mut *tx)
            .await
            .map_err(StorageError::from)?;

        let bound = sqlx::query(BIND_CARD)
            .bind(card_id)
            .bind(username)
            .execute(&mut *tx)
            .await
            .map_err(StorageError::from)?
            .rows_affected()
            > 0;

        tx.commit().await.map_err(StorageError::from)?;
        Ok(bound)
    }
}
