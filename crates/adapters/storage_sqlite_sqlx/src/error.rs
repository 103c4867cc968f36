//! Storage-specific error type wrapping sqlx errors.

use roomhub_domain::error::RoomHubError;

/// Errors originating from the `SQLite` storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A query or connection failed.
    #[error("database error")]
    Database(#[from] sqlx::Error),

    /// Failed to serialize or deserialize a stored JSON value.
    #[error("JSON serialization error")]
    Json(#[from] serde_json::Error),

    /// Failed to run migrations.
    #[error("migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A column holds a value the domain does not know.
    #[error("unexpected value `{value}` in column `{column}`")]
    InvalidValue { column: &'static str, value: String },
}

impl StorageError {
    /// Wrap as a row decoding failure.
    pub(crate) fn invalid(column: &'static str, value: impl Into<String>) -> sqlx::Error {
        sqlx::Error::Decode(Box::new(Self::InvalidValue {
            column,
            value: value.into(),
        }))
    }
}

impl From<StorageError> for RoomHubError {
    fn from(err: StorageError) -> Self {
        Self::Storage(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_convert_into_storage_error() {
        let err: RoomHubError = StorageError::InvalidValue {
            column: "light",
            value: "dim".to_string(),
        }
        .into();
        assert!(matches!(err, RoomHubError::Storage(_)));
    }

    #[test]
    fn should_name_column_in_invalid_value_message() {
        let err = StorageError::InvalidValue {
            column: "light",
            value: "dim".to_string(),
        };
        assert_eq!(err.to_string(), "unexpected value `dim` in column `light`");
    }
}
