use thiserror::Error;

/// Result type alias for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Errors that can occur in the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid database url: {0}")]
    InvalidUrl(String),
}

impl From<StorageError> for smartatt_core::Error {
    fn from(err: StorageError) -> Self {
        smartatt_core::Error::Database(err.to_string())
    }
}
