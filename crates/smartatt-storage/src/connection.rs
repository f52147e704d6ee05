use crate::error::StorageResult;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::info;

/// Schema for the attendance audit table. Applied idempotently on
/// connect; there is no separate migration machinery for one table.
const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS attendance_logs (
    log_id      INTEGER PRIMARY KEY AUTOINCREMENT,
    employee_id INTEGER NOT NULL,
    detected_at TEXT    NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_attendance_detected_at
    ON attendance_logs (detected_at);
";

/// Database connection pool wrapper.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if missing) and prepare the attendance database.
    ///
    /// # Errors
    ///
    /// Returns a storage error when the url is invalid or the schema
    /// cannot be applied.
    pub async fn connect(url: &str) -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::raw_sql(SCHEMA).execute(&pool).await?;
        info!(url, "attendance database ready");
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
