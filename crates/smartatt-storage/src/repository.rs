use crate::error::StorageResult;
use crate::models::AttendanceLog;
use chrono::Utc;
use smartatt_core::EmployeeId;
use smartatt_session::AttendanceSink;
use sqlx::SqlitePool;
use tracing::debug;

/// Repository for attendance log entries.
///
/// Uses native async trait methods (Edition 2024); no async-trait
/// macro needed.
pub trait AttendanceRepository: Send + Sync {
    /// Append one check-in, returning the new row id.
    async fn insert(&self, employee_id: EmployeeId) -> StorageResult<i64>;

    /// Most recent check-ins, newest first.
    async fn recent(&self, limit: i64) -> StorageResult<Vec<AttendanceLog>>;
}

/// SQLite implementation of [`AttendanceRepository`].
#[derive(Debug, Clone)]
pub struct SqliteAttendanceRepository {
    pool: SqlitePool,
}

impl SqliteAttendanceRepository {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl AttendanceRepository for SqliteAttendanceRepository {
    async fn insert(&self, employee_id: EmployeeId) -> StorageResult<i64> {
        let result = sqlx::query(
            "INSERT INTO attendance_logs (employee_id, detected_at) VALUES (?, ?)",
        )
        .bind(employee_id.as_i64())
        .bind(Utc::now().naive_utc())
        .execute(&self.pool)
        .await?;

        let log_id = result.last_insert_rowid();
        debug!(employee = %employee_id, log_id, "attendance recorded");
        Ok(log_id)
    }

    async fn recent(&self, limit: i64) -> StorageResult<Vec<AttendanceLog>> {
        let logs = sqlx::query_as::<_, AttendanceLog>(
            "SELECT log_id, employee_id, detected_at \
             FROM attendance_logs ORDER BY log_id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(logs)
    }
}

impl AttendanceSink for SqliteAttendanceRepository {
    async fn record(&self, employee_id: EmployeeId) -> smartatt_core::Result<()> {
        self.insert(employee_id).await?;
        Ok(())
    }
}
