use chrono::NaiveDateTime;
use sqlx::FromRow;

/// One confirmed check-in in the durable audit log.
///
/// Timestamps are stored in UTC; presentation converts to local time.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct AttendanceLog {
    pub log_id: i64,
    pub employee_id: i64,
    pub detected_at: NaiveDateTime,
}
