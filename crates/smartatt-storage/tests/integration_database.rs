//! Integration tests against an in-memory SQLite database.

use smartatt_core::EmployeeId;
use smartatt_session::AttendanceSink;
use smartatt_storage::{AttendanceRepository, Database, SqliteAttendanceRepository};

async fn repository() -> SqliteAttendanceRepository {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    SqliteAttendanceRepository::new(db.pool().clone())
}

#[tokio::test]
async fn insert_and_read_back() {
    let repo = repository().await;

    let first = repo.insert(EmployeeId::new(1)).await.unwrap();
    let second = repo.insert(EmployeeId::new(2)).await.unwrap();
    assert!(second > first);

    let logs = repo.recent(10).await.unwrap();
    assert_eq!(logs.len(), 2);
    // Newest first.
    assert_eq!(logs[0].employee_id, 2);
    assert_eq!(logs[1].employee_id, 1);
}

#[tokio::test]
async fn recent_respects_the_limit() {
    let repo = repository().await;
    for id in 0..5 {
        repo.insert(EmployeeId::new(id)).await.unwrap();
    }
    let logs = repo.recent(3).await.unwrap();
    assert_eq!(logs.len(), 3);
    assert_eq!(logs[0].employee_id, 4);
}

#[tokio::test]
async fn repository_acts_as_an_attendance_sink() {
    let repo = repository().await;
    AttendanceSink::record(&repo, EmployeeId::new(42))
        .await
        .unwrap();

    let logs = repo.recent(1).await.unwrap();
    assert_eq!(logs[0].employee_id, 42);
}

#[tokio::test]
async fn schema_creation_is_idempotent() {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    // Re-applying the schema on an existing pool must not fail.
    let again = Database::connect("sqlite::memory:").await;
    assert!(again.is_ok());
    drop(db);
}
