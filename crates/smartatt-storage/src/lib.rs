//! SQLite-backed attendance log for the kiosk.
//!
//! Persistence here is deliberately narrow: one flat audit table of
//! confirmed check-ins, written fire-and-forget by the session
//! coordinator through the [`AttendanceSink`](smartatt_session::AttendanceSink)
//! trait and read back by the UI's log views. Statistics and roster
//! management live outside this crate.

#![allow(async_fn_in_trait)]

pub mod connection;
pub mod error;
pub mod models;
pub mod repository;

pub use connection::Database;
pub use error::{StorageError, StorageResult};
pub use models::AttendanceLog;
pub use repository::{AttendanceRepository, SqliteAttendanceRepository};
