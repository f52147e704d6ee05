//! Attendance log sink.
//!
//! The durable log write is fire-and-forget from the coordinator's
//! perspective: it runs off the hot path and a failure only degrades to
//! a warning status, never to a lost hardware reply.

use smartatt_core::{EmployeeId, Result};
use std::future::Future;
use std::sync::{Mutex, MutexGuard};

/// Durable attendance log write.
///
/// The future is `Send` so the coordinator can run it on a background
/// task.
pub trait AttendanceSink: Send + Sync {
    fn record(&self, employee_id: EmployeeId) -> impl Future<Output = Result<()>> + Send;
}

fn lock_recover<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-memory sink for tests and for running the kiosk without a
/// database.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<EmployeeId>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn records(&self) -> Vec<EmployeeId> {
        lock_recover(&self.records).clone()
    }
}

impl AttendanceSink for MemorySink {
    async fn record(&self, employee_id: EmployeeId) -> Result<()> {
        lock_recover(&self.records).push(employee_id);
        Ok(())
    }
}
