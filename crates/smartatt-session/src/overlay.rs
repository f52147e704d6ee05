//! Outside-shift check-in overlay.
//!
//! Check-ins outside the working shift are acknowledged to the person at
//! the kiosk but never persisted; they live on this explicitly owned,
//! time-bounded ring buffer instead, which the UI merges over the
//! durable log. Records expire on read, so a reader never sees anything
//! older than the TTL regardless of when expiry last ran.

use chrono::{DateTime, Local};
use smartatt_core::EmployeeId;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

/// One transient overlay record.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayRecord {
    pub employee_id: EmployeeId,
    /// Display label, e.g. `"101 - Jane Doe"`.
    pub label: String,
    /// Wall-clock time for display.
    pub detected_at: DateTime<Local>,
    /// Monotonic time used for expiry.
    recorded_at: Instant,
}

fn lock_recover<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Capacity- and time-bounded ring buffer of outside-shift check-ins.
///
/// Shared by reference (wrap in `Arc`); both the coordinator and the UI
/// reader go through the same handle.
#[derive(Debug)]
pub struct OutsideShiftOverlay {
    records: Mutex<VecDeque<OverlayRecord>>,
    ttl: Duration,
    capacity: usize,
}

impl OutsideShiftOverlay {
    #[must_use]
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::with_capacity(capacity)),
            ttl,
            capacity,
        }
    }

    /// Append a record, evicting the oldest when full.
    pub fn push(&self, employee_id: EmployeeId, label: impl Into<String>) {
        let mut records = lock_recover(&self.records);
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(OverlayRecord {
            employee_id,
            label: label.into(),
            detected_at: Local::now(),
            recorded_at: Instant::now(),
        });
    }

    /// Current live records, oldest first. Expired entries are pruned
    /// before the snapshot is taken.
    #[must_use]
    pub fn snapshot(&self) -> Vec<OverlayRecord> {
        let now = Instant::now();
        let mut records = lock_recover(&self.records);
        records.retain(|r| now.duration_since(r.recorded_at) < self.ttl);
        records.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    #[tokio::test(start_paused = true)]
    async fn records_expire_on_read() {
        let overlay = OutsideShiftOverlay::new(Duration::from_secs(600), 8);
        overlay.push(EmployeeId::new(1), "101 - A");
        advance(Duration::from_secs(300)).await;
        overlay.push(EmployeeId::new(2), "102 - B");

        assert_eq!(overlay.snapshot().len(), 2);

        advance(Duration::from_secs(301)).await;
        let live = overlay.snapshot();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].employee_id, EmployeeId::new(2));

        advance(Duration::from_secs(600)).await;
        assert!(overlay.snapshot().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn capacity_evicts_oldest() {
        let overlay = OutsideShiftOverlay::new(Duration::from_secs(600), 2);
        overlay.push(EmployeeId::new(1), "a");
        overlay.push(EmployeeId::new(2), "b");
        overlay.push(EmployeeId::new(3), "c");

        let live = overlay.snapshot();
        assert_eq!(live.len(), 2);
        assert_eq!(live[0].employee_id, EmployeeId::new(2));
        assert_eq!(live[1].employee_id, EmployeeId::new(3));
    }
}
