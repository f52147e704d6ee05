//! Working-shift window policy.
//!
//! Decides whether a confirmed check-in goes to the durable attendance
//! log or onto the transient outside-shift overlay.

use chrono::{DateTime, Local, NaiveTime, Timelike};
use smartatt_core::Result;
use smartatt_core::config::ShiftConfig;

/// Decides whether a timestamp falls inside the working shift.
pub trait ShiftWindowPolicy: Send + Sync {
    fn is_within_shift(&self, at: DateTime<Local>) -> bool;
}

/// Fixed daily window, bounds inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedShiftWindow {
    start: NaiveTime,
    end: NaiveTime,
}

impl FixedShiftWindow {
    #[must_use]
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Build from configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the bounds do not parse or
    /// the window is inverted.
    pub fn from_config(cfg: &ShiftConfig) -> Result<Self> {
        let (start, end) = cfg.bounds()?;
        Ok(Self { start, end })
    }
}

impl ShiftWindowPolicy for FixedShiftWindow {
    fn is_within_shift(&self, at: DateTime<Local>) -> bool {
        let t = at.time();
        // Compare at second granularity so 17:00:00.4 still counts.
        let t = t
            .with_nanosecond(0)
            .unwrap_or(t);
        self.start <= t && t <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 6, 2, h, m, s).unwrap()
    }

    fn window() -> FixedShiftWindow {
        FixedShiftWindow::from_config(&ShiftConfig::default()).unwrap()
    }

    #[test]
    fn defaults_cover_working_hours() {
        let w = window();
        assert!(w.is_within_shift(at(7, 0, 0)));
        assert!(w.is_within_shift(at(12, 30, 0)));
        assert!(w.is_within_shift(at(17, 0, 0)));
    }

    #[test]
    fn outside_hours_are_rejected() {
        let w = window();
        assert!(!w.is_within_shift(at(6, 59, 59)));
        assert!(!w.is_within_shift(at(17, 0, 1)));
        assert!(!w.is_within_shift(at(23, 0, 0)));
    }
}
