//! Runtime configuration.
//!
//! The debounce, retransmission and recognition constants were tuned
//! empirically against one specific sensor/camera pair; they are exposed
//! here so a deployment can retune them, with the tuned values preserved
//! as defaults. Every section and every field is optional in the source
//! JSON; anything absent falls back to the defaults in
//! [`crate::constants`].
//!
//! # Examples
//!
//! ```
//! use smartatt_core::Config;
//!
//! let cfg: Config = serde_json::from_str(r#"{"session": {"window_secs": 10}}"#).unwrap();
//! assert_eq!(cfg.session.window_secs, 10);
//! assert_eq!(cfg.handshake.ng_debounce_ms, 150);
//! ```

use crate::constants;
use crate::error::{Error, Result};
use chrono::NaiveTime;
use serde::Deserialize;
use std::time::Duration;

/// Top-level kiosk configuration.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub serial: SerialConfig,
    pub handshake: HandshakeConfig,
    pub recognition: RecognitionConfig,
    pub session: SessionConfig,
    pub shift: ShiftConfig,
    pub database: DatabaseConfig,
}

/// Attendance database location.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://attendance.db".to_string(),
        }
    }
}

/// Serial link settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SerialConfig {
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
    pub reconnect_delay_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: constants::DEFAULT_BAUD_RATE,
            read_timeout_ms: constants::SERIAL_READ_TIMEOUT_MS,
            reconnect_delay_ms: constants::RECONNECT_DELAY_MS,
        }
    }
}

impl SerialConfig {
    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    #[must_use]
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

/// Device handshake timing.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct HandshakeConfig {
    pub ng_debounce_ms: u64,
    pub resend_interval_ms: u64,
    pub resend_window_ms: u64,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            ng_debounce_ms: constants::NG_DEBOUNCE_MS,
            resend_interval_ms: constants::RESEND_INTERVAL_MS,
            resend_window_ms: constants::RESEND_WINDOW_MS,
        }
    }
}

impl HandshakeConfig {
    #[must_use]
    pub fn ng_debounce(&self) -> Duration {
        Duration::from_millis(self.ng_debounce_ms)
    }

    #[must_use]
    pub fn resend_interval(&self) -> Duration {
        Duration::from_millis(self.resend_interval_ms)
    }

    #[must_use]
    pub fn resend_window(&self) -> Duration {
        Duration::from_millis(self.resend_window_ms)
    }
}

/// Recognition pipeline tuning.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RecognitionConfig {
    pub poll_period_ms: u64,
    pub arm_delay_ms: u64,
    pub match_threshold: f32,
    pub separation_margin: f32,
    pub min_detector_confidence: f32,
    pub min_face_size_px: u32,
    pub blur_threshold: f64,
    pub rebuild_interval_secs: u64,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            poll_period_ms: constants::POLL_PERIOD_MS,
            arm_delay_ms: constants::ARM_DELAY_MS,
            match_threshold: constants::MATCH_THRESHOLD,
            separation_margin: constants::SEPARATION_MARGIN,
            min_detector_confidence: constants::MIN_DETECTOR_CONFIDENCE,
            min_face_size_px: constants::MIN_FACE_SIZE_PX,
            blur_threshold: constants::BLUR_THRESHOLD,
            rebuild_interval_secs: constants::REBUILD_INTERVAL_SECS,
        }
    }
}

impl RecognitionConfig {
    #[must_use]
    pub fn poll_period(&self) -> Duration {
        Duration::from_millis(self.poll_period_ms)
    }

    #[must_use]
    pub fn arm_delay(&self) -> Duration {
        Duration::from_millis(self.arm_delay_ms)
    }

    #[must_use]
    pub fn rebuild_interval(&self) -> Duration {
        Duration::from_secs(self.rebuild_interval_secs)
    }
}

/// Check-in session timing.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    pub window_secs: u64,
    pub cooldown_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            window_secs: constants::SESSION_WINDOW_SECS,
            cooldown_ms: constants::COOLDOWN_MS,
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    #[must_use]
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

/// Working shift window deciding durable log vs. transient overlay.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ShiftConfig {
    /// Shift start, `HH:MM:SS` local time.
    pub start: String,
    /// Shift end, `HH:MM:SS` local time.
    pub end: String,
    pub overlay_ttl_secs: u64,
}

impl Default for ShiftConfig {
    fn default() -> Self {
        Self {
            start: constants::SHIFT_START.to_string(),
            end: constants::SHIFT_END.to_string(),
            overlay_ttl_secs: constants::OVERLAY_TTL_SECS,
        }
    }
}

impl ShiftConfig {
    /// Parse the configured shift bounds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when either bound is not a valid
    /// `HH:MM:SS` time or the window is inverted.
    pub fn bounds(&self) -> Result<(NaiveTime, NaiveTime)> {
        let start = NaiveTime::parse_from_str(&self.start, "%H:%M:%S")
            .map_err(|e| Error::Config(format!("shift.start: {e}")))?;
        let end = NaiveTime::parse_from_str(&self.end, "%H:%M:%S")
            .map_err(|e| Error::Config(format!("shift.end: {e}")))?;
        if start >= end {
            return Err(Error::Config(format!(
                "shift window is inverted: {} >= {}",
                self.start, self.end
            )));
        }
        Ok((start, end))
    }

    #[must_use]
    pub fn overlay_ttl(&self) -> Duration {
        Duration::from_secs(self.overlay_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_preserve_tuned_values() {
        let cfg = Config::default();
        assert_eq!(cfg.handshake.ng_debounce_ms, 150);
        assert_eq!(cfg.handshake.resend_interval_ms, 200);
        assert_eq!(cfg.handshake.resend_window_ms, 2500);
        assert_eq!(cfg.recognition.arm_delay_ms, 300);
        assert_eq!(cfg.session.window_secs, 15);
        assert_eq!(cfg.serial.baud_rate, 9600);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let cfg: Config =
            serde_json::from_str(r#"{"recognition": {"match_threshold": 0.55}}"#).unwrap();
        assert_eq!(cfg.recognition.match_threshold, 0.55);
        assert_eq!(cfg.recognition.separation_margin, 0.08);
        assert_eq!(cfg.session.window_secs, 15);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let res: std::result::Result<Config, _> =
            serde_json::from_str(r#"{"sessionn": {"window_secs": 10}}"#);
        assert!(res.is_err());
    }

    #[test]
    fn shift_bounds_parse_and_validate() {
        let shift = ShiftConfig::default();
        let (start, end) = shift.bounds().unwrap();
        assert!(start < end);

        let inverted = ShiftConfig {
            start: "18:00:00".into(),
            end: "07:00:00".into(),
            ..ShiftConfig::default()
        };
        assert!(inverted.bounds().is_err());
    }
}
