//! Protocol and timing constants for the attendance kiosk.
//!
//! This module centralizes the fixed vocabulary exchanged with the ATmega
//! sensor/display board and the timing values tuned against the deployed
//! sensor/camera pair. The timing values double as the defaults of
//! [`crate::config::Config`]; change them there, not here.
//!
//! # Wire Protocol
//!
//! The serial link is line-oriented ASCII, `\r\n` terminated, 9600-8N1.
//!
//! | Direction | Token | Meaning |
//! |-----------|-------|---------|
//! | device → host | `NG` | sensor detected a person |
//! | device → host | `CK` | device ready to receive a result |
//! | device → host | `RD` | device finished displaying, back to idle |
//! | device → host | `CF` | reply to a liveness probe |
//! | host → device | `RUOK` | liveness probe |
//! | host → device | `F` | recognition failed |
//! | host → device | `T<id>` | recognition succeeded for student `<id>` |
//!
//! # Examples
//!
//! ```
//! use smartatt_core::constants::{TOKEN_PERSON_DETECTED, TOKEN_SUCCESS_PREFIX};
//!
//! assert_eq!(TOKEN_PERSON_DETECTED, "NG");
//! let wire = format!("{}{}", TOKEN_SUCCESS_PREFIX, 1024);
//! assert_eq!(wire, "T1024");
//! ```

// ============================================================================
// Device → Host Tokens
// ============================================================================

/// Sensor detected a person in front of the kiosk (event trigger).
pub const TOKEN_PERSON_DETECTED: &str = "NG";

/// Device is ready to receive a recognition result.
pub const TOKEN_RESULT_READY: &str = "CK";

/// Device finished displaying the result and returned to idle.
pub const TOKEN_DEVICE_IDLE: &str = "RD";

/// Device acknowledges a liveness probe.
pub const TOKEN_PROBE_ACK: &str = "CF";

// ============================================================================
// Host → Device Tokens
// ============================================================================

/// Liveness probe sent to the device.
pub const TOKEN_PROBE: &str = "RUOK";

/// Recognition failed within the session window.
pub const TOKEN_FAIL: &str = "F";

/// Prefix of the success token; the decimal student id follows verbatim.
pub const TOKEN_SUCCESS_PREFIX: &str = "T";

/// Line terminator appended to every outbound token.
pub const LINE_TERMINATOR: &str = "\r\n";

// ============================================================================
// Serial Link
// ============================================================================

/// UART baud rate of the ATmega board (8 data bits, no parity, 1 stop bit).
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Poll timeout for serial reads, milliseconds. Short enough that the
/// reader loop notices shutdown and reconnect requests promptly.
pub const SERIAL_READ_TIMEOUT_MS: u64 = 200;

/// Settle delay after opening the port, milliseconds. Opening the port
/// resets the MCU through DTR; it needs this long before it can talk.
pub const MCU_RESET_DELAY_MS: u64 = 2000;

/// Delay between reconnection attempts when the port is gone, milliseconds.
pub const RECONNECT_DELAY_MS: u64 = 1000;

/// USB-serial bridge description substrings accepted by port discovery
/// (case-insensitive).
pub const USB_UART_HINTS: &[&str] = &["ch340", "cp210", "uart"];

// ============================================================================
// Handshake Timing
// ============================================================================

/// Repeated `NG` tokens closer together than this are ignored, milliseconds.
pub const NG_DEBOUNCE_MS: u64 = 150;

/// Interval between retransmissions of an unacknowledged result, milliseconds.
pub const RESEND_INTERVAL_MS: u64 = 200;

/// Total retransmission window, milliseconds. Once elapsed the result is
/// abandoned silently; the session timeout recovers at a higher level.
pub const RESEND_WINDOW_MS: u64 = 2500;

// ============================================================================
// Recognition Tuning
// ============================================================================

/// Recognition poll period, milliseconds.
pub const POLL_PERIOD_MS: u64 = 1000;

/// Delay after arming before frames start counting, milliseconds. The
/// first frames after the sensor fires still show the approach, not a
/// steady face.
pub const ARM_DELAY_MS: u64 = 300;

/// Minimum cosine similarity accepted for the top-ranked identity.
pub const MATCH_THRESHOLD: f32 = 0.40;

/// Minimum gap between the best and second-best identity scores.
pub const SEPARATION_MARGIN: f32 = 0.08;

/// Minimum detector confidence for a bounding box to be considered.
pub const MIN_DETECTOR_CONFIDENCE: f32 = 0.90;

/// Minimum bounding box edge in pixels.
pub const MIN_FACE_SIZE_PX: u32 = 80;

/// Minimum variance-of-Laplacian sharpness of the cropped face.
pub const BLUR_THRESHOLD: f64 = 50.0;

/// Crop padding as a fraction of the larger bounding box edge.
pub const CROP_PAD_RATIO: f32 = 0.12;

/// Consecutive same-identity matches required before a hit is declared.
pub const STREAK_TARGET: u32 = 2;

/// How often the face library supplier is reconsulted, seconds. The
/// rebuild itself only runs when the entry count changed.
pub const REBUILD_INTERVAL_SECS: u64 = 20;

// ============================================================================
// Session Timing
// ============================================================================

/// Recognition window opened per sensor trigger, seconds.
pub const SESSION_WINDOW_SECS: u64 = 15;

/// Cooldown after a hardware cycle ends before a new `NG` is honored,
/// milliseconds.
pub const COOLDOWN_MS: u64 = 500;

// ============================================================================
// Shift Window
// ============================================================================

/// Start of the working shift, local time.
pub const SHIFT_START: &str = "07:00:00";

/// End of the working shift, local time.
pub const SHIFT_END: &str = "17:00:00";

/// Lifetime of an outside-shift overlay record, seconds.
pub const OVERLAY_TTL_SECS: u64 = 600;

/// Maximum number of outside-shift overlay records kept in memory.
pub const OVERLAY_CAPACITY: usize = 64;
