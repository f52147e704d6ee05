//! Error types for hardware operations.
//!
//! Most serial failures in this crate are handled in place (close the
//! link, reconnect, retry next tick) and surface only as logs; these
//! types carry the detail of what went wrong between the failure site
//! and the log line.

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur during hardware device operations.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// No serial port matching the USB-UART description heuristics exists.
    #[error("No UART device found (looked for: {hints})")]
    NoPortFound { hints: String },

    /// Device communication error.
    #[error("Communication error: {message}")]
    CommunicationError { message: String },

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HardwareError {
    /// Create a new no-port-found error from the discovery hint list.
    pub fn no_port_found(hints: &[&str]) -> Self {
        Self::NoPortFound {
            hints: hints.join(", "),
        }
    }

    /// Create a new communication error.
    pub fn communication(message: impl Into<String>) -> Self {
        Self::CommunicationError {
            message: message.into(),
        }
    }
}

impl From<serialport::Error> for HardwareError {
    fn from(err: serialport::Error) -> Self {
        Self::CommunicationError {
            message: err.to_string(),
        }
    }
}
