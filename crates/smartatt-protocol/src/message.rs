//! Typed message vocabulary.
//!
//! Decoding is an exact, case-sensitive string match against the known
//! tokens; encoding is plain string formatting plus the line terminator.

use smartatt_core::constants::{
    LINE_TERMINATOR, TOKEN_DEVICE_IDLE, TOKEN_FAIL, TOKEN_PERSON_DETECTED, TOKEN_PROBE,
    TOKEN_PROBE_ACK, TOKEN_RESULT_READY, TOKEN_SUCCESS_PREFIX,
};
use smartatt_core::{Error, Result, StudentId};
use std::fmt;

/// Message received from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEvent {
    /// `NG`: the presence sensor fired.
    PersonDetected,
    /// `CK`: the device is ready to receive a result.
    ResultReady,
    /// `RD`: the device finished displaying and returned to idle.
    DeviceIdle,
    /// `CF`: reply to a `RUOK` liveness probe.
    ProbeAck,
}

impl DeviceEvent {
    /// Decode one trimmed line from the device.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownToken`] for anything outside the fixed
    /// vocabulary. Callers treat that as noise: log at debug, drop.
    ///
    /// # Examples
    ///
    /// ```
    /// use smartatt_protocol::DeviceEvent;
    ///
    /// assert_eq!(DeviceEvent::parse("NG").unwrap(), DeviceEvent::PersonDetected);
    /// assert!(DeviceEvent::parse("ng").is_err());
    /// ```
    pub fn parse(line: &str) -> Result<Self> {
        match line {
            t if t == TOKEN_PERSON_DETECTED => Ok(Self::PersonDetected),
            t if t == TOKEN_RESULT_READY => Ok(Self::ResultReady),
            t if t == TOKEN_DEVICE_IDLE => Ok(Self::DeviceIdle),
            t if t == TOKEN_PROBE_ACK => Ok(Self::ProbeAck),
            other => Err(Error::UnknownToken(other.to_string())),
        }
    }

    /// The wire token for this event.
    #[must_use]
    pub fn token(&self) -> &'static str {
        match self {
            Self::PersonDetected => TOKEN_PERSON_DETECTED,
            Self::ResultReady => TOKEN_RESULT_READY,
            Self::DeviceIdle => TOKEN_DEVICE_IDLE,
            Self::ProbeAck => TOKEN_PROBE_ACK,
        }
    }
}

impl fmt::Display for DeviceEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}

/// Message sent to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCommand {
    /// `RUOK`: liveness probe; the device answers `CF`.
    Probe,
    /// `F`: recognition failed within the session window.
    Fail,
    /// `T<id>`: recognition succeeded for the given student id.
    Success(StudentId),
}

impl HostCommand {
    /// The bare wire token, without the line terminator.
    #[must_use]
    pub fn token(&self) -> String {
        match self {
            Self::Probe => TOKEN_PROBE.to_string(),
            Self::Fail => TOKEN_FAIL.to_string(),
            Self::Success(id) => format!("{TOKEN_SUCCESS_PREFIX}{id}"),
        }
    }

    /// Encode for the wire: token plus `\r\n`.
    ///
    /// # Examples
    ///
    /// ```
    /// use smartatt_core::StudentId;
    /// use smartatt_protocol::HostCommand;
    ///
    /// let cmd = HostCommand::Success(StudentId::new(42));
    /// assert_eq!(cmd.encode(), "T42\r\n");
    /// ```
    #[must_use]
    pub fn encode(&self) -> String {
        format!("{}{}", self.token(), LINE_TERMINATOR)
    }
}

impl fmt::Display for HostCommand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_tokens() {
        assert_eq!(DeviceEvent::parse("NG").unwrap(), DeviceEvent::PersonDetected);
        assert_eq!(DeviceEvent::parse("CK").unwrap(), DeviceEvent::ResultReady);
        assert_eq!(DeviceEvent::parse("RD").unwrap(), DeviceEvent::DeviceIdle);
        assert_eq!(DeviceEvent::parse("CF").unwrap(), DeviceEvent::ProbeAck);
    }

    #[test]
    fn parse_is_exact_and_case_sensitive() {
        for line in ["ng", "Ng", "NGX", " NG", "NG ", "", "OK", "T7"] {
            assert!(DeviceEvent::parse(line).is_err(), "accepted {line:?}");
        }
    }

    #[test]
    fn unknown_token_error_carries_the_line() {
        let err = DeviceEvent::parse("BOGUS").unwrap_err();
        assert!(err.to_string().contains("BOGUS"));
    }

    #[test]
    fn encode_appends_terminator() {
        assert_eq!(HostCommand::Probe.encode(), "RUOK\r\n");
        assert_eq!(HostCommand::Fail.encode(), "F\r\n");
        assert_eq!(HostCommand::Success(StudentId::new(1024)).encode(), "T1024\r\n");
    }

    #[test]
    fn success_token_has_no_separator() {
        let cmd = HostCommand::Success(StudentId::new(7));
        assert_eq!(cmd.token(), "T7");
    }
}
