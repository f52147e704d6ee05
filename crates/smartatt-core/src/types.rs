use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Internal employee identifier (database key).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EmployeeId(i64);

impl EmployeeId {
    #[must_use]
    pub fn new(id: i64) -> Self {
        EmployeeId(id)
    }

    #[must_use]
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for EmployeeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Student/badge number shown on the device display.
///
/// This is the identifier sent over the wire in the `T<id>` success token,
/// printed as plain decimal with no separators.
///
/// # Examples
///
/// ```
/// use smartatt_core::StudentId;
///
/// let sid = StudentId::new(1024);
/// assert_eq!(sid.to_string(), "1024");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StudentId(u32);

impl StudentId {
    #[must_use]
    pub fn new(id: u32) -> Self {
        StudentId(id)
    }

    #[must_use]
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for StudentId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let id: u32 = s
            .parse()
            .map_err(|_| Error::InvalidMessageFormat(format!("Invalid student id: {s}")))?;
        Ok(StudentId(id))
    }
}

/// One enrolled face in the recognition library.
///
/// Loaded from the roster supplier and treated as an immutable snapshot
/// while the library cache holds it; a rebuild swaps the whole snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceLibraryEntry {
    pub employee_id: EmployeeId,
    pub student_id: StudentId,
    pub full_name: String,
    /// Absolute path of the enrollment image the embeddings come from.
    pub image_path: String,
}

/// Severity of a recognition/session status line.
///
/// Mirrors what the UI layer renders: `Idle` for the waiting baseline,
/// `None` for "nothing usable in frame", `Warn` for soft problems, `Ok`
/// for a confirmed hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Idle,
    None,
    Warn,
    Ok,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Severity::Idle => "idle",
            Severity::None => "none",
            Severity::Warn => "warn",
            Severity::Ok => "ok",
        };
        write!(f, "{s}")
    }
}

/// A coalesced status update for the UI layer.
///
/// Only the latest value matters; intermediate values may be dropped
/// under load.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub message: String,
    pub severity: Severity,
}

impl StatusUpdate {
    pub fn new(message: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            severity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn student_id_displays_plain_decimal() {
        assert_eq!(StudentId::new(7).to_string(), "7");
        assert_eq!(StudentId::new(1024).to_string(), "1024");
    }

    #[test]
    fn student_id_parses_decimal() {
        assert_eq!(StudentId::from_str("42").unwrap(), StudentId::new(42));
        assert!(StudentId::from_str("4x2").is_err());
        assert!(StudentId::from_str("-1").is_err());
    }

    #[test]
    fn severity_serializes_snake_case() {
        let json = serde_json::to_string(&Severity::Warn).unwrap();
        assert_eq!(json, "\"warn\"");
    }
}
