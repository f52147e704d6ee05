//! Mock transport implementations for testing without physical hardware.

use crate::handshake::ResultPort;
use smartatt_protocol::HostCommand;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Recording [`ResultPort`] for tests.
///
/// Clones share the same recording, so a test can hand one clone to the
/// state machine and keep another to inspect the traffic.
///
/// # Examples
///
/// ```
/// use smartatt_hardware::mock::MockResultPort;
/// use smartatt_hardware::ResultPort;
/// use smartatt_protocol::HostCommand;
///
/// let port = MockResultPort::new();
/// assert!(port.send(&HostCommand::Fail));
/// assert_eq!(port.sent(), vec!["F\r\n"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockResultPort {
    sent: Arc<Mutex<Vec<String>>>,
    fail: Arc<AtomicBool>,
}

impl MockResultPort {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, in wire encoding.
    #[must_use]
    pub fn sent(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Make subsequent sends fail (simulates an unplugged cable).
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl ResultPort for MockResultPort {
    fn send(&self, command: &HostCommand) -> bool {
        if self.fail.load(Ordering::SeqCst) {
            return false;
        }
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(command.encode());
        true
    }
}
