//! The session coordinator.
//!
//! Driven by handshake lifecycle events on one side and arbiter hits on
//! the other, the coordinator owns the [`DeviceSession`] and enforces
//! its invariants:
//!
//! - a new session only starts from a clean idle state (cooldown over,
//!   device idle observed, no session in flight)
//! - at most one outcome per session; the timeout and the hit race each
//!   other and the loser becomes a no-op via the token/outcome check
//! - `DeviceIdle` is the authoritative reset: it invalidates the current
//!   token unconditionally, so no stale callback can resurrect a dead
//!   session across a hardware cycle boundary
//!
//! All handlers are plain synchronous methods so tests can race them
//! deliberately; [`run`](SessionCoordinator::run) is the thin async
//! shell that wires the channels and schedules the timeout callback.

use crate::overlay::OutsideShiftOverlay;
use crate::shift::ShiftWindowPolicy;
use crate::sink::AttendanceSink;
use chrono::Local;
use smartatt_core::config::SessionConfig;
use smartatt_core::{EmployeeId, Severity, StatusUpdate, StudentId};
use smartatt_hardware::{DeviceHandshake, HandshakeEvent, ResultPort};
use smartatt_recognition::{RecognitionArbiter, RecognitionHit};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Submission side of the device handshake, as the coordinator sees it.
pub trait ResultSubmitter: Send + Sync {
    fn submit_success(&self, id: StudentId);
    fn submit_failure(&self);
}

impl<P: ResultPort> ResultSubmitter for DeviceHandshake<P> {
    fn submit_success(&self, id: StudentId) {
        DeviceHandshake::submit_success(self, id);
    }

    fn submit_failure(&self) {
        DeviceHandshake::submit_failure(self);
    }
}

/// Gating side of the recognition arbiter, as the coordinator sees it.
pub trait ArbiterControl: Send + Sync {
    fn arm_session(&self, window: Duration);
    fn pause(&self);
}

impl ArbiterControl for RecognitionArbiter {
    fn arm_session(&self, window: Duration) {
        RecognitionArbiter::arm_session(self, window);
    }

    fn pause(&self) {
        RecognitionArbiter::pause(self);
    }
}

/// Outcome of a check-in session. Write-once: the first write wins and
/// later events must not overwrite it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Pending,
    Success {
        employee_id: EmployeeId,
        label: String,
    },
    Failure,
}

impl SessionOutcome {
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, SessionOutcome::Pending)
    }
}

/// One armed check-in attempt.
///
/// Creating a new session invalidates the prior one implicitly: the
/// token is monotonically increasing and every scheduled callback
/// compares the token it captured against the current one.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSession {
    pub token: u64,
    pub armed_at: Instant,
    pub deadline: Instant,
    pub outcome: SessionOutcome,
}

struct State {
    /// Monotonic token counter; survives session teardown.
    token: u64,
    session: Option<DeviceSession>,
    /// Set once an outcome went to the device; cleared by `DeviceIdle`.
    awaiting_device_idle: bool,
    cooldown_until: Option<Instant>,
}

fn lock_recover<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// See the module docs.
pub struct SessionCoordinator<K: AttendanceSink> {
    device: Arc<dyn ResultSubmitter>,
    arbiter: Arc<dyn ArbiterControl>,
    sink: Arc<K>,
    shift: Arc<dyn ShiftWindowPolicy>,
    overlay: Arc<OutsideShiftOverlay>,
    cfg: SessionConfig,
    status: watch::Sender<StatusUpdate>,
    state: Mutex<State>,
}

impl<K: AttendanceSink + 'static> SessionCoordinator<K> {
    pub fn new(
        device: Arc<dyn ResultSubmitter>,
        arbiter: Arc<dyn ArbiterControl>,
        sink: Arc<K>,
        shift: Arc<dyn ShiftWindowPolicy>,
        overlay: Arc<OutsideShiftOverlay>,
        cfg: SessionConfig,
    ) -> (Arc<Self>, watch::Receiver<StatusUpdate>) {
        let (status_tx, status_rx) = watch::channel(StatusUpdate::new(
            "Recognition ready, waiting for sensor",
            Severity::Idle,
        ));
        let coordinator = Arc::new(Self {
            device,
            arbiter,
            sink,
            shift,
            overlay,
            cfg,
            status: status_tx,
            state: Mutex::new(State {
                token: 0,
                session: None,
                awaiting_device_idle: false,
                cooldown_until: None,
            }),
        });
        (coordinator, status_rx)
    }

    /// Snapshot of the current session, for the UI and for tests.
    #[must_use]
    pub fn current_session(&self) -> Option<DeviceSession> {
        lock_recover(&self.state).session.clone()
    }

    /// React to the sensor firing: open a session and arm the arbiter.
    ///
    /// Returns the new session's token, or `None` when the trigger was
    /// ignored (cooldown, still awaiting device idle, or a session is
    /// already running). The caller schedules the timeout for the
    /// returned token.
    pub fn begin_session(&self) -> Option<u64> {
        let now = Instant::now();
        let window = self.cfg.window();

        let token = {
            let mut st = lock_recover(&self.state);
            if st.cooldown_until.is_some_and(|until| now < until) {
                debug!("sensor trigger ignored: cooldown");
                return None;
            }
            if st.awaiting_device_idle {
                debug!("sensor trigger ignored: awaiting device idle");
                return None;
            }
            if st.session.as_ref().is_some_and(|s| s.outcome.is_pending()) {
                debug!("sensor trigger ignored: session already active");
                return None;
            }

            st.token += 1;
            st.session = Some(DeviceSession {
                token: st.token,
                armed_at: now,
                deadline: now + window,
                outcome: SessionOutcome::Pending,
            });
            st.token
        };

        self.arbiter.arm_session(window);
        self.set_status("Scanning, waiting for face", Severity::Warn);
        debug!(token, "session armed");
        Some(token)
    }

    /// Timeout callback for the session the token was captured from.
    /// A stale token or an already-recorded outcome makes this a no-op.
    pub fn on_timeout(&self, token: u64) {
        {
            let mut st = lock_recover(&self.state);
            let Some(session) = st.session.as_mut() else {
                debug!(token, "timeout for torn-down session ignored");
                return;
            };
            if session.token != token || !session.outcome.is_pending() {
                debug!(token, current = session.token, "stale timeout ignored");
                return;
            }
            session.outcome = SessionOutcome::Failure;
            st.awaiting_device_idle = true;
        }

        self.arbiter.pause();
        self.set_status("User not found", Severity::None);
        self.device.submit_failure();
        debug!(token, "session timed out");
    }

    /// A confirmed recognition from the arbiter.
    pub fn on_hit(&self, hit: &RecognitionHit) {
        let label = format!("{} - {}", hit.student_id, hit.full_name);
        {
            let mut st = lock_recover(&self.state);
            let Some(session) = st.session.as_mut() else {
                debug!("hit with no active session ignored");
                return;
            };
            if !session.outcome.is_pending() {
                debug!("hit after recorded outcome ignored");
                return;
            }
            session.outcome = SessionOutcome::Success {
                employee_id: hit.employee_id,
                label: label.clone(),
            };
            st.awaiting_device_idle = true;
        }

        self.arbiter.pause();
        self.set_status(format!("Recognized: {label}"), Severity::Ok);

        // The log write never holds up the hardware reply.
        if self.shift.is_within_shift(Local::now()) {
            let sink = Arc::clone(&self.sink);
            let status = self.status.clone();
            let employee_id = hit.employee_id;
            tokio::spawn(async move {
                if let Err(e) = sink.record(employee_id).await {
                    warn!(employee = %employee_id, error = %e, "attendance log write failed");
                    let _ = status.send(StatusUpdate::new(
                        format!("Attendance log failed: {e}"),
                        Severity::Warn,
                    ));
                }
            });
        } else {
            self.overlay.push(hit.employee_id, label);
        }

        self.device.submit_success(hit.student_id);
    }

    /// The device is ready for the result; refresh the scanning status.
    /// (The arbiter was armed on the sensor trigger already.)
    pub fn on_device_ready(&self) {
        let active = lock_recover(&self.state)
            .session
            .as_ref()
            .is_some_and(|s| s.outcome.is_pending());
        if active {
            self.set_status("Scanning, waiting for face", Severity::Warn);
        }
    }

    /// The device returned to idle: the authoritative session reset.
    ///
    /// Runs unconditionally, whether or not an outcome was recorded, and
    /// bumps the token so every outstanding callback for the old session
    /// becomes a no-op on delivery.
    pub fn on_device_idle(&self) {
        {
            let mut st = lock_recover(&self.state);
            st.token += 1;
            st.session = None;
            st.awaiting_device_idle = false;
            st.cooldown_until = Some(Instant::now() + self.cfg.cooldown());
        }
        self.arbiter.pause();
        self.set_status("Recognition ready, waiting for sensor", Severity::Idle);
        debug!("session reset on device idle");
    }

    /// Event loop: consumes handshake events and arbiter hits until both
    /// channels close.
    pub async fn run(
        self: Arc<Self>,
        mut events: mpsc::UnboundedReceiver<HandshakeEvent>,
        mut hits: mpsc::UnboundedReceiver<RecognitionHit>,
    ) {
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(HandshakeEvent::PersonDetected) => {
                        if let Some(token) = self.begin_session() {
                            let me = Arc::clone(&self);
                            let window = self.cfg.window();
                            tokio::spawn(async move {
                                tokio::time::sleep(window).await;
                                me.on_timeout(token);
                            });
                        }
                    }
                    Some(HandshakeEvent::DeviceReady) => self.on_device_ready(),
                    Some(HandshakeEvent::DeviceIdle) => self.on_device_idle(),
                    Some(HandshakeEvent::ProbeAck) => {}
                    None => break,
                },
                hit = hits.recv() => match hit {
                    Some(hit) => self.on_hit(&hit),
                    None => break,
                },
            }
        }
    }

    fn set_status(&self, message: impl Into<String>, severity: Severity) {
        let update = StatusUpdate::new(message, severity);
        self.status.send_if_modified(|current| {
            if *current == update {
                false
            } else {
                *current = update;
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use smartatt_core::constants::{OVERLAY_CAPACITY, OVERLAY_TTL_SECS};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::advance;

    #[derive(Default)]
    struct MockDevice {
        successes: Mutex<Vec<StudentId>>,
        failures: AtomicUsize,
    }

    impl MockDevice {
        fn successes(&self) -> Vec<StudentId> {
            lock_recover(&self.successes).clone()
        }

        fn failures(&self) -> usize {
            self.failures.load(Ordering::SeqCst)
        }
    }

    impl ResultSubmitter for MockDevice {
        fn submit_success(&self, id: StudentId) {
            lock_recover(&self.successes).push(id);
        }

        fn submit_failure(&self) {
            self.failures.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct MockArbiter {
        armed: AtomicUsize,
        paused: AtomicUsize,
    }

    impl ArbiterControl for MockArbiter {
        fn arm_session(&self, _window: Duration) {
            self.armed.fetch_add(1, Ordering::SeqCst);
        }

        fn pause(&self) {
            self.paused.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct FixedPolicy(bool);

    impl ShiftWindowPolicy for FixedPolicy {
        fn is_within_shift(&self, _at: chrono::DateTime<Local>) -> bool {
            self.0
        }
    }

    struct Rig {
        coordinator: Arc<SessionCoordinator<MemorySink>>,
        status: watch::Receiver<StatusUpdate>,
        device: Arc<MockDevice>,
        arbiter: Arc<MockArbiter>,
        sink: Arc<MemorySink>,
        overlay: Arc<OutsideShiftOverlay>,
    }

    fn rig(in_shift: bool) -> Rig {
        let device = Arc::new(MockDevice::default());
        let arbiter = Arc::new(MockArbiter::default());
        let sink = Arc::new(MemorySink::new());
        let overlay = Arc::new(OutsideShiftOverlay::new(
            Duration::from_secs(OVERLAY_TTL_SECS),
            OVERLAY_CAPACITY,
        ));
        let (coordinator, status) = SessionCoordinator::new(
            Arc::clone(&device) as Arc<dyn ResultSubmitter>,
            Arc::clone(&arbiter) as Arc<dyn ArbiterControl>,
            Arc::clone(&sink),
            Arc::new(FixedPolicy(in_shift)),
            Arc::clone(&overlay),
            SessionConfig::default(),
        );
        Rig {
            coordinator,
            status,
            device,
            arbiter,
            sink,
            overlay,
        }
    }

    fn hit(employee: i64, student: u32) -> RecognitionHit {
        RecognitionHit {
            employee_id: EmployeeId::new(employee),
            student_id: StudentId::new(student),
            full_name: "Jane Doe".to_string(),
        }
    }

    /// Let spawned background tasks (sink writes) run.
    async fn settle() {
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn begin_session_arms_arbiter_with_fresh_tokens() {
        let r = rig(true);
        let t1 = r.coordinator.begin_session().unwrap();
        r.coordinator.on_device_idle();
        advance(Duration::from_millis(600)).await;
        let t2 = r.coordinator.begin_session().unwrap();

        assert!(t2 > t1);
        assert_eq!(r.arbiter.armed.load(Ordering::SeqCst), 2);
        assert_eq!(r.status.borrow().severity, Severity::Warn);
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_during_cooldown_is_ignored() {
        let r = rig(true);
        r.coordinator.begin_session().unwrap();
        r.coordinator.on_device_idle();

        assert!(r.coordinator.begin_session().is_none());
        advance(Duration::from_millis(600)).await;
        assert!(r.coordinator.begin_session().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_during_active_session_is_ignored() {
        let r = rig(true);
        r.coordinator.begin_session().unwrap();
        assert!(r.coordinator.begin_session().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_while_awaiting_device_idle_is_ignored() {
        let r = rig(true);
        let token = r.coordinator.begin_session().unwrap();
        r.coordinator.on_timeout(token);
        assert!(r.coordinator.begin_session().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_records_failure_exactly_once() {
        let r = rig(true);
        let token = r.coordinator.begin_session().unwrap();

        r.coordinator.on_timeout(token);
        r.coordinator.on_timeout(token);

        assert_eq!(r.device.failures(), 1);
        assert_eq!(r.arbiter.paused.load(Ordering::SeqCst), 1);
        assert_eq!(
            r.coordinator.current_session().unwrap().outcome,
            SessionOutcome::Failure
        );
        assert_eq!(r.status.borrow().severity, Severity::None);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_timeout_cannot_touch_a_new_session() {
        let r = rig(true);
        let t1 = r.coordinator.begin_session().unwrap();
        r.coordinator.on_device_idle();
        advance(Duration::from_millis(600)).await;
        let t2 = r.coordinator.begin_session().unwrap();

        r.coordinator.on_timeout(t1);

        assert_eq!(r.device.failures(), 0);
        let session = r.coordinator.current_session().unwrap();
        assert_eq!(session.token, t2);
        assert!(session.outcome.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn hit_then_late_timeout_records_one_outcome() {
        let r = rig(true);
        let token = r.coordinator.begin_session().unwrap();

        r.coordinator.on_hit(&hit(1, 101));
        r.coordinator.on_timeout(token);
        settle().await;

        assert_eq!(r.device.successes(), vec![StudentId::new(101)]);
        assert_eq!(r.device.failures(), 0);
        assert_eq!(r.sink.records(), vec![EmployeeId::new(1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_then_late_hit_records_one_outcome() {
        let r = rig(true);
        let token = r.coordinator.begin_session().unwrap();

        r.coordinator.on_timeout(token);
        r.coordinator.on_hit(&hit(1, 101));
        settle().await;

        assert_eq!(r.device.failures(), 1);
        assert!(r.device.successes().is_empty());
        assert!(r.sink.records().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn callbacks_after_device_idle_are_inert() {
        let r = rig(true);
        let token = r.coordinator.begin_session().unwrap();
        r.coordinator.on_device_idle();

        r.coordinator.on_timeout(token);
        r.coordinator.on_hit(&hit(1, 101));
        settle().await;

        assert_eq!(r.device.failures(), 0);
        assert!(r.device.successes().is_empty());
        assert!(r.sink.records().is_empty());
        assert!(r.coordinator.current_session().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn in_shift_hit_is_persisted() {
        let r = rig(true);
        r.coordinator.begin_session().unwrap();
        r.coordinator.on_hit(&hit(7, 107));
        settle().await;

        assert_eq!(r.sink.records(), vec![EmployeeId::new(7)]);
        assert!(r.overlay.snapshot().is_empty());
        assert_eq!(r.status.borrow().severity, Severity::Ok);
    }

    #[tokio::test(start_paused = true)]
    async fn outside_shift_hit_goes_to_the_overlay_only() {
        let r = rig(false);
        r.coordinator.begin_session().unwrap();
        r.coordinator.on_hit(&hit(7, 107));
        settle().await;

        assert!(r.sink.records().is_empty());
        let overlay = r.overlay.snapshot();
        assert_eq!(overlay.len(), 1);
        assert_eq!(overlay[0].employee_id, EmployeeId::new(7));
        assert_eq!(overlay[0].label, "107 - Jane Doe");
        // The device still gets the success reply.
        assert_eq!(r.device.successes(), vec![StudentId::new(107)]);
    }

    #[tokio::test(start_paused = true)]
    async fn device_idle_is_the_authoritative_reset() {
        let r = rig(true);
        r.coordinator.begin_session().unwrap();
        r.coordinator.on_hit(&hit(1, 101));
        settle().await;

        r.coordinator.on_device_idle();
        assert!(r.coordinator.current_session().is_none());
        assert_eq!(r.status.borrow().severity, Severity::Idle);
        // Arbiter paused by the hit, then again by the reset.
        assert_eq!(r.arbiter.paused.load(Ordering::SeqCst), 2);
    }
}
