//! Device handshake state machine.
//!
//! Tracks the ATmega board's physical check-in cycle and owns the
//! retransmission of the recognition result until the board acknowledges
//! it. One instance exists per process; it is driven from the serial
//! reader thread ([`handle_event`](DeviceHandshake::handle_event)) and
//! from the session coordinator ([`submit_success`](DeviceHandshake::submit_success) /
//! [`submit_failure`](DeviceHandshake::submit_failure)), so all state
//! lives behind one mutex.
//!
//! # States and Transitions
//!
//! | State | On `NG` | On `CK` | On `RD` | On `CF` |
//! |-------|---------|---------|---------|---------|
//! | `Idle` | → `WaitDeviceReady`, emit `PersonDetected` | ignored | → `Idle` | no-op |
//! | `WaitDeviceReady` | ignored (debounced) | → `Recognizing`, emit `DeviceReady`; pending result released | → `Idle` (abort) | no-op |
//! | `Recognizing` | ignored | ignored | → `Idle` (abort), clear pending | no-op |
//! | `WaitDeviceAck` | ignored | ignored | → `Idle`, stop resend, emit `DeviceIdle` | no-op |
//!
//! `RD` is the authoritative reset: from any state it lands in `Idle`
//! with pending and last result cleared. Unexpected tokens for the
//! current state are logged and ignored; the device may resend, or the
//! host may have missed an earlier transition; neither is fatal.
//!
//! # Result Submission
//!
//! A result submitted while the board is still preparing
//! (`WaitDeviceReady`) is stashed and released the instant `CK` arrives.
//! Submitted during `Recognizing` or `WaitDeviceAck` it goes out
//! immediately. Submitted from `Idle` it is a no-op (logic error
//! upstream, logged, never a crash).
//!
//! # Retransmission
//!
//! While in `WaitDeviceAck` the last payload is resent on a fixed
//! interval until `RD` arrives or the resend window elapses, at which
//! point the result is abandoned silently (the session timeout recovers
//! at a higher level). A fresh submission restarts the window; the
//! single long-lived resend loop reads the current deadline each tick,
//! so no second loop can ever run concurrently.

use smartatt_core::StudentId;
use smartatt_core::config::HandshakeConfig;
use smartatt_protocol::{DeviceEvent, HostCommand};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Write access to the device, injected so tests can record traffic.
///
/// Implementations must not block for long and must not panic on I/O
/// failure; returning `false` is the only failure signal.
pub trait ResultPort: Send + Sync {
    /// Send one command to the device. Returns whether the write reached
    /// the OS buffer.
    fn send(&self, command: &HostCommand) -> bool;
}

impl<T: ResultPort + ?Sized> ResultPort for Arc<T> {
    fn send(&self, command: &HostCommand) -> bool {
        (**self).send(command)
    }
}

/// Phase of the device's physical check-in cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakeState {
    /// Waiting for the presence sensor to fire.
    Idle,

    /// Sensor fired; the board is preparing to receive a result.
    WaitDeviceReady,

    /// Board signalled `CK`; the recognition window is running.
    Recognizing,

    /// Result sent; waiting for the board to display it and reply `RD`.
    WaitDeviceAck,
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HandshakeState::Idle => "Idle",
            HandshakeState::WaitDeviceReady => "WaitDeviceReady",
            HandshakeState::Recognizing => "Recognizing",
            HandshakeState::WaitDeviceAck => "WaitDeviceAck",
        };
        write!(f, "{s}")
    }
}

impl HandshakeState {
    /// Whether a submitted result would be accepted in this state
    /// (sent now or queued as pending).
    #[must_use]
    pub fn accepts_result(&self) -> bool {
        !matches!(self, HandshakeState::Idle)
    }
}

/// Lifecycle event emitted toward the session coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeEvent {
    /// The presence sensor fired and a new cycle started.
    PersonDetected,
    /// The board is ready to receive a result.
    DeviceReady,
    /// The board displayed the result and returned to idle.
    DeviceIdle,
    /// The board answered a liveness probe.
    ProbeAck,
}

struct Inner {
    state: HandshakeState,
    /// Instant of the last `NG` that passed the debounce filter.
    last_ng: Option<Instant>,
    /// Result produced before the board signalled `CK`.
    pending: Option<HostCommand>,
    /// Last result sent, kept for retransmission.
    last_result: Option<HostCommand>,
    /// End of the current retransmission window; `None` when no resend
    /// is in flight.
    resend_deadline: Option<Instant>,
}

/// The handshake state machine. See the module docs for the protocol.
pub struct DeviceHandshake<P: ResultPort> {
    port: P,
    cfg: HandshakeConfig,
    events: mpsc::UnboundedSender<HandshakeEvent>,
    inner: Mutex<Inner>,
}

/// Lock a mutex, recovering the inner value if a holder panicked.
fn lock_recover<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<P: ResultPort> DeviceHandshake<P> {
    /// Create the machine in `Idle` and the channel its lifecycle events
    /// arrive on.
    pub fn new(port: P, cfg: HandshakeConfig) -> (Arc<Self>, mpsc::UnboundedReceiver<HandshakeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let fsm = Arc::new(Self {
            port,
            cfg,
            events: tx,
            inner: Mutex::new(Inner {
                state: HandshakeState::Idle,
                last_ng: None,
                pending: None,
                last_result: None,
                resend_deadline: None,
            }),
        });
        (fsm, rx)
    }

    /// Current state (snapshot; may be stale by the time it is used).
    #[must_use]
    pub fn state(&self) -> HandshakeState {
        lock_recover(&self.inner).state
    }

    /// Feed one decoded device token into the machine.
    pub fn handle_event(&self, event: DeviceEvent) {
        match event {
            DeviceEvent::PersonDetected => self.on_person_detected(),
            DeviceEvent::ResultReady => self.on_result_ready(),
            DeviceEvent::DeviceIdle => self.on_device_idle(),
            DeviceEvent::ProbeAck => {
                debug!("device answered probe");
                self.emit(HandshakeEvent::ProbeAck);
            }
        }
    }

    fn on_person_detected(&self) {
        let mut inner = lock_recover(&self.inner);

        let now = Instant::now();
        if let Some(last) = inner.last_ng
            && now.duration_since(last) < self.cfg.ng_debounce()
        {
            debug!("NG debounced");
            return;
        }
        inner.last_ng = Some(now);

        if inner.state != HandshakeState::Idle {
            debug!(state = %inner.state, "NG ignored");
            return;
        }

        inner.state = HandshakeState::WaitDeviceReady;
        inner.pending = None;
        inner.last_result = None;
        inner.resend_deadline = None;
        drop(inner);

        debug!("person detected, waiting for device ready");
        self.emit(HandshakeEvent::PersonDetected);
    }

    fn on_result_ready(&self) {
        let mut inner = lock_recover(&self.inner);

        if inner.state != HandshakeState::WaitDeviceReady {
            debug!(state = %inner.state, "CK ignored");
            return;
        }

        inner.state = HandshakeState::Recognizing;

        // Release a result that arrived before the board was ready.
        if let Some(payload) = inner.pending.take() {
            self.send_locked(&mut inner, payload);
        }
        drop(inner);

        debug!("device ready");
        self.emit(HandshakeEvent::DeviceReady);
    }

    fn on_device_idle(&self) {
        let mut inner = lock_recover(&self.inner);
        let previous = inner.state;
        inner.state = HandshakeState::Idle;
        inner.pending = None;
        inner.last_result = None;
        inner.resend_deadline = None;
        drop(inner);

        // A duplicate RD while already idle clears nothing and must not
        // re-fire the cycle-end hook downstream.
        if previous != HandshakeState::Idle {
            debug!(from = %previous, "device idle");
            self.emit(HandshakeEvent::DeviceIdle);
        }
    }

    /// Submit the failure outcome for the current cycle.
    pub fn submit_failure(&self) {
        self.submit(HostCommand::Fail);
    }

    /// Submit the success outcome for the current cycle.
    pub fn submit_success(&self, id: StudentId) {
        self.submit(HostCommand::Success(id));
    }

    fn submit(&self, command: HostCommand) {
        let mut inner = lock_recover(&self.inner);
        match inner.state {
            HandshakeState::WaitDeviceReady => {
                debug!(command = %command, "result queued until device ready");
                inner.pending = Some(command);
            }
            HandshakeState::Recognizing | HandshakeState::WaitDeviceAck => {
                self.send_locked(&mut inner, command);
            }
            HandshakeState::Idle => {
                warn!(command = %command, "result submitted with no cycle active, dropped");
            }
        }
    }

    /// Send a result and arm retransmission. A failed write still arms
    /// the resend window: the next tick retries the identical payload.
    fn send_locked(&self, inner: &mut Inner, command: HostCommand) {
        if !self.port.send(&command) {
            warn!(command = %command, "result send failed, retransmission will retry");
        }
        inner.last_result = Some(command);
        inner.state = HandshakeState::WaitDeviceAck;
        inner.resend_deadline = Some(Instant::now() + self.cfg.resend_window());
    }

    /// Send a liveness probe. Allowed in any state.
    pub fn probe(&self) {
        let _ = self.port.send(&HostCommand::Probe);
    }

    /// One pass of the retransmission loop.
    ///
    /// Resends the last result while the machine is in `WaitDeviceAck`
    /// and the window has not elapsed; once it has, the result is
    /// abandoned and ticks become no-ops until the next submission.
    pub fn resend_tick(&self) {
        let mut inner = lock_recover(&self.inner);
        if inner.state != HandshakeState::WaitDeviceAck {
            return;
        }
        let Some(deadline) = inner.resend_deadline else {
            return;
        };
        if Instant::now() > deadline {
            debug!("resend window exhausted, giving up");
            inner.resend_deadline = None;
            return;
        }
        if let Some(command) = inner.last_result.clone() {
            let _ = self.port.send(&command);
        }
    }

    /// Drive [`resend_tick`](Self::resend_tick) on the configured
    /// interval forever. Spawn exactly once; abort the task to stop.
    pub async fn run_resend_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.cfg.resend_interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            self.resend_tick();
        }
    }

    fn emit(&self, event: HandshakeEvent) {
        // The receiver outlives the FSM in normal operation; a closed
        // channel only happens during shutdown.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockResultPort;
    use rstest::rstest;
    use tokio::time::{Duration, advance};

    fn handshake() -> (
        Arc<DeviceHandshake<MockResultPort>>,
        MockResultPort,
        mpsc::UnboundedReceiver<HandshakeEvent>,
    ) {
        let port = MockResultPort::new();
        let (fsm, rx) = DeviceHandshake::new(port.clone(), HandshakeConfig::default());
        (fsm, port, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<HandshakeEvent>) -> Vec<HandshakeEvent> {
        let mut out = Vec::new();
        while let Ok(e) = rx.try_recv() {
            out.push(e);
        }
        out
    }

    /// Walk the machine into each state.
    async fn walk_to<P: ResultPort>(fsm: &DeviceHandshake<P>, target: HandshakeState) {
        if target == HandshakeState::Idle {
            return;
        }
        fsm.handle_event(DeviceEvent::PersonDetected);
        if target == HandshakeState::WaitDeviceReady {
            return;
        }
        fsm.handle_event(DeviceEvent::ResultReady);
        if target == HandshakeState::Recognizing {
            return;
        }
        fsm.submit_failure();
    }

    #[rstest]
    #[case(HandshakeState::Idle, DeviceEvent::ResultReady, HandshakeState::Idle)]
    #[case(HandshakeState::Idle, DeviceEvent::ProbeAck, HandshakeState::Idle)]
    #[case(HandshakeState::Idle, DeviceEvent::PersonDetected, HandshakeState::WaitDeviceReady)]
    #[case(HandshakeState::WaitDeviceReady, DeviceEvent::ResultReady, HandshakeState::Recognizing)]
    #[case(HandshakeState::WaitDeviceReady, DeviceEvent::DeviceIdle, HandshakeState::Idle)]
    #[case(HandshakeState::Recognizing, DeviceEvent::ResultReady, HandshakeState::Recognizing)]
    #[case(HandshakeState::Recognizing, DeviceEvent::PersonDetected, HandshakeState::Recognizing)]
    #[case(HandshakeState::Recognizing, DeviceEvent::DeviceIdle, HandshakeState::Idle)]
    #[case(HandshakeState::WaitDeviceAck, DeviceEvent::ResultReady, HandshakeState::WaitDeviceAck)]
    #[case(HandshakeState::WaitDeviceAck, DeviceEvent::DeviceIdle, HandshakeState::Idle)]
    #[tokio::test(start_paused = true)]
    async fn every_state_token_pair_is_defined(
        #[case] start: HandshakeState,
        #[case] token: DeviceEvent,
        #[case] expected: HandshakeState,
    ) {
        let (fsm, _port, _rx) = handshake();
        walk_to(fsm.as_ref(), start).await;
        assert_eq!(fsm.state(), start);

        // Clear the debounce filter so a test NG is not swallowed by the
        // NG used to reach the start state.
        advance(Duration::from_millis(200)).await;

        fsm.handle_event(token);
        assert_eq!(fsm.state(), expected);
    }

    #[rstest]
    #[case(HandshakeState::Idle)]
    #[case(HandshakeState::WaitDeviceReady)]
    #[case(HandshakeState::Recognizing)]
    #[case(HandshakeState::WaitDeviceAck)]
    #[tokio::test(start_paused = true)]
    async fn rd_from_any_state_resets_to_idle(#[case] start: HandshakeState) {
        let (fsm, _port, mut rx) = handshake();
        walk_to(fsm.as_ref(), start).await;
        drain(&mut rx);

        fsm.handle_event(DeviceEvent::DeviceIdle);
        assert_eq!(fsm.state(), HandshakeState::Idle);
        if start == HandshakeState::Idle {
            // Duplicate RD while idle is ignored.
            assert!(drain(&mut rx).is_empty());
        } else {
            assert_eq!(drain(&mut rx), vec![HandshakeEvent::DeviceIdle]);
        }

        // Pending and last result are gone: a following cycle starts
        // clean. (Step past the debounce window from the walk's NG.)
        advance(Duration::from_millis(200)).await;
        fsm.handle_event(DeviceEvent::PersonDetected);
        fsm.handle_event(DeviceEvent::ResultReady);
        assert_eq!(fsm.state(), HandshakeState::Recognizing);
    }

    #[tokio::test(start_paused = true)]
    async fn ng_within_debounce_window_fires_once() {
        let (fsm, _port, mut rx) = handshake();

        fsm.handle_event(DeviceEvent::PersonDetected);
        advance(Duration::from_millis(10)).await;
        fsm.handle_event(DeviceEvent::PersonDetected);

        let fired = drain(&mut rx)
            .into_iter()
            .filter(|e| *e == HandshakeEvent::PersonDetected)
            .count();
        assert_eq!(fired, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn ng_outside_debounce_but_mid_cycle_is_still_ignored() {
        let (fsm, _port, mut rx) = handshake();

        fsm.handle_event(DeviceEvent::PersonDetected);
        fsm.handle_event(DeviceEvent::ResultReady);
        drain(&mut rx);

        advance(Duration::from_millis(500)).await;
        fsm.handle_event(DeviceEvent::PersonDetected);

        assert_eq!(fsm.state(), HandshakeState::Recognizing);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn pending_result_released_on_ck() {
        let (fsm, port, _rx) = handshake();

        fsm.handle_event(DeviceEvent::PersonDetected);
        fsm.submit_success(StudentId::new(42));
        assert_eq!(fsm.state(), HandshakeState::WaitDeviceReady);
        assert!(port.sent().is_empty());

        fsm.handle_event(DeviceEvent::ResultReady);
        assert_eq!(fsm.state(), HandshakeState::WaitDeviceAck);
        assert_eq!(port.sent(), vec!["T42\r\n"]);
    }

    #[tokio::test(start_paused = true)]
    async fn submit_in_idle_is_a_noop() {
        let (fsm, port, _rx) = handshake();
        fsm.submit_failure();
        assert_eq!(fsm.state(), HandshakeState::Idle);
        assert!(port.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn resend_repeats_identical_payload_until_window_elapses() {
        let (fsm, port, _rx) = handshake();
        let cfg = HandshakeConfig::default();

        fsm.handle_event(DeviceEvent::PersonDetected);
        fsm.handle_event(DeviceEvent::ResultReady);
        fsm.submit_success(StudentId::new(7));

        // Tick well past the window; only ticks inside it send.
        for _ in 0..40 {
            advance(Duration::from_millis(cfg.resend_interval_ms)).await;
            fsm.resend_tick();
        }

        let sent = port.sent();
        assert!(sent.iter().all(|p| p == "T7\r\n"));
        let max_sends =
            (cfg.resend_window_ms).div_ceil(cfg.resend_interval_ms) as usize + 1;
        assert!(
            sent.len() <= max_sends,
            "sent {} times, bound {}",
            sent.len(),
            max_sends
        );
        // It did actually retransmit, not just send once.
        assert!(sent.len() > 1);

        // State is still WaitDeviceAck: only RD recovers the cycle.
        assert_eq!(fsm.state(), HandshakeState::WaitDeviceAck);
    }

    #[tokio::test(start_paused = true)]
    async fn rd_stops_retransmission() {
        let (fsm, port, mut rx) = handshake();

        fsm.handle_event(DeviceEvent::PersonDetected);
        fsm.handle_event(DeviceEvent::ResultReady);
        fsm.submit_failure();
        drain(&mut rx);

        fsm.handle_event(DeviceEvent::DeviceIdle);
        let before = port.sent().len();

        advance(Duration::from_secs(5)).await;
        for _ in 0..10 {
            fsm.resend_tick();
        }
        assert_eq!(port.sent().len(), before);
        assert_eq!(drain(&mut rx), vec![HandshakeEvent::DeviceIdle]);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_write_is_retried_next_tick() {
        let (fsm, port, _rx) = handshake();

        fsm.handle_event(DeviceEvent::PersonDetected);
        fsm.handle_event(DeviceEvent::ResultReady);

        port.set_fail(true);
        fsm.submit_success(StudentId::new(9));
        assert_eq!(fsm.state(), HandshakeState::WaitDeviceAck);
        assert!(port.sent().is_empty());

        port.set_fail(false);
        advance(Duration::from_millis(200)).await;
        fsm.resend_tick();
        assert_eq!(port.sent(), vec!["T9\r\n"]);
    }

    #[tokio::test(start_paused = true)]
    async fn end_to_end_success_cycle() {
        let (fsm, port, mut rx) = handshake();

        fsm.handle_event(DeviceEvent::PersonDetected);
        advance(Duration::from_millis(50)).await;
        fsm.handle_event(DeviceEvent::ResultReady);
        fsm.submit_success(StudentId::new(7));

        assert_eq!(port.sent(), vec!["T7\r\n"]);

        // Resend cadence runs until RD.
        advance(Duration::from_millis(200)).await;
        fsm.resend_tick();
        assert_eq!(port.sent().len(), 2);

        fsm.handle_event(DeviceEvent::DeviceIdle);
        assert_eq!(fsm.state(), HandshakeState::Idle);

        let events = drain(&mut rx);
        assert_eq!(
            events,
            vec![
                HandshakeEvent::PersonDetected,
                HandshakeEvent::DeviceReady,
                HandshakeEvent::DeviceIdle,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn probe_sends_in_any_state() {
        let (fsm, port, _rx) = handshake();
        fsm.probe();
        fsm.handle_event(DeviceEvent::PersonDetected);
        fsm.probe();
        assert_eq!(port.sent(), vec!["RUOK\r\n", "RUOK\r\n"]);
    }
}
