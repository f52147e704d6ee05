//! Session coordination: one coherent check-in attempt per hardware cycle.
//!
//! The coordinator sits between the device handshake and the recognition
//! arbiter and reconciles their independently-clocked signals into a
//! single per-person outcome:
//!
//! ```text
//!          PersonDetected            hit / timeout              DeviceIdle
//! idle ───────────────────► armed ─────────────────► resolved ───────────► idle
//!        (cooldown guard)    │                          │                 (token bump,
//!                            └── 15 s window ───────────┘                  cooldown)
//! ```
//!
//! Within one session at most one outcome is ever recorded. The defense
//! is the token-check-then-write pattern: every scheduled callback
//! carries the token it was created under and is a no-op once the token
//! moved on. `DeviceIdle` is the authoritative reset: it invalidates
//! whatever was in flight, no matter whether an outcome was recorded.

#![allow(async_fn_in_trait)]

pub mod coordinator;
pub mod overlay;
pub mod shift;
pub mod sink;

pub use coordinator::{
    ArbiterControl, DeviceSession, ResultSubmitter, SessionCoordinator, SessionOutcome,
};
pub use overlay::{OutsideShiftOverlay, OverlayRecord};
pub use shift::{FixedShiftWindow, ShiftWindowPolicy};
pub use sink::{AttendanceSink, MemorySink};
