//! Hardware layer: serial link and device handshake for the attendance kiosk.
//!
//! This crate owns everything that talks to the ATmega sensor/display board:
//! port discovery and reconnection ([`SerialLink`]), the handshake state
//! machine tracking the device's physical cycle ([`DeviceHandshake`]), and
//! the blocking reader loop feeding it ([`reader`]).
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐ bytes ┌─────────────┐ lines ┌──────────────────┐ events ┌─────────────┐
//! │ SerialLink   │──────►│ LineScanner │──────►│ DeviceHandshake  │───────►│ coordinator │
//! │ (reader half)│       └─────────────┘       │ (FSM + resend)   │ (mpsc) └─────────────┘
//! └──────────────┘                             └────────┬─────────┘
//!        ▲                                              │ F / T<id>
//!        └──────────────────────────────────────────────┘
//!                        (writer half, ResultPort)
//! ```
//!
//! The reader loop runs on a dedicated OS thread because serial reads are
//! blocking; everything downstream of the handshake events is async. The
//! handshake itself is a plain mutex-guarded state machine usable from
//! both worlds.
//!
//! # Failure Model
//!
//! Serial I/O never raises to callers. A read error closes the link and
//! the supervisor reconnects; a write error is logged and the
//! retransmission loop tries again next tick. A device that disappears
//! mid-cycle exhausts the resend window and is abandoned silently; the
//! session timeout one level up recovers the kiosk.

pub mod error;
pub mod handshake;
pub mod link;
pub mod mock;
pub mod reader;

pub use error::{HardwareError, Result};
pub use handshake::{DeviceHandshake, HandshakeEvent, HandshakeState, ResultPort};
pub use link::SerialLink;
pub use reader::spawn_reader;
