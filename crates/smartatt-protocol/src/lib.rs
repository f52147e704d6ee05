//! Wire protocol between the kiosk host and the ATmega sensor/display board.
//!
//! The protocol is deliberately tiny: a fixed vocabulary of ASCII tokens,
//! one per line, `\r\n` terminated, at 9600-8N1. This crate provides the
//! typed message vocabulary ([`DeviceEvent`], [`HostCommand`]) and an
//! incremental [`LineScanner`] that reassembles lines from the raw byte
//! chunks a serial read produces.
//!
//! # Message Flow
//!
//! ```text
//! ATmega ──NG──► host     sensor fired, a person is present
//! ATmega ──CK──► host     display ready, send me the result
//! host ──F/T<id>─► ATmega recognition outcome
//! ATmega ──RD──► host     result displayed, cycle over
//! ```
//!
//! Unknown inbound tokens are a typed error ([`smartatt_core::Error::UnknownToken`]);
//! callers log and drop them, they are never fatal.

pub mod message;
pub mod scanner;

pub use message::{DeviceEvent, HostCommand};
pub use scanner::LineScanner;
