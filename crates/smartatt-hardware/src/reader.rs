//! Serial reader supervisor.
//!
//! A dedicated OS thread owns the read half of the link: serial reads
//! block, and a blocked read must never stall the async runtime. The
//! loop reconnects when the port disappears, reassembles lines with the
//! protocol scanner, decodes them and feeds the handshake machine.
//! Unknown tokens are logged and dropped.

use crate::handshake::{DeviceHandshake, ResultPort};
use crate::link::SerialLink;
use smartatt_protocol::{DeviceEvent, LineScanner};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use tracing::debug;

/// Spawn the reader thread.
///
/// The thread runs until `shutdown` is set. The same [`SerialLink`] is
/// shared with the handshake machine's write path, so a read error that
/// closes the link also silences sends until reconnection.
///
/// # Errors
///
/// Returns the OS error if the thread cannot be spawned.
pub fn spawn_reader<P: ResultPort + 'static>(
    link: Arc<SerialLink>,
    handshake: Arc<DeviceHandshake<P>>,
    reconnect_delay: std::time::Duration,
    shutdown: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("serial-reader".into())
        .spawn(move || run(&link, &handshake, reconnect_delay, &shutdown))
}

fn run<P: ResultPort>(
    link: &SerialLink,
    handshake: &DeviceHandshake<P>,
    reconnect_delay: std::time::Duration,
    shutdown: &AtomicBool,
) {
    let mut scanner = LineScanner::new();
    let mut buf = [0u8; 256];

    debug!("serial reader started");
    while !shutdown.load(Ordering::Relaxed) {
        if !link.is_open() {
            if !link.open() {
                std::thread::sleep(reconnect_delay);
            }
            continue;
        }

        match link.read_chunk(&mut buf) {
            // Timeout with nothing buffered; loop back to check shutdown.
            Some(0) => {}
            Some(n) => {
                scanner.feed(&buf[..n]);
                while let Some(line) = scanner.next_line() {
                    debug!(line = line.as_str(), "rx");
                    match DeviceEvent::parse(&line) {
                        Ok(event) => handshake.handle_event(event),
                        Err(e) => debug!(error = %e, "dropped unknown token"),
                    }
                }
            }
            // Link closed itself on an I/O error; pending garbage from
            // the dying connection must not leak into the next one.
            None => {
                scanner = LineScanner::new();
                std::thread::sleep(reconnect_delay);
            }
        }
    }
    debug!("serial reader stopped");
}
