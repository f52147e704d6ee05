//! Serial connection to the ATmega board.
//!
//! The link auto-discovers the USB-serial bridge by description heuristics
//! (the deployed boards enumerate as CH340 or CP210x), owns open/close,
//! and recovers from unplugged cables by closing itself so the supervising
//! reader loop can reconnect. No method here ever panics or raises on an
//! I/O failure; callers branch on the returned presence/success values.

use crate::error::{HardwareError, Result};
use crate::handshake::ResultPort;
use serialport::{DataBits, FlowControl, Parity, SerialPort, SerialPortType, StopBits};
use smartatt_core::config::SerialConfig;
use smartatt_core::constants::{MCU_RESET_DELAY_MS, USB_UART_HINTS};
use smartatt_protocol::HostCommand;
use std::io::{Read, Write};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Lock a mutex, recovering the inner value if a holder panicked.
fn lock_recover<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Shared serial connection with split read/write halves.
///
/// The reader thread pulls chunks through [`read_chunk`](Self::read_chunk)
/// while the handshake writes results through the [`ResultPort`] impl;
/// the halves are independent clones of the same OS handle so neither
/// side blocks the other.
pub struct SerialLink {
    cfg: SerialConfig,
    reader: Mutex<Option<Box<dyn SerialPort>>>,
    writer: Mutex<Option<Box<dyn SerialPort>>>,
    port_name: Mutex<Option<String>>,
}

impl SerialLink {
    #[must_use]
    pub fn new(cfg: SerialConfig) -> Self {
        Self {
            cfg,
            reader: Mutex::new(None),
            writer: Mutex::new(None),
            port_name: Mutex::new(None),
        }
    }

    /// Scan the system port list for a USB UART matching the known
    /// description substrings. Returns `None` when nothing matches.
    #[must_use]
    pub fn discover() -> Option<String> {
        let ports = serialport::available_ports().ok()?;
        for info in ports {
            let desc = match &info.port_type {
                SerialPortType::UsbPort(usb) => {
                    let mut d = usb.product.clone().unwrap_or_default();
                    if let Some(m) = &usb.manufacturer {
                        d.push(' ');
                        d.push_str(m);
                    }
                    d.to_lowercase()
                }
                _ => continue,
            };
            if USB_UART_HINTS.iter().any(|hint| desc.contains(hint)) {
                return Some(info.port_name);
            }
        }
        None
    }

    /// Discover and open the port. Returns `false` silently when no
    /// matching port exists or the open fails; the caller retries later.
    ///
    /// Opening toggles DTR and resets the MCU, so this blocks for the
    /// settle delay before returning.
    pub fn open(&self) -> bool {
        match self.try_open() {
            Ok(()) => true,
            Err(HardwareError::NoPortFound { .. }) => {
                debug!("no serial port found");
                false
            }
            Err(e) => {
                warn!(error = %e, "serial open failed");
                false
            }
        }
    }

    fn try_open(&self) -> Result<()> {
        if self.is_open() {
            return Ok(());
        }

        let name =
            Self::discover().ok_or_else(|| HardwareError::no_port_found(USB_UART_HINTS))?;

        let port = serialport::new(&name, self.cfg.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(self.cfg.read_timeout())
            .open()?;
        let writer = port.try_clone()?;

        *lock_recover(&self.reader) = Some(port);
        *lock_recover(&self.writer) = Some(writer);
        *lock_recover(&self.port_name) = Some(name.clone());

        std::thread::sleep(Duration::from_millis(MCU_RESET_DELAY_MS));
        info!(port = %name, baud = self.cfg.baud_rate, "serial connected");
        Ok(())
    }

    /// Whether the link currently holds an open port.
    #[must_use]
    pub fn is_open(&self) -> bool {
        lock_recover(&self.reader).is_some()
    }

    /// Name of the connected port, if any.
    #[must_use]
    pub fn port_name(&self) -> Option<String> {
        lock_recover(&self.port_name).clone()
    }

    /// Close both halves. Safe to call repeatedly.
    pub fn close(&self) {
        lock_recover(&self.reader).take();
        lock_recover(&self.writer).take();
        if let Some(name) = lock_recover(&self.port_name).take() {
            info!(port = %name, "serial closed");
        }
    }

    /// Poll-read a chunk of bytes. Returns `Some(0)` on a quiet timeout,
    /// `None` when the link is not open or just failed (the link closes
    /// itself so the supervisor reconnects).
    pub fn read_chunk(&self, buf: &mut [u8]) -> Option<usize> {
        let mut guard = lock_recover(&self.reader);
        let port = guard.as_mut()?;
        match port.read(buf) {
            Ok(n) => Some(n),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Some(0),
            Err(e) => {
                warn!(error = %e, "serial read error, closing link");
                drop(guard);
                self.close();
                None
            }
        }
    }

    /// Write a pre-encoded line to the device. Failures close the link
    /// and return `false`; they are never raised.
    pub fn write_raw(&self, payload: &str) -> bool {
        let mut guard = lock_recover(&self.writer);
        let Some(port) = guard.as_mut() else {
            debug!("send skipped: serial not connected");
            return false;
        };
        let result = port
            .write_all(payload.as_bytes())
            .and_then(|()| port.flush());
        match result {
            Ok(()) => {
                debug!(payload = payload.trim_end(), "tx");
                true
            }
            Err(e) => {
                warn!(error = %e, "serial write error, closing link");
                drop(guard);
                self.close();
                false
            }
        }
    }
}

impl ResultPort for SerialLink {
    fn send(&self, command: &HostCommand) -> bool {
        self.write_raw(&command.encode())
    }
}
