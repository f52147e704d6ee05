//! Incremental line scanner for the serial byte stream.
//!
//! Serial reads return arbitrary byte chunks: half a token, several tokens,
//! or garbage from a resetting MCU. The scanner accumulates chunks in an
//! internal buffer and yields complete, trimmed lines.
//!
//! ```text
//! ┌──────────────┐  feed(chunk)   ┌───────────────┐  b'\n' found   ┌────────────┐
//! │ serial read  │───────────────►│ byte buffer   │───────────────►│ next_line()│
//! └──────────────┘                └───────────────┘                └────────────┘
//! ```
//!
//! - lines are terminated by `\n`; a preceding `\r` is stripped, so both
//!   `\r\n` and bare `\n` work
//! - empty lines and lines that are not valid UTF-8 are skipped
//! - the buffer is capped; when a babbling device overruns it without ever
//!   sending a terminator, the oldest bytes are dropped

use bytes::BytesMut;

/// Buffer cap. Protocol lines are at most a handful of bytes; anything
/// near this size without a terminator is corruption.
const MAX_BUFFER_SIZE: usize = 4 * 1024;

/// Initial buffer capacity, sized for a burst of a few tokens.
const INITIAL_BUFFER_CAPACITY: usize = 256;

/// Stateful scanner turning byte chunks into protocol lines.
///
/// # Examples
///
/// ```
/// use smartatt_protocol::LineScanner;
///
/// let mut scanner = LineScanner::new();
/// scanner.feed(b"N");
/// assert_eq!(scanner.next_line(), None);
/// scanner.feed(b"G\r\nCK\r\n");
/// assert_eq!(scanner.next_line().as_deref(), Some("NG"));
/// assert_eq!(scanner.next_line().as_deref(), Some("CK"));
/// assert_eq!(scanner.next_line(), None);
/// ```
#[derive(Debug, Default)]
pub struct LineScanner {
    buf: BytesMut,
}

impl LineScanner {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Append a chunk of raw bytes from the serial port.
    pub fn feed(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
        if self.buf.len() > MAX_BUFFER_SIZE {
            let excess = self.buf.len() - MAX_BUFFER_SIZE;
            let _ = self.buf.split_to(excess);
        }
    }

    /// Extract the next complete line, if one is buffered.
    ///
    /// Returns `None` when no full line is available yet. Empty and
    /// non-UTF8 lines are consumed and skipped.
    pub fn next_line(&mut self) -> Option<String> {
        loop {
            let pos = self.buf.iter().position(|&b| b == b'\n')?;
            let raw = self.buf.split_to(pos + 1);
            let line = match std::str::from_utf8(&raw[..pos]) {
                Ok(s) => s.trim_end_matches('\r').trim(),
                Err(_) => continue,
            };
            if line.is_empty() {
                continue;
            }
            return Some(line.to_string());
        }
    }

    /// Number of buffered bytes not yet consumed by a complete line.
    #[must_use]
    pub fn pending_bytes(&self) -> usize {
        self.buf.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reassembles_split_lines() {
        let mut scanner = LineScanner::new();
        scanner.feed(b"R");
        scanner.feed(b"D\r");
        assert_eq!(scanner.next_line(), None);
        scanner.feed(b"\n");
        assert_eq!(scanner.next_line().as_deref(), Some("RD"));
    }

    #[test]
    fn accepts_bare_newline() {
        let mut scanner = LineScanner::new();
        scanner.feed(b"CK\n");
        assert_eq!(scanner.next_line().as_deref(), Some("CK"));
    }

    #[test]
    fn skips_empty_lines() {
        let mut scanner = LineScanner::new();
        scanner.feed(b"\r\n\r\nNG\r\n");
        assert_eq!(scanner.next_line().as_deref(), Some("NG"));
        assert_eq!(scanner.next_line(), None);
    }

    #[test]
    fn skips_non_utf8_garbage() {
        let mut scanner = LineScanner::new();
        scanner.feed(&[0xff, 0xfe, b'\n']);
        scanner.feed(b"CF\r\n");
        assert_eq!(scanner.next_line().as_deref(), Some("CF"));
    }

    #[test]
    fn caps_buffer_without_terminator() {
        let mut scanner = LineScanner::new();
        scanner.feed(&[b'x'; 3 * MAX_BUFFER_SIZE]);
        assert!(scanner.pending_bytes() <= MAX_BUFFER_SIZE);
        // A real line after the noise still comes through.
        scanner.feed(b"\nNG\r\n");
        // First "line" is the tail of the noise; the next is the token.
        let mut lines = Vec::new();
        while let Some(l) = scanner.next_line() {
            lines.push(l);
        }
        assert_eq!(lines.last().map(String::as_str), Some("NG"));
    }
}
