//! In-memory transport that replays canned console output.
//!
//! A `ScriptedTransport` stands in for a remote console: output can be
//! scheduled at fixed delays, or queued as the reply to a specific line of
//! input. Every write is recorded and can be inspected through a
//! [`ScriptHandle`] after the transport has been moved into a session.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};

use super::Transport;
use crate::error::{Result, TransportError};

/// Output waiting to become visible.
#[derive(Debug)]
struct Scheduled {
    due: Instant,
    data: Bytes,
}

/// Output released when a given line is written.
#[derive(Debug)]
struct Reply {
    on_line: String,
    delay: Duration,
    data: Bytes,
}

#[derive(Debug, Default)]
struct ScriptState {
    scheduled: VecDeque<Scheduled>,
    replies: VecDeque<Reply>,
    written: Vec<u8>,
    partial_line: Vec<u8>,
    after_cr: bool,
    hang_up: bool,
    disconnected: bool,
    closed: bool,
    close_calls: usize,
    read_calls: usize,
}

impl ScriptState {
    fn schedule(&mut self, due: Instant, data: Bytes) {
        // Keep the queue ordered by due time; equal times keep insertion order
        let at = self
            .scheduled
            .iter()
            .position(|s| s.due > due)
            .unwrap_or(self.scheduled.len());
        self.scheduled.insert(at, Scheduled { due, data });
    }

    fn take_due(&mut self, now: Instant) -> Bytes {
        let mut out = BytesMut::new();
        while self.scheduled.front().is_some_and(|s| s.due <= now) {
            if let Some(item) = self.scheduled.pop_front() {
                out.extend_from_slice(&item.data);
            }
        }
        out.freeze()
    }

    fn record_write(&mut self, data: &[u8], now: Instant) {
        self.written.extend_from_slice(data);
        for &byte in data {
            match byte {
                // second half of a "\r\n" terminator
                b'\n' if self.after_cr => self.after_cr = false,
                b'\n' | b'\r' => {
                    self.after_cr = byte == b'\r';
                    let line = String::from_utf8_lossy(&self.partial_line).into_owned();
                    self.partial_line.clear();
                    self.fire_reply(&line, now);
                }
                _ => {
                    self.after_cr = false;
                    self.partial_line.push(byte);
                }
            }
        }
    }

    fn fire_reply(&mut self, line: &str, now: Instant) {
        if self.replies.front().is_some_and(|r| r.on_line == line) {
            if let Some(reply) = self.replies.pop_front() {
                self.schedule(now + reply.delay, reply.data);
            }
        }
    }
}

/// Handle for inspecting and feeding a [`ScriptedTransport`] from outside.
#[derive(Debug, Clone)]
pub struct ScriptHandle {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptHandle {
    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        // A panicking test thread must not hide the script from the others
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Everything written so far, as text.
    pub fn written(&self) -> String {
        String::from_utf8_lossy(&self.lock().written).into_owned()
    }

    /// Everything written so far, split into lines.
    pub fn written_lines(&self) -> Vec<String> {
        self.written().lines().map(str::to_owned).collect()
    }

    /// Make `text` readable immediately.
    pub fn push_output(&self, text: impl AsRef<[u8]>) {
        let data = Bytes::copy_from_slice(text.as_ref());
        self.lock().schedule(Instant::now(), data);
    }

    /// Number of times `close()` was called on the transport.
    pub fn close_calls(&self) -> usize {
        self.lock().close_calls
    }

    /// Whether the transport has been closed.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of times `read()` was called on the transport.
    pub fn read_calls(&self) -> usize {
        self.lock().read_calls
    }
}

/// A [`Transport`] backed by a script instead of a remote host.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use conscript::{ScriptedTransport, Session, SessionConfig};
///
/// let transport = ScriptedTransport::new()
///     .reply_to("ap", "Choose the advanced setting: ")
///     .reply_to("7", "Configuration activated successfully.");
/// let log = transport.handle();
///
/// let mut session = Session::start(transport, SessionConfig::default(), "ap").unwrap();
/// session.answer("Choose the advanced setting: ", "7", Duration::from_secs(1)).unwrap();
/// session.expect("activated successfully", Duration::from_secs(1)).unwrap();
/// assert_eq!(log.written_lines(), vec!["ap", "7"]);
/// ```
#[derive(Debug)]
pub struct ScriptedTransport {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedTransport {
    /// Create an empty script.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ScriptState::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Output that is readable right away.
    pub fn output(self, text: impl AsRef<[u8]>) -> Self {
        self.output_after(Duration::ZERO, text)
    }

    /// Output that becomes readable `delay` after the script was built.
    pub fn output_after(self, delay: Duration, text: impl AsRef<[u8]>) -> Self {
        let data = Bytes::copy_from_slice(text.as_ref());
        self.lock().schedule(Instant::now() + delay, data);
        self
    }

    /// Output released as soon as `line` is written.
    ///
    /// Replies are consumed in the order they were added; only the next
    /// pending reply is compared against each written line.
    pub fn reply_to(self, line: impl Into<String>, text: impl AsRef<[u8]>) -> Self {
        self.reply_to_after(line, Duration::ZERO, text)
    }

    /// Output released `delay` after `line` is written.
    pub fn reply_to_after(
        self,
        line: impl Into<String>,
        delay: Duration,
        text: impl AsRef<[u8]>,
    ) -> Self {
        let reply = Reply {
            on_line: line.into(),
            delay,
            data: Bytes::copy_from_slice(text.as_ref()),
        };
        self.lock().replies.push_back(reply);
        self
    }

    /// Report end of stream once all scheduled output has been read.
    ///
    /// From then on writes fail with
    /// [`TransportError::Disconnected`] as well.
    pub fn hang_up(self) -> Self {
        self.lock().hang_up = true;
        self
    }

    /// A handle that stays usable after the transport is moved.
    pub fn handle(&self) -> ScriptHandle {
        ScriptHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for ScriptedTransport {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        let mut state = self.lock();
        if state.closed {
            return Err(TransportError::Closed.into());
        }
        if state.disconnected {
            return Err(TransportError::Disconnected.into());
        }
        state.record_write(data, Instant::now());
        Ok(())
    }

    fn read(&mut self, wait: Duration) -> Result<Bytes> {
        let deadline = Instant::now() + wait;

        let next_due = {
            let mut state = self.lock();
            if state.closed {
                return Err(TransportError::Closed.into());
            }
            state.read_calls += 1;
            let ready = state.take_due(Instant::now());
            if !ready.is_empty() {
                return Ok(ready);
            }
            if state.disconnected
                || (state.hang_up && state.scheduled.is_empty() && state.replies.is_empty())
            {
                state.disconnected = true;
                return Err(TransportError::Disconnected.into());
            }
            state.scheduled.front().map(|s| s.due)
        };

        let wake = next_due.map_or(deadline, |due| due.min(deadline));
        let now = Instant::now();
        if wake > now {
            thread::sleep(wake - now);
        }

        Ok(self.lock().take_due(Instant::now()))
    }

    fn close(&mut self) -> Result<()> {
        let mut state = self.lock();
        state.closed = true;
        state.close_calls += 1;
        Ok(())
    }

    fn is_open(&self) -> bool {
        let state = self.lock();
        !state.closed && !state.disconnected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_immediate_output() {
        let mut transport = ScriptedTransport::new().output("login: ");
        let data = transport.read(Duration::from_millis(10)).unwrap();
        assert_eq!(&data[..], b"login: ");
    }

    #[test]
    fn test_delayed_output_waits() {
        let mut transport =
            ScriptedTransport::new().output_after(Duration::from_millis(150), "ready");
        let early = transport.read(Duration::from_millis(20)).unwrap();
        assert!(early.is_empty());

        thread::sleep(Duration::from_millis(150));
        let late = transport.read(Duration::from_millis(20)).unwrap();
        assert_eq!(&late[..], b"ready");
    }

    #[test]
    fn test_reply_fires_on_matching_line() {
        let mut transport = ScriptedTransport::new()
            .reply_to("ap", "Press any key to continue.")
            .reply_to("", "Choose: ");

        transport.write(b"ls\n").unwrap();
        assert!(transport.read(Duration::from_millis(5)).unwrap().is_empty());

        transport.write(b"ap\n").unwrap();
        let data = transport.read(Duration::from_millis(5)).unwrap();
        assert_eq!(&data[..], b"Press any key to continue.");

        transport.write(b"\n").unwrap();
        let data = transport.read(Duration::from_millis(5)).unwrap();
        assert_eq!(&data[..], b"Choose: ");
    }

    #[test]
    fn test_hang_up_after_drain() {
        let mut transport = ScriptedTransport::new().output("bye").hang_up();
        assert_eq!(&transport.read(Duration::from_millis(5)).unwrap()[..], b"bye");
        let err = transport.read(Duration::from_millis(5)).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Transport(TransportError::Disconnected)
        ));

        assert!(!transport.is_open());
        let err = transport.write(b"1\n").unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Transport(TransportError::Disconnected)
        ));
    }

    #[test]
    fn test_closed_transport_rejects_io() {
        let mut transport = ScriptedTransport::new();
        let handle = transport.handle();
        transport.close().unwrap();

        assert!(handle.is_closed());
        assert!(!transport.is_open());
        assert!(transport.write(b"x\n").is_err());
        assert!(transport.read(Duration::from_millis(1)).is_err());
    }

    #[test]
    fn test_crlf_counts_as_one_line() {
        let mut transport = ScriptedTransport::new()
            .reply_to("ap", "menu")
            .reply_to("", "blank");
        transport.write(b"ap\r\n").unwrap();
        assert_eq!(&transport.read(Duration::from_millis(5)).unwrap()[..], b"menu");
        assert!(transport.read(Duration::from_millis(5)).unwrap().is_empty());
    }

    #[test]
    fn test_handle_records_writes() {
        let mut transport = ScriptedTransport::new();
        let handle = transport.handle();
        transport.write(b"7\n").unwrap();
        transport.write(b"y\n").unwrap();
        assert_eq!(handle.written_lines(), vec!["7", "y"]);
    }
}
