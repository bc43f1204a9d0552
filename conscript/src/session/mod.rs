//! Interactive session driver.
//!
//! A [`Session`] sends lines to a remote interactive program and waits for
//! the prompts it prints, one expectation after another. Output is scanned
//! strictly forward: each match consumes everything up to its end, so the
//! order of `expect`/`answer` calls has to follow the order in which the
//! program prints its prompts. A prompt issued out of order shows up as a
//! timeout on that step.

mod config;
mod matched;

pub use config::SessionConfig;
pub use matched::ExpectMatch;

use std::time::{Duration, Instant};

use log::{debug, trace, warn};
use secrecy::{ExposeSecret, SecretString};

use crate::channel::{IntoPattern, Pattern, PatternBuffer};
use crate::dialogue::{Dialogue, DialogueVars, Transcript};
use crate::error::{ChannelError, Result, TransportError};
use crate::transport::{SshConfig, SshTransport, Transport};

/// How much unmatched output a timeout error carries.
const UNMATCHED_TAIL: usize = 256;

/// Shortest wait between scans, whatever `poll_interval` says.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Placeholder logged instead of hidden input.
pub(crate) const MASK: &str = "********";

/// An interactive session over a [`Transport`].
pub struct Session<T: Transport> {
    /// The exclusively owned transport.
    transport: T,

    /// Everything the remote side has printed so far.
    buffer: PatternBuffer,

    /// Behaviour settings.
    config: SessionConfig,

    /// Set once `close()` has run.
    closed: bool,
}

impl<T: Transport> Session<T> {
    /// Wrap an already-open transport with the default configuration.
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, SessionConfig::default())
    }

    /// Wrap an already-open transport.
    pub fn with_config(transport: T, config: SessionConfig) -> Self {
        Self {
            transport,
            buffer: PatternBuffer::new(config.search_depth, config.strip_ansi),
            config,
            closed: false,
        }
    }

    /// Start an interactive program by sending its launch command.
    ///
    /// The session begins when the command is sent, e.g. `ap` to bring up
    /// the appliance console on a shell.
    pub fn start(transport: T, config: SessionConfig, command: &str) -> Result<Self> {
        let mut session = Self::with_config(transport, config);
        session.send(command)?;
        Ok(session)
    }

    /// Send `text` followed by the line terminator.
    pub fn send(&mut self, text: &str) -> Result<()> {
        debug!("send: {:?}", text);
        self.write_line(text)
    }

    /// Send `text` like [`send`](Self::send) without logging it.
    pub fn send_hidden(&mut self, text: &SecretString) -> Result<()> {
        self.send_masked(text.expose_secret())
    }

    pub(crate) fn send_masked(&mut self, text: &str) -> Result<()> {
        debug!("send: {}", MASK);
        self.write_line(text)
    }

    fn write_line(&mut self, text: &str) -> Result<()> {
        self.ensure_open()?;
        let mut line = Vec::with_capacity(text.len() + self.config.line_terminator.len());
        line.extend_from_slice(text.as_bytes());
        line.extend_from_slice(self.config.line_terminator.as_bytes());
        self.transport.write(&line)
    }

    /// Wait until `pattern` shows up in output that has not been consumed yet.
    ///
    /// On success the read cursor moves past the end of the match, and the
    /// returned [`ExpectMatch`] holds the match plus everything before it.
    /// Fails with [`ChannelError::Timeout`] when the pattern does not show up
    /// within `timeout`, or with [`TransportError::Disconnected`] if the
    /// remote side hangs up first.
    pub fn expect(&mut self, pattern: impl IntoPattern, timeout: Duration) -> Result<ExpectMatch> {
        let pattern = pattern
            .into_pattern()
            .map_err(ChannelError::InvalidPattern)?;
        self.expect_pattern(&pattern, timeout)
    }

    /// [`expect`](Self::expect) with the configured default timeout.
    pub fn expect_default(&mut self, pattern: impl IntoPattern) -> Result<ExpectMatch> {
        self.expect(pattern, self.config.default_timeout)
    }

    pub(crate) fn expect_pattern(
        &mut self,
        pattern: &Pattern,
        timeout: Duration,
    ) -> Result<ExpectMatch> {
        self.ensure_open()?;

        let start = Instant::now();
        let mut scan_from = self.buffer.cursor();

        loop {
            if let Some(range) = self.buffer.find(pattern, scan_from) {
                let before = self
                    .buffer
                    .slice_lossy(self.buffer.cursor()..range.start)
                    .into_owned();
                let matched = self.buffer.slice_lossy(range.clone()).into_owned();
                self.buffer.consume_to(range.end);

                let elapsed = start.elapsed();
                debug!("matched {:?} after {:?}", pattern.as_str(), elapsed);
                return Ok(ExpectMatch::new(before, matched, elapsed));
            }
            scan_from = self.buffer.rescan_from(pattern, self.buffer.len());

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                let unmatched = self.buffer.pending_tail_lossy(UNMATCHED_TAIL);
                warn!(
                    "pattern {:?} not seen within {:?}; last output: {:?}",
                    pattern.as_str(),
                    timeout,
                    unmatched
                );
                return Err(ChannelError::Timeout {
                    pattern: pattern.as_str().to_string(),
                    timeout,
                    elapsed,
                    unmatched,
                }
                .into());
            }

            let wait = self
                .config
                .poll_interval
                .max(MIN_POLL_INTERVAL)
                .min(timeout - elapsed);
            let chunk = self.transport.read(wait)?;
            if !chunk.is_empty() {
                trace!("read {} bytes", chunk.len());
                self.buffer.extend(&chunk);
            }
        }
    }

    /// Wait for `pattern`, then send `response` unless it is empty.
    ///
    /// An empty response only waits; nothing is written.
    pub fn answer(
        &mut self,
        pattern: impl IntoPattern,
        response: &str,
        timeout: Duration,
    ) -> Result<ExpectMatch> {
        let matched = self.expect(pattern, timeout)?;
        if !response.is_empty() {
            self.send(response)?;
        }
        Ok(matched)
    }

    /// [`answer`](Self::answer) with a secret response that is never logged.
    pub fn answer_hidden(
        &mut self,
        pattern: impl IntoPattern,
        response: &SecretString,
        timeout: Duration,
    ) -> Result<ExpectMatch> {
        let matched = self.expect(pattern, timeout)?;
        if !response.expose_secret().is_empty() {
            self.send_hidden(response)?;
        }
        Ok(matched)
    }

    /// [`answer`](Self::answer) with the configured default timeout.
    pub fn answer_default(&mut self, pattern: impl IntoPattern, response: &str) -> Result<ExpectMatch> {
        self.answer(pattern, response, self.config.default_timeout)
    }

    /// Run a scripted dialogue on this session.
    pub fn run(&mut self, dialogue: &Dialogue, vars: &DialogueVars) -> Result<Transcript> {
        dialogue.run(self, vars)
    }

    /// Release the transport. Calling this more than once is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        debug!("closing session");
        self.transport.close()
    }

    /// Whether the session can still send and receive.
    pub fn is_open(&self) -> bool {
        !self.closed && self.transport.is_open()
    }

    /// All output received so far (escape codes stripped).
    pub fn output(&self) -> String {
        self.buffer.as_str_lossy().into_owned()
    }

    /// Output not consumed by any expectation yet.
    pub fn pending(&self) -> String {
        String::from_utf8_lossy(self.buffer.pending()).into_owned()
    }

    /// Get the session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Get a reference to the output buffer.
    pub fn buffer(&self) -> &PatternBuffer {
        &self.buffer
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(TransportError::Closed.into());
        }
        Ok(())
    }
}

impl Session<SshTransport> {
    /// Open an SSH shell and wrap it in a session.
    pub fn connect(ssh: SshConfig, config: SessionConfig) -> Result<Self> {
        let transport = SshTransport::connect(ssh)?;
        Ok(Self::with_config(transport, config))
    }
}

impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.close() {
                debug!("closing session on drop: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::transport::ScriptedTransport;

    fn quick() -> SessionConfig {
        SessionConfig::default().poll_interval(Duration::from_millis(10))
    }

    #[test]
    fn test_expect_advances_cursor() {
        let transport = ScriptedTransport::new().output("banner\nlogin: ");
        let mut session = Session::with_config(transport, quick());

        let m = session.expect("login: ", Duration::from_secs(1)).unwrap();
        assert_eq!(m.before, "banner\n");
        assert_eq!(m.matched, "login: ");
        assert_eq!(session.buffer().cursor(), "banner\nlogin: ".len());
        assert!(session.pending().is_empty());
    }

    #[test]
    fn test_expect_waits_for_late_output() {
        let transport = ScriptedTransport::new()
            .output("Initializing database...")
            .output_after(Duration::from_millis(120), "\nPress any key to continue.");
        let mut session = Session::with_config(transport, quick());

        let m = session
            .expect(Pattern::literal("Press any key"), Duration::from_secs(2))
            .unwrap();
        assert!(m.before.starts_with("Initializing database"));
        assert!(m.elapsed >= Duration::from_millis(100));
    }

    #[test]
    fn test_consumed_prompt_is_not_matched_again() {
        let transport = ScriptedTransport::new().output("Enter the password: ");
        let mut session = Session::with_config(transport, quick());

        session.expect("password: ", Duration::from_secs(1)).unwrap();
        let err = session
            .expect("password: ", Duration::from_millis(100))
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn test_expect_timeout_is_bounded() {
        let transport = ScriptedTransport::new().output("something else");
        let mut session = Session::with_config(transport, quick());

        let start = Instant::now();
        let err = session
            .expect("never printed", Duration::from_millis(200))
            .unwrap_err();
        let elapsed = start.elapsed();

        assert!(elapsed >= Duration::from_millis(200));
        assert!(elapsed < Duration::from_millis(600));
        match err {
            Error::Channel(ChannelError::Timeout {
                pattern, unmatched, ..
            }) => {
                assert_eq!(pattern, "never printed");
                assert_eq!(unmatched, "something else");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_answer_with_empty_response_writes_nothing() {
        let transport = ScriptedTransport::new().output("Press any key to continue.");
        let log = transport.handle();
        let mut session = Session::with_config(transport, quick());

        session
            .answer("Press any key", "", Duration::from_secs(1))
            .unwrap();
        assert_eq!(log.written(), "");
    }

    #[test]
    fn test_answer_writes_response_and_terminator() {
        let transport = ScriptedTransport::new().output("Choose the database operation: ");
        let log = transport.handle();
        let mut session = Session::with_config(transport, quick());

        session
            .answer("database operation: ", "1", Duration::from_secs(1))
            .unwrap();
        assert_eq!(log.written(), "1\n");
    }

    #[test]
    fn test_answer_hidden_writes_secret() {
        let transport = ScriptedTransport::new().output("Enter the database password: ");
        let log = transport.handle();
        let mut session = Session::with_config(transport, quick());

        let secret = SecretString::from("smartvm");
        session
            .answer_hidden("password: ", &secret, Duration::from_secs(1))
            .unwrap();
        assert_eq!(log.written(), "smartvm\n");
    }

    #[test]
    fn test_custom_line_terminator() {
        let transport = ScriptedTransport::new();
        let log = transport.handle();
        let mut session = Session::with_config(transport, quick().line_terminator("\r"));

        session.send("y").unwrap();
        assert_eq!(log.written(), "y\r");
    }

    #[test]
    fn test_start_sends_launch_command() {
        let transport = ScriptedTransport::new().reply_to("ap", "Press any key to continue.");
        let log = transport.handle();
        let mut session = Session::start(transport, quick(), "ap").unwrap();

        session.expect("Press any key", Duration::from_secs(1)).unwrap();
        assert_eq!(log.written_lines(), vec!["ap"]);
    }

    #[test]
    fn test_close_twice_is_noop() {
        let transport = ScriptedTransport::new();
        let log = transport.handle();
        let mut session = Session::new(transport);

        session.close().unwrap();
        session.close().unwrap();
        assert!(!session.is_open());
        assert_eq!(log.close_calls(), 1);
    }

    #[test]
    fn test_drop_closes_transport() {
        let transport = ScriptedTransport::new();
        let log = transport.handle();
        drop(Session::new(transport));
        assert_eq!(log.close_calls(), 1);
    }

    #[test]
    fn test_io_after_close_fails() {
        let mut session = Session::new(ScriptedTransport::new().output("x"));
        session.close().unwrap();

        let err = session.send("1").unwrap_err();
        assert!(matches!(err, Error::Transport(TransportError::Closed)));
        let err = session.expect("x", Duration::from_millis(10)).unwrap_err();
        assert!(matches!(err, Error::Transport(TransportError::Closed)));
    }

    #[test]
    fn test_hang_up_surfaces_as_transport_error() {
        let transport = ScriptedTransport::new().output("Connection closed.").hang_up();
        let mut session = Session::with_config(transport, quick());

        let err = session
            .expect("Press any key", Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, Error::Transport(TransportError::Disconnected)));
    }

    #[test]
    fn test_ansi_codes_do_not_break_matching() {
        let transport =
            ScriptedTransport::new().output("\x1b[1mChoose the encryption key:\x1b[0m |1| ");
        let mut session = Session::with_config(transport, quick());

        session
            .expect(r"Choose the encryption key: \|1\| ", Duration::from_secs(1))
            .unwrap();
    }

    #[test]
    fn test_prompt_split_across_reads() {
        for depth in [0, 4, 4096] {
            let transport = ScriptedTransport::new()
                .output("Press any ")
                .output_after(Duration::from_millis(50), "key to continue.");
            let mut session = Session::with_config(transport, quick().search_depth(depth));

            let m = session
                .expect(Pattern::literal("Press any key"), Duration::from_millis(400))
                .unwrap();
            assert_eq!(m.matched, "Press any key");
        }
    }

    #[test]
    fn test_regex_split_across_reads_with_zero_depth() {
        let transport = ScriptedTransport::new()
            .output("Enter the port number: |54")
            .output_after(Duration::from_millis(50), "32| ");
        let mut session = Session::with_config(transport, quick().search_depth(0));

        let m = session
            .expect(r"Enter the port number: \|\d+\| ", Duration::from_millis(400))
            .unwrap();
        assert_eq!(m.matched, "Enter the port number: |5432| ");
    }

    #[test]
    fn test_zero_poll_interval_does_not_spin() {
        let transport = ScriptedTransport::new();
        let log = transport.handle();
        let config = quick().poll_interval(Duration::ZERO);
        let mut session = Session::with_config(transport, config);

        let err = session
            .expect("never printed", Duration::from_millis(50))
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(log.read_calls() <= 60, "read_calls = {}", log.read_calls());
    }

    #[test]
    fn test_send_after_hang_up_fails() {
        let transport = ScriptedTransport::new().output("Connection closed.").hang_up();
        let mut session = Session::with_config(transport, quick());

        let err = session
            .expect("Press any key", Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, Error::Transport(TransportError::Disconnected)));

        let err = session.send("1").unwrap_err();
        assert!(matches!(err, Error::Transport(TransportError::Disconnected)));
        assert!(!session.is_open());
    }

    #[test]
    fn test_boxed_transport() {
        let transport: Box<dyn Transport> =
            Box::new(ScriptedTransport::new().reply_to("ap", "Choose the advanced setting: "));
        let mut session = Session::start(transport, quick(), "ap").unwrap();

        session
            .expect("advanced setting: ", Duration::from_secs(1))
            .unwrap();
        session.close().unwrap();
        assert!(!session.is_open());
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let mut session = Session::with_config(ScriptedTransport::new(), quick());
        let err = session.expect("(unclosed", Duration::from_millis(10)).unwrap_err();
        assert!(matches!(err, Error::Channel(ChannelError::InvalidPattern(_))));
    }
}
