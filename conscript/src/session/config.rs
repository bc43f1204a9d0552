//! Session behaviour settings.

use std::time::Duration;

/// Configuration for session behavior.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Timeout used by `expect_default`/`answer_default` and dialogue steps
    /// without their own timeout.
    pub default_timeout: Duration,

    /// Longest single wait for output between scans. Values under a
    /// millisecond are raised to one.
    pub poll_interval: Duration,

    /// Appended to every line sent.
    pub line_terminator: String,

    /// Strip terminal escape sequences from output before matching.
    pub strip_ansi: bool,

    /// Bytes of already-scanned output that are searched again for regex
    /// prompts when more output arrives. Literal prompts always rescan
    /// exactly their own length; zero rescans all unconsumed output.
    pub search_depth: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(100),
            line_terminator: "\n".to_string(),
            strip_ansi: true,
            search_depth: 4096,
        }
    }
}

impl SessionConfig {
    /// Set the default timeout.
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Set the poll interval.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the line terminator.
    pub fn line_terminator(mut self, terminator: impl Into<String>) -> Self {
        self.line_terminator = terminator.into();
        self
    }

    /// Enable or disable escape sequence stripping.
    pub fn strip_ansi(mut self, strip: bool) -> Self {
        self.strip_ansi = strip;
        self
    }

    /// Set the rescan depth.
    pub fn search_depth(mut self, depth: usize) -> Self {
        self.search_depth = depth;
        self
    }
}
