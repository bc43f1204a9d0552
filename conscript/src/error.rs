//! Error types for conscript.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::wait::WaitTimeout;

/// Main error type for conscript operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Transport-level errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Channel errors (pattern matching, expect timeouts)
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Dialogue construction or execution errors
    #[error("Dialogue error: {0}")]
    Dialogue(#[from] DialogueError),

    /// A polled condition never became true
    #[error("Wait error: {0}")]
    Wait(#[from] WaitTimeout),

    /// Run configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl Error {
    /// Whether this error is an expect timeout or a wait timeout, including
    /// one raised inside a dialogue step.
    ///
    /// Test harnesses use this to tell "the remote system never got there"
    /// apart from broken connections and bad scripts.
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Channel(ChannelError::Timeout { .. }) => true,
            Error::Wait(_) => true,
            Error::Dialogue(DialogueError::StepFailed { source, .. }) => source.is_timeout(),
            _ => false,
        }
    }
}

/// Transport layer errors (SSH connection, authentication, channel I/O).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to connect to host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// SSH key error
    #[error("SSH key error: {0}")]
    Key(String),

    /// Host is not in known_hosts and verification is strict
    #[error("Host key for {host}:{port} is not in known_hosts")]
    HostKeyUnknown { host: String, port: u16 },

    /// Host key differs from the one recorded in known_hosts
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// The session was closed locally; no further I/O is possible
    #[error("Channel closed")]
    Closed,

    /// The remote end hung up
    #[error("Connection disconnected")]
    Disconnected,

    /// Connecting timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Channel layer errors (pattern matching).
#[derive(Error, Debug)]
pub enum ChannelError {
    /// The expected pattern did not show up in time
    #[error(
        "Pattern {pattern:?} not found within {timeout:?} (waited {elapsed:?}); unmatched output tail: {unmatched:?}"
    )]
    Timeout {
        pattern: String,
        timeout: Duration,
        elapsed: Duration,
        unmatched: String,
    },

    /// Invalid prompt pattern
    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] PatternError),
}

/// A prompt pattern that cannot be used.
#[derive(Error, Debug)]
pub enum PatternError {
    /// The regular expression does not compile
    #[error(transparent)]
    Regex(#[from] regex::Error),

    /// The pattern matches empty text, so it would match at once anywhere
    #[error("pattern {pattern:?} matches empty text (unescaped '|'?)")]
    MatchesEmpty { pattern: String },
}

/// Dialogue errors (construction, validation, execution).
#[derive(Error, Debug)]
pub enum DialogueError {
    /// A dialogue without steps
    #[error("Dialogue '{dialogue}' has no steps")]
    Empty { dialogue: String },

    /// A step pattern failed to compile
    #[error("Dialogue '{dialogue}' step {step}: invalid pattern: {source}")]
    InvalidPattern {
        dialogue: String,
        step: usize,
        #[source]
        source: PatternError,
    },

    /// A step has a zero timeout and could never match
    #[error("Dialogue '{dialogue}' step {step}: timeout must be greater than zero")]
    ZeroTimeout { dialogue: String, step: usize },

    /// A step refers to a variable that was not supplied
    #[error("Dialogue '{dialogue}' step {step}: variable '{name}' is not bound")]
    UnboundVariable {
        dialogue: String,
        step: usize,
        name: String,
    },

    /// `within()` was called before any waiting step
    #[error("Dialogue '{dialogue}': timeout set before any step that waits")]
    DanglingTimeout { dialogue: String },

    /// A step failed while running; the rest of the dialogue was skipped
    #[error("Dialogue '{dialogue}' failed at step {step} ({description}): {source}")]
    StepFailed {
        dialogue: String,
        step: usize,
        description: String,
        #[source]
        source: Box<Error>,
    },
}

/// Run configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The configuration is not valid TOML for this schema
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration parsed but holds unusable values
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Result type alias using conscript's Error.
pub type Result<T> = std::result::Result<T, Error>;
