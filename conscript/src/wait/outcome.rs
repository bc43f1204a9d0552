//! Poll results and failures.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::error::Error;

/// A successful wait.
#[derive(Debug, Clone)]
pub struct WaitOutcome<T> {
    /// The truthy value the predicate returned.
    pub value: T,

    /// Time from the start of the wait to success.
    pub elapsed: Duration,

    /// Number of predicate evaluations, including the successful one.
    pub attempts: u32,
}

impl<T> WaitOutcome<T> {
    /// Discard the bookkeeping and keep the value.
    pub fn into_value(self) -> T {
        self.value
    }
}

/// The last thing a predicate produced before the wait gave up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LastObservation {
    /// A falsy value, debug-formatted.
    Value(String),

    /// A tolerated error, formatted with `Display`.
    Error(String),
}

impl fmt::Display for LastObservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LastObservation::Value(value) => write!(f, "{value}"),
            LastObservation::Error(error) => write!(f, "error: {error}"),
        }
    }
}

/// A condition did not become true in time.
#[derive(Error, Debug, Clone)]
#[error(
    "timed out after {elapsed:?} waiting for {description} ({attempts} attempts, limit {timeout:?}, last result: {})",
    .last.as_ref().map_or_else(|| "none".to_string(), ToString::to_string)
)]
pub struct WaitTimeout {
    /// What was being waited for.
    pub description: String,

    /// The configured budget.
    pub timeout: Duration,

    /// Time actually spent.
    pub elapsed: Duration,

    /// Number of predicate evaluations.
    pub attempts: u32,

    /// The last falsy value or tolerated error.
    pub last: Option<LastObservation>,
}

/// Why a wait ended without success.
#[derive(Error, Debug)]
pub enum WaitError<E> {
    /// The budget ran out.
    #[error(transparent)]
    Timeout(#[from] WaitTimeout),

    /// The predicate failed and errors were not tolerated.
    #[error("predicate failed: {0}")]
    Predicate(E),

    /// The fail callback failed; its errors always abort the wait.
    #[error("fail callback failed: {0}")]
    FailCallback(E),
}

impl<E> WaitError<E> {
    /// The timeout details, if the wait ran out of time.
    pub fn as_timeout(&self) -> Option<&WaitTimeout> {
        match self {
            WaitError::Timeout(timeout) => Some(timeout),
            _ => None,
        }
    }
}

impl<E: Into<Error>> From<WaitError<E>> for Error {
    fn from(err: WaitError<E>) -> Self {
        match err {
            WaitError::Timeout(timeout) => Error::Wait(timeout),
            WaitError::Predicate(e) | WaitError::FailCallback(e) => e.into(),
        }
    }
}
